use std::io::{self, Write};
use std::num::NonZeroUsize;

use clap::Parser;
use sokobot::{
    Continuation, Direction, Engine, Levels, RunConfig, RunObserver, SolutionEvent, Solver,
    Summary, manual,
};
use tracing_subscriber::EnvFilter;

fn direction_string(directions: &[Direction]) -> String {
    directions.iter().map(|d| d.letter()).collect()
}

/// Replay a solution from the starting position and return the final board.
fn replay(start: &Engine, directions: &[Direction]) -> Option<Engine> {
    let mut engine = start.clone();
    for &dir in directions {
        engine.move_figure(dir).ok()?;
    }
    Some(engine)
}

struct PrintingObserver<'a> {
    start: &'a Engine,
}

impl RunObserver for PrintingObserver<'_> {
    fn on_solution(&self, event: &SolutionEvent) {
        // Hold the lock for the whole block so concurrent workers don't interleave.
        let mut out = io::stdout().lock();
        let _ = writeln!(
            out,
            "solution: {:<3}  steps: {:<12}  moves: {:<5}  elapsed: {} ms",
            event.index,
            event.steps,
            event.directions.len(),
            event.elapsed.as_millis()
        );
        let _ = writeln!(out, "{}", direction_string(&event.directions));
        if let Some(solved) = replay(self.start, &event.directions) {
            let _ = writeln!(out, "{}", solved);
        }
    }

    fn on_step(&self, worker: usize, engine: &Engine) {
        let mut out = io::stdout().lock();
        let _ = writeln!(
            out,
            "worker={}, moves={}:\n{}",
            worker,
            engine.history_len(),
            engine
        );
    }
}

fn print_summary(summary: &Summary) {
    println!("---");
    println!(
        "solutions: {:<3}  steps: {:<12}  configurations: {:<12}  dead fields: {:<4}  exhausted: {}  elapsed: {} ms",
        summary.solutions,
        summary.steps,
        summary.configurations,
        summary.dead_fields,
        if summary.exhausted { 'Y' } else { 'N' },
        summary.elapsed.as_millis()
    );
    if !summary.solution_steps.is_empty() {
        let steps: Vec<String> = summary.solution_steps.iter().map(u64::to_string).collect();
        println!("solution steps: {}", steps.join(", "));
    }
}

#[derive(Parser)]
#[command(name = "sokobot")]
#[command(about = "A concurrent backtracking Sokoban solver", long_about = None)]
struct Args {
    /// Path to the levels file (XSB format)
    #[arg(value_name = "FILE")]
    levels_file: String,

    /// Level number to solve (1-indexed)
    #[arg(value_name = "LEVEL", default_value = "1")]
    level: usize,

    /// Keep searching after the first solution
    #[arg(short, long)]
    multi: bool,

    /// Maximum number of concurrent workers (defaults to the number of CPUs)
    #[arg(short, long)]
    workers: Option<NonZeroUsize>,

    /// Keep walking straight ahead after a move instead of restarting with Right
    #[arg(short, long)]
    straight_ahead: bool,

    /// Report progress every N moves
    #[arg(short = 'f', long, default_value = "5000")]
    progress_interval: u64,

    /// Print the board after every move
    #[arg(short = 'p', long)]
    print_steps: bool,

    /// Play the level by hand instead of running the solver
    #[arg(long)]
    manual: bool,

    /// Print the board symbol legend
    #[arg(short, long)]
    info: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if args.info {
        print!("{}", manual::LEGEND);
    }

    let levels = match Levels::from_file(&args.levels_file) {
        Ok(levels) => levels,
        Err(e) => {
            eprintln!("Error loading levels: {}", e);
            std::process::exit(1);
        }
    };

    if args.level == 0 {
        eprintln!("Error: level numbers must be at least 1");
        std::process::exit(1);
    }

    let Some(start) = levels.get(args.level - 1) else {
        eprintln!(
            "Error: level {} not found (file contains {} levels)",
            args.level,
            levels.len()
        );
        std::process::exit(1);
    };

    if args.manual {
        let mut engine = start.clone();
        if let Err(e) = manual::play(&mut engine, io::stdin().lock(), io::stdout().lock()) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // The solver marks dead fields on its own engine; this copy is only shown.
    let mut preview = start.clone();
    let dead_fields = preview.mark_dead_fields();
    println!(
        "level: {}  boxes: {}  dead fields: {}\n{}",
        args.level,
        preview.box_count(),
        dead_fields,
        preview
    );

    let mut config = RunConfig {
        stop_after_first_solution: !args.multi,
        progress_interval: args.progress_interval,
        verbose_steps: args.print_steps,
        ..RunConfig::default()
    };
    if let Some(workers) = args.workers {
        config.max_workers = workers.get();
    }
    if args.straight_ahead {
        config.continuation = Continuation::ResumeDirection;
    }

    let observer = PrintingObserver { start };
    let solver = Solver::new(config, &observer);
    match solver.solve(start.clone()) {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
