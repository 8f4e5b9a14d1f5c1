use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span};

use crate::engine::{Direction, Engine};
use crate::error::{SolveError, StructuralError};
use crate::history::VisitedTrie;
use crate::path::{Node, Path};

/// How the rotation of a freshly entered depth is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Keep walking in the direction that led here.
    ResumeDirection,
    /// Always start again with Right.
    ResetDirection,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub max_workers: usize,
    pub stop_after_first_solution: bool,
    pub continuation: Continuation,
    /// Emit a progress event every this many successful moves.
    pub progress_interval: u64,
    pub verbose_steps: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            max_workers: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            stop_after_first_solution: true,
            continuation: Continuation::ResetDirection,
            progress_interval: 5000,
            verbose_steps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionEvent {
    /// 1-based, in order of discovery.
    pub index: usize,
    /// Run-wide successful moves when the solution was found.
    pub steps: u64,
    pub elapsed: Duration,
    /// Every move from the initial state to the solved state.
    pub directions: Vec<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub steps: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub steps: u64,
    pub solutions: usize,
    pub solution_steps: Vec<u64>,
    /// Distinct configurations recorded in the visited trie.
    pub configurations: usize,
    /// Fields marked dead before the search started.
    pub dead_fields: usize,
    pub elapsed: Duration,
    /// The whole reachable space was enumerated (no early stop).
    pub exhausted: bool,
}

/// Receives events from the workers. Called concurrently from every worker
/// thread.
pub trait RunObserver: Sync {
    fn on_solution(&self, _event: &SolutionEvent) {}

    fn on_progress(&self, _event: &ProgressEvent) {}

    /// Called after every successful move when verbose step printing is on.
    fn on_step(&self, _worker: usize, _engine: &Engine) {}
}

pub struct NullObserver;

impl RunObserver for NullObserver {}

/// State shared by every worker of one run.
struct RunContext<'a, O: RunObserver> {
    config: RunConfig,
    observer: &'a O,
    visited: VisitedTrie,
    steps: AtomicU64,
    solution_steps: Mutex<Vec<u64>>,
    running: AtomicBool,
    active_workers: AtomicUsize,
    next_worker: AtomicUsize,
    failure: Mutex<Option<StructuralError>>,
    start: Instant,
}

impl<'a, O: RunObserver> RunContext<'a, O> {
    fn new(config: &RunConfig, observer: &'a O) -> Self {
        let config = RunConfig {
            max_workers: config.max_workers.max(1),
            progress_interval: config.progress_interval.max(1),
            ..config.clone()
        };
        RunContext {
            config,
            observer,
            visited: VisitedTrie::new(),
            steps: AtomicU64::new(0),
            solution_steps: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
            active_workers: AtomicUsize::new(0),
            next_worker: AtomicUsize::new(0),
            failure: Mutex::new(None),
            start: Instant::now(),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn fail(&self, err: StructuralError) {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(err);
        self.stop();
    }

    /// Take a worker slot if one is free right now. Never waits.
    fn try_acquire_slot(&self) -> bool {
        let max = self.config.max_workers;
        self.active_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < max).then_some(active + 1)
            })
            .is_ok()
    }

    fn release_slot(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    fn next_worker_id(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed)
    }

    fn count_step(&self) -> u64 {
        let steps = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if steps % self.config.progress_interval == 0 {
            let event = ProgressEvent {
                steps,
                elapsed: self.start.elapsed(),
            };
            info!(steps, elapsed = ?event.elapsed, "progress");
            self.observer.on_progress(&event);
        }
        steps
    }

    /// Record a solution. Returns false if it was dropped because a single
    /// solution was requested and another worker got there first.
    fn record_solution(&self, directions: Vec<Direction>) -> bool {
        let (index, steps) = {
            let mut solutions = self
                .solution_steps
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.config.stop_after_first_solution && !solutions.is_empty() {
                return false;
            }
            // Read under the lock so the recorded counts never decrease.
            let steps = self.steps.load(Ordering::Relaxed);
            solutions.push(steps);
            (solutions.len(), steps)
        };

        let event = SolutionEvent {
            index,
            steps,
            elapsed: self.start.elapsed(),
            directions,
        };
        info!(index, steps, moves = event.directions.len(), "solution found");
        self.observer.on_solution(&event);
        true
    }
}

/// One search branch: an exclusively owned engine and path.
struct Worker {
    id: usize,
    engine: Engine,
    path: Path,
    /// Moves made before this branch was forked off its parent.
    prefix: Vec<Direction>,
}

impl Worker {
    fn run<'s, O: RunObserver>(mut self, ctx: &'s RunContext<'_, O>, scope: &rayon::Scope<'s>) {
        let span = info_span!("worker", id = self.id);
        let _enter = span.enter();
        debug!(depth = self.prefix.len(), "worker started");

        if let Err(err) = self.search(ctx, scope) {
            error!(%err, "worker aborted");
            ctx.fail(err);
        }

        ctx.release_slot();
        debug!("worker finished");
    }

    fn search<'s, O: RunObserver>(
        &mut self,
        ctx: &'s RunContext<'_, O>,
        scope: &rayon::Scope<'s>,
    ) -> Result<(), StructuralError> {
        while ctx.is_running() {
            if self.path.is_empty() {
                debug!("search space exhausted");
                return Ok(());
            }

            let (dir, retrying) = {
                let node = self.path.current_mut()?;
                let dir = node.rotate();
                if !node.exhausted() {
                    (dir, false)
                } else if let Some(parked) = node.pop_ignored() {
                    node.set_direction(parked);
                    (parked, true)
                } else {
                    debug!(depth = self.path.depth(), "rotation finished, backtracking");
                    self.backtrack()?;
                    continue;
                }
            };

            // Never pull a box off a goal while other options remain.
            if !retrying && self.pushes_off_goal(dir) {
                debug!(%dir, "parking push off a goal");
                self.path.current_mut()?.push_ignored(dir);
                continue;
            }

            let pushed = match self.engine.move_figure(dir) {
                Ok(pushed) => pushed,
                Err(reason) => {
                    debug!(%dir, %reason, "cannot move");
                    continue;
                }
            };

            if !ctx.visited.visit(&self.engine.configuration()) {
                debug!(%dir, "been here already");
                self.engine.undo_step()?;
                continue;
            }

            self.path.push(match ctx.config.continuation {
                Continuation::ResumeDirection => Node::starting_at(dir),
                Continuation::ResetDirection => Node::new(),
            });
            ctx.count_step();
            if ctx.config.verbose_steps {
                ctx.observer.on_step(self.id, &self.engine);
            }

            if pushed.is_some() && self.engine.won() {
                if ctx.record_solution(self.walked_directions()) && ctx.config.stop_after_first_solution
                {
                    ctx.stop();
                }
                if !ctx.is_running() {
                    return Ok(());
                }
                self.engine.undo_step()?;
                self.path.pop()?;
                continue;
            }

            if ctx.try_acquire_slot() {
                let child = self.fork(ctx)?;
                info!(child = child.id, depth = child.prefix.len(), "forking worker");
                scope.spawn(move |s| child.run(ctx, s));
                // The child continues from here; this branch moves on.
                self.engine.undo_step()?;
                self.path.pop()?;
            }
        }
        Ok(())
    }

    /// Drop the current depth and step back to its parent.
    fn backtrack(&mut self) -> Result<(), StructuralError> {
        self.path.pop()?;
        // The bottom node of a branch sits at the fork point: there is no move
        // of this worker's to undo.
        if !self.path.is_empty() {
            self.engine.undo_step()?;
        }
        Ok(())
    }

    fn pushes_off_goal(&self, dir: Direction) -> bool {
        self.engine
            .board()
            .get(self.engine.figure().step(dir))
            .is_some_and(|f| f.is_goal() && f.box_id().is_some())
    }

    fn walked_directions(&self) -> Vec<Direction> {
        let mut directions = self.prefix.clone();
        directions.extend(self.path.directions());
        directions
    }

    fn fork<O: RunObserver>(&self, ctx: &RunContext<'_, O>) -> Result<Worker, StructuralError> {
        Ok(Worker {
            id: ctx.next_worker_id(),
            engine: self.engine.clone(),
            path: self.path.fork()?,
            prefix: self.walked_directions(),
        })
    }
}

/// Concurrent backtracking search for box-pushing solutions.
pub struct Solver<'a, O: RunObserver> {
    config: RunConfig,
    observer: &'a O,
}

impl<'a, O: RunObserver> Solver<'a, O> {
    pub fn new(config: RunConfig, observer: &'a O) -> Self {
        Solver { config, observer }
    }

    /// Mark dead fields, then search until the reachable space is exhausted or,
    /// in single-solution mode, until the first solution.
    pub fn solve(&self, mut engine: Engine) -> Result<Summary, SolveError> {
        let dead_fields = engine.mark_dead_fields();
        info!(
            dead_fields,
            boxes = engine.box_count(),
            workers = self.config.max_workers,
            "starting search"
        );

        let ctx = RunContext::new(&self.config, self.observer);
        ctx.visited.add_history(&engine.configuration());

        if engine.won() && ctx.record_solution(Vec::new()) && ctx.config.stop_after_first_solution {
            ctx.stop();
        }

        if ctx.is_running() {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(ctx.config.max_workers)
                .thread_name(|i| format!("sokobot-worker-{}", i))
                .build()?;

            let mut path = Path::new();
            path.push(Node::new());
            let root = Worker {
                id: ctx.next_worker_id(),
                engine,
                path,
                prefix: Vec::new(),
            };

            let ctx = &ctx;
            if ctx.try_acquire_slot() {
                pool.scope(move |s| {
                    s.spawn(move |s| root.run(ctx, s));
                });
            }
        }

        if let Some(err) = *ctx.failure.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(err.into());
        }

        let solution_steps = ctx
            .solution_steps
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let summary = Summary {
            steps: ctx.steps.load(Ordering::Relaxed),
            solutions: solution_steps.len(),
            solution_steps,
            configurations: ctx.visited.len(),
            dead_fields,
            elapsed: ctx.start.elapsed(),
            exhausted: ctx.running.load(Ordering::Acquire),
        };
        info!(
            steps = summary.steps,
            solutions = summary.solutions,
            elapsed = ?summary.elapsed,
            "run finished"
        );
        Ok(summary)
    }
}
