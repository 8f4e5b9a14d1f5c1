use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::engine::{Direction, Engine};

/// Symbols used when a board is printed.
pub const LEGEND: &str = "\
Board symbols:
  ' '  floor
  '#'  wall
  '.'  goal
  '$'  box
  '*'  box on goal
  '@'  figure
  '+'  figure on goal
  'x'  dead field
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Undo,
    Quit,
}

impl Command {
    /// `r d l u` (any case) or the digits `0`-`3` move, `b` or any other
    /// digit undoes the last move, `q` quits.
    pub fn parse(token: char) -> Option<Command> {
        match token.to_ascii_lowercase() {
            'r' => Some(Command::Move(Direction::Right)),
            'd' => Some(Command::Move(Direction::Down)),
            'l' => Some(Command::Move(Direction::Left)),
            'u' => Some(Command::Move(Direction::Up)),
            'b' => Some(Command::Undo),
            'q' => Some(Command::Quit),
            c => match c.to_digit(10)? {
                d @ 0..=3 => Some(Command::Move(Direction::from_index(d as usize))),
                _ => Some(Command::Undo),
            },
        }
    }
}

/// Interactive play: read commands from `input` line by line, apply them to
/// `engine` and print the board after each one. Stops on `q` or end of input.
pub fn play<R: BufRead, W: Write>(engine: &mut Engine, input: R, mut output: W) -> io::Result<()> {
    writeln!(output, "Manual mode (r d l u or 0-3 to move, b to undo, q to quit)")?;
    writeln!(output, "{}", engine)?;

    for line in input.lines() {
        for token in line?.chars().filter(|c| !c.is_whitespace()) {
            let Some(command) = Command::parse(token) else {
                writeln!(output, "unknown command '{}'", token)?;
                continue;
            };
            debug!(?command, "manual command");

            match command {
                Command::Quit => return Ok(()),
                Command::Move(dir) => {
                    if let Err(reason) = engine.move_figure(dir) {
                        writeln!(output, "cannot move {}: {}", dir, reason)?;
                        continue;
                    }
                }
                Command::Undo => {
                    if let Err(err) = engine.undo_step() {
                        writeln!(output, "{}", err)?;
                        continue;
                    }
                }
            }

            writeln!(output, "{}", engine)?;
            if engine.won() {
                writeln!(output, "solved in {} moves", engine.history_len())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Point;
    use std::io::Cursor;

    const CORRIDOR: &str = "######\n\
                            #@$ .#\n\
                            ######";

    fn run(input: &str) -> (Engine, String) {
        let mut engine = Engine::from_text(CORRIDOR).unwrap();
        let mut output = Vec::new();
        play(&mut engine, Cursor::new(input), &mut output).unwrap();
        (engine, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse('R'), Some(Command::Move(Direction::Right)));
        assert_eq!(Command::parse('u'), Some(Command::Move(Direction::Up)));
        assert_eq!(Command::parse('1'), Some(Command::Move(Direction::Down)));
        assert_eq!(Command::parse('3'), Some(Command::Move(Direction::Up)));
        assert_eq!(Command::parse('7'), Some(Command::Undo));
        assert_eq!(Command::parse('b'), Some(Command::Undo));
        assert_eq!(Command::parse('Q'), Some(Command::Quit));
        assert_eq!(Command::parse('?'), None);
    }

    #[test]
    fn test_play_to_solution() {
        let (engine, output) = run("0\nr\n");
        assert!(engine.won());
        assert_eq!(engine.history_len(), 2);
        assert!(output.contains("#  @*#"));
        assert!(output.contains("solved in 2 moves"));
    }

    #[test]
    fn test_undo_and_rejections() {
        let (engine, output) = run("r 9 b l q r");
        assert_eq!(engine.history_len(), 0);
        assert_eq!(engine.figure(), Point::new(1, 1));
        assert!(output.contains("cannot move Left"));
        assert!(output.contains("cannot undo"));
        assert!(!output.contains("solved"));
    }

    #[test]
    fn test_unknown_command_is_reported() {
        let (engine, output) = run("?r");
        assert!(output.contains("unknown command '?'"));
        assert_eq!(engine.history_len(), 1);
    }
}
