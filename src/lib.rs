//! Concurrent backtracking solver for box-pushing (Sokoban) puzzles.

pub mod deadlocks;
pub mod engine;
pub mod error;
pub mod history;
pub mod levels;
pub mod manual;
pub mod path;
pub mod solver;

pub use engine::{Board, BoxId, Direction, Engine, Field, MoveRecord, Point};
pub use error::{InvalidMove, SolveError, StructuralError};
pub use history::VisitedTrie;
pub use levels::{LevelError, Levels};
pub use path::{Node, Path};
pub use solver::{
    Continuation, NullObserver, ProgressEvent, RunConfig, RunObserver, SolutionEvent, Solver,
    Summary,
};
