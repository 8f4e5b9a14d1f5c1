use thiserror::Error;

/// Reasons a figure move is rejected. Every variant is ordinary search control
/// flow: the caller simply tries the next direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidMove {
    #[error("target cell is outside the board")]
    OffBoard,
    #[error("target cell is a wall")]
    Wall,
    #[error("box is blocked by a wall, another box or the board border")]
    Blocked,
    #[error("box would be pushed onto a dead field")]
    DeadField,
}

/// Bookkeeping violations. These indicate a logic defect; the affected worker
/// stops and the run is aborted since the search state can no longer be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("cannot undo: move history is empty")]
    EmptyHistory,
    #[error("search path is empty")]
    EmptyPath,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("failed to start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
