//! Driver errors

use bank_wire::{NodeId, WireError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("No branch with id {0}")]
    UnknownBranch(NodeId),

    #[error("Branch {0} is defined more than once")]
    DuplicateBranch(NodeId),
}
