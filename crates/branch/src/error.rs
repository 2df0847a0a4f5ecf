//! Branch errors

use std::time::Duration;

use bank_wire::{NodeId, WireError};
use thiserror::Error;

/// Failures reaching a peer branch. All of them count as a non-success
/// acknowledgement when propagating.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to branch {peer_id} at {addr}: {source}")]
    Connect {
        peer_id: NodeId,
        addr: String,
        source: std::io::Error,
    },

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Branch at {0} is unreachable")]
    Unreachable(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaError {
    #[error("Branch {0} has stopped")]
    Stopped(NodeId),
}
