//! Bank branch replica
//!
//! Each branch owns one balance and serves customer and peer requests:
//! - Requests are handled one at a time by a single actor task per branch
//! - Customer writes are applied locally, then pushed to every other branch
//!   in turn, and the peer acknowledgements are folded into one result
//! - Branch-sourced writes are applied locally and never forwarded again
//! - Queries wait a fixed settle delay before reading the balance

pub mod diagnostics;
pub mod error;
pub mod ledger;
pub mod peers;
pub mod replica;
pub mod server;
pub mod transport;

#[cfg(test)]
mod tests;

pub use diagnostics::{DiagnosticLog, ReceivedMessage};
pub use error::{ReplicaError, TransportError};
pub use ledger::Ledger;
pub use peers::{PeerAck, PeerOutcome, PeerPool, PeerTable, PropagateOutcome};
pub use replica::{Replica, ReplicaBuilder, ReplicaConfig, ReplicaHandle, ReplicaSnapshot, ReplicaStats};
pub use server::{start_branch, BranchServer, BranchSpec, RunningBranch};
pub use transport::{MemoryNetwork, PeerChannel, PeerConnector, TcpChannel, TcpConnector};

use std::time::Duration;

/// How long a query waits before reading the balance. A heuristic for letting
/// in-flight propagations land, not a consistency guarantee.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Received requests kept for diagnostics
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 1024;

/// Pending requests queued in front of the replica actor
pub const DEFAULT_INBOX_CAPACITY: usize = 256;
