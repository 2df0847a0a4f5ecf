//! Node Configuration

use std::time::Duration;

use bank_branch::{ReplicaConfig, DEFAULT_DIAGNOSTIC_CAPACITY, DEFAULT_SETTLE_DELAY};
use bank_wire::NodeId;
use clap::Args;

/// Replica tuning shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ReplicaArgs {
    /// Wait before answering a query, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SETTLE_DELAY.as_millis() as u64)]
    pub settle_delay_ms: u64,

    /// Give up on a peer call after this many milliseconds (default: wait forever)
    #[arg(long)]
    pub peer_timeout_ms: Option<u64>,

    /// Received requests kept per branch for diagnostics
    #[arg(long, default_value_t = DEFAULT_DIAGNOSTIC_CAPACITY)]
    pub diagnostic_capacity: usize,
}

impl ReplicaArgs {
    pub fn replica_config(&self) -> ReplicaConfig {
        ReplicaConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            peer_call_timeout: self.peer_timeout_ms.map(Duration::from_millis),
            diagnostic_capacity: self.diagnostic_capacity,
            ..ReplicaConfig::default()
        }
    }
}

/// Parse `<id>=<host:port>`
pub fn parse_peer(s: &str) -> Result<(NodeId, String), String> {
    let (id, addr) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <id>=<host:port>, got `{}`", s))?;
    let id = id
        .trim()
        .parse::<NodeId>()
        .map_err(|e| format!("invalid branch id `{}`: {}", id, e))?;
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(format!("missing address for branch {}", id));
    }
    Ok((id, addr.to_string()))
}
