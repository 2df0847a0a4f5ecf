//! Multi-branch scenarios


use std::time::Duration;

use bank_wire::{Amount, NodeId};

use crate::peers::PeerTable;
use crate::replica::{ReplicaBuilder, ReplicaConfig, ReplicaHandle};
use crate::transport::MemoryNetwork;

pub(crate) fn mem_addr(id: NodeId) -> String {
    format!("mem://branch-{}", id)
}

pub(crate) fn fast_config() -> ReplicaConfig {
    ReplicaConfig {
        settle_delay: Duration::from_millis(5),
        ..ReplicaConfig::default()
    }
}

/// Spawn one replica per `(id, balance)` on an in-memory network where every
/// branch knows every other branch.
pub(crate) fn spawn_cluster(
    network: &MemoryNetwork,
    branches: &[(NodeId, Amount)],
    config: ReplicaConfig,
) -> Vec<ReplicaHandle> {
    let table = PeerTable::from_entries(branches.iter().map(|(id, _)| (*id, mem_addr(*id))));

    branches
        .iter()
        .map(|(id, balance)| {
            let handle = ReplicaBuilder::new(*id)
                .balance(*balance)
                .peers(table.clone())
                .connector(network.connector())
                .config(config.clone())
                .spawn();
            network.register(&mem_addr(*id), handle.clone());
            handle
        })
        .collect()
}
