//! Peer connection pool and the propagate protocol
//!
//! The pool owns one slot per peer branch (self excluded). Slots are built
//! the first time a write is propagated and kept for the life of the
//! replica. A slot dials lazily; a failed call drops its stream and the next
//! propagate dials again. There is no retry within a call.

use std::sync::Arc;
use std::time::Duration;

use bank_wire::{Amount, NodeId, OperationKind, OperationRequest, OperationResponse, ResultKind};

use crate::error::TransportError;
use crate::transport::{PeerChannel, PeerConnector};

/// Branch id → address, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerTable {
    entries: Vec<(NodeId, String)>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, S)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (id, addr) in entries {
            table.insert(id, addr);
        }
        table
    }

    /// Add a branch, or replace its address in place if already present
    pub fn insert(&mut self, id: NodeId, addr: impl Into<String>) {
        let addr = addr.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = addr,
            None => self.entries.push((id, addr)),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, addr)| addr.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.entries.iter().map(|(id, addr)| (*id, addr.as_str()))
    }

    /// Broadcast targets for `self_id`: everyone else, in table order
    pub fn without(&self, self_id: NodeId) -> impl Iterator<Item = (NodeId, &str)> {
        self.iter().filter(move |(id, _)| *id != self_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a single peer made of a propagated write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAck {
    /// The peer answered
    Replied(ResultKind),
    /// No answer: connect failure, broken stream or timeout
    Unreachable(String),
}

impl PeerAck {
    pub fn is_success(&self) -> bool {
        matches!(self, PeerAck::Replied(ResultKind::Success))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerOutcome {
    pub peer_id: NodeId,
    pub ack: PeerAck,
}

/// Acknowledgements from one propagate round, in table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagateOutcome {
    pub acks: Vec<PeerOutcome>,
}

impl PropagateOutcome {
    /// True iff every peer replied Success (vacuously true with no peers)
    pub fn all_success(&self) -> bool {
        self.acks.iter().all(|outcome| outcome.ack.is_success())
    }

    pub fn unreachable_count(&self) -> usize {
        self.acks
            .iter()
            .filter(|outcome| matches!(outcome.ack, PeerAck::Unreachable(_)))
            .count()
    }

    pub fn rejected_count(&self) -> usize {
        self.acks
            .iter()
            .filter(|outcome| matches!(outcome.ack, PeerAck::Replied(result) if !result.is_success()))
            .count()
    }
}

struct PeerSlot {
    id: NodeId,
    addr: String,
    channel: Option<Box<dyn PeerChannel>>,
}

impl PeerSlot {
    async fn call(
        &mut self,
        connector: &dyn PeerConnector,
        request: OperationRequest,
        timeout: Option<Duration>,
    ) -> Result<OperationResponse, TransportError> {
        let mut channel = match self.channel.take() {
            Some(channel) => channel,
            None => connector.connect(self.id, &self.addr).await?,
        };

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, channel.call(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::TimedOut(limit)),
            },
            None => channel.call(request).await,
        };

        // A stream in an unknown state is not worth keeping
        if result.is_ok() {
            self.channel = Some(channel);
        }
        result
    }
}

/// Lazily built connection handles to every other branch
pub struct PeerPool {
    self_id: NodeId,
    table: PeerTable,
    connector: Arc<dyn PeerConnector>,
    call_timeout: Option<Duration>,
    slots: Option<Vec<PeerSlot>>,
}

impl PeerPool {
    pub fn new(self_id: NodeId, table: PeerTable, connector: Arc<dyn PeerConnector>) -> Self {
        Self {
            self_id,
            table,
            connector,
            call_timeout: None,
            slots: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Number of broadcast targets
    pub fn peer_count(&self) -> usize {
        self.table.without(self.self_id).count()
    }

    /// Whether the connection handles have been built yet
    pub fn is_built(&self) -> bool {
        self.slots.is_some()
    }

    fn slots(&mut self) -> &mut Vec<PeerSlot> {
        let self_id = self.self_id;
        let table = &self.table;
        self.slots.get_or_insert_with(|| {
            tracing::info!(
                "Branch {} creating connection handles for {} peers",
                self_id,
                table.without(self_id).count()
            );
            table
                .without(self_id)
                .map(|(id, addr)| PeerSlot {
                    id,
                    addr: addr.to_string(),
                    channel: None,
                })
                .collect()
        })
    }

    /// Send `operation` to every peer, one after another, as a
    /// branch-sourced request and collect what each one answered.
    ///
    /// Latency is the sum of the per-peer latencies; a slow peer stalls the
    /// whole round.
    pub async fn propagate(&mut self, operation: OperationKind, amount: Amount) -> PropagateOutcome {
        let self_id = self.self_id;
        let connector = self.connector.clone();
        let timeout = self.call_timeout;
        let slots = self.slots();

        let mut acks = Vec::with_capacity(slots.len());
        for slot in slots.iter_mut() {
            let request = OperationRequest::propagate(operation, self_id, amount);
            let ack = match slot.call(connector.as_ref(), request, timeout).await {
                Ok(response) => {
                    tracing::info!(
                        "Propagate {} response from branch {}: {}",
                        operation,
                        response.responder_id,
                        response.result
                    );
                    PeerAck::Replied(response.result)
                }
                Err(e) => {
                    tracing::warn!("Propagate {} to branch {} failed: {}", operation, slot.id, e);
                    PeerAck::Unreachable(e.to_string())
                }
            };
            acks.push(PeerOutcome {
                peer_id: slot.id,
                ack,
            });
        }

        PropagateOutcome { acks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryNetwork;
    use async_trait::async_trait;
    use bank_wire::SourceKind;
    use tokio::time::Instant;

    /// Every call answers Success after a fixed delay
    struct SlowConnector {
        delay: Duration,
    }

    struct SlowChannel {
        peer_id: NodeId,
        delay: Duration,
    }

    #[async_trait]
    impl PeerConnector for SlowConnector {
        async fn connect(&self, peer_id: NodeId, _addr: &str) -> Result<Box<dyn PeerChannel>, TransportError> {
            Ok(Box::new(SlowChannel {
                peer_id,
                delay: self.delay,
            }))
        }
    }

    #[async_trait]
    impl PeerChannel for SlowChannel {
        async fn call(&mut self, request: OperationRequest) -> Result<OperationResponse, TransportError> {
            assert_eq!(request.source, SourceKind::Branch);
            tokio::time::sleep(self.delay).await;
            Ok(OperationResponse::from_branch(ResultKind::Success, self.peer_id, request.amount))
        }
    }

    #[test]
    fn test_table_keeps_configuration_order() {
        let table = PeerTable::from_entries([(3, "c"), (1, "a"), (2, "b")]);
        let ids: Vec<NodeId> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        let targets: Vec<NodeId> = table.without(1).map(|(id, _)| id).collect();
        assert_eq!(targets, vec![3, 2]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut table = PeerTable::from_entries([(1, "a"), (2, "b")]);
        table.insert(1, "a2");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some("a2"));
        assert_eq!(table.iter().next(), Some((1, "a2")));
    }

    #[test]
    fn test_outcome_aggregation() {
        let outcome = PropagateOutcome {
            acks: vec![
                PeerOutcome { peer_id: 2, ack: PeerAck::Replied(ResultKind::Success) },
                PeerOutcome { peer_id: 3, ack: PeerAck::Replied(ResultKind::Failure) },
                PeerOutcome { peer_id: 4, ack: PeerAck::Unreachable("down".to_string()) },
            ],
        };
        assert!(!outcome.all_success());
        assert_eq!(outcome.rejected_count(), 1);
        assert_eq!(outcome.unreachable_count(), 1);

        assert!(PropagateOutcome::default().all_success());
    }

    #[tokio::test]
    async fn test_unregistered_peer_is_unreachable() {
        let network = MemoryNetwork::new();
        let table = PeerTable::from_entries([(1, "mem://1"), (2, "mem://2")]);
        let mut pool = PeerPool::new(1, table, network.connector());
        assert_eq!(pool.peer_count(), 1);
        assert!(!pool.is_built());

        let outcome = pool.propagate(OperationKind::Deposit, 10).await;
        assert!(pool.is_built());
        assert_eq!(outcome.acks.len(), 1);
        assert_eq!(outcome.acks[0].peer_id, 2);
        assert!(matches!(outcome.acks[0].ack, PeerAck::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_peers_are_called_one_after_another_in_table_order() {
        let delay = Duration::from_millis(50);
        let table = PeerTable::from_entries([(4, "d"), (1, "a"), (2, "b"), (3, "c")]);
        let expected: Vec<NodeId> = table.without(1).map(|(id, _)| id).collect();
        let mut pool = PeerPool::new(1, table, Arc::new(SlowConnector { delay }));

        let started = Instant::now();
        let outcome = pool.propagate(OperationKind::Deposit, 10).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= delay * 3, "propagate took {:?}", elapsed);
        let ids: Vec<NodeId> = outcome.acks.iter().map(|outcome| outcome.peer_id).collect();
        assert_eq!(ids, expected);
        assert!(outcome.all_success());
    }
}
