//! Branch replica actor
//!
//! Every branch runs exactly one processing loop fed by a bounded inbox.
//! Requests are handled strictly one at a time, so the balance and the peer
//! pool are owned by the loop and need no locks. Outbound propagation is
//! awaited inside that same loop: a branch never lists itself as a
//! propagation target, otherwise it would wait on its own inbox forever.

use std::sync::Arc;
use std::time::Duration;

use bank_wire::{Amount, NodeId, OperationKind, OperationRequest, OperationResponse, ResultKind, SourceKind};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::diagnostics::{DiagnosticLog, ReceivedMessage};
use crate::error::ReplicaError;
use crate::ledger::Ledger;
use crate::peers::{PeerPool, PeerTable};
use crate::transport::{PeerConnector, TcpConnector};
use crate::{DEFAULT_DIAGNOSTIC_CAPACITY, DEFAULT_INBOX_CAPACITY, DEFAULT_SETTLE_DELAY};

/// Replica tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Wait before answering a query
    pub settle_delay: Duration,
    /// Received requests retained for diagnostics
    pub diagnostic_capacity: usize,
    /// Requests queued in front of the actor
    pub inbox_capacity: usize,
    /// Per-peer call limit while propagating. `None` waits indefinitely.
    pub peer_call_timeout: Option<Duration>,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            diagnostic_capacity: DEFAULT_DIAGNOSTIC_CAPACITY,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            peer_call_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicaStats {
    pub requests_handled: u64,
    /// Propagate calls issued to peers
    pub propagations: u64,
    /// Peers that could not be reached while propagating
    pub peer_faults: u64,
    /// Customer writes reported as Error because a peer did not succeed
    pub downgraded_writes: u64,
}

/// Point-in-time view of a replica, taken between two requests
#[derive(Debug, Clone)]
pub struct ReplicaSnapshot {
    pub id: NodeId,
    pub balance: Amount,
    pub stats: ReplicaStats,
    pub pool_built: bool,
    pub recent: Vec<ReceivedMessage>,
}

enum Command {
    Deliver {
        request: OperationRequest,
        reply: oneshot::Sender<OperationResponse>,
    },
    Snapshot {
        reply: oneshot::Sender<ReplicaSnapshot>,
    },
    Shutdown,
}

/// Cloneable address of a running replica
#[derive(Clone)]
pub struct ReplicaHandle {
    id: NodeId,
    tx: mpsc::Sender<Command>,
}

impl ReplicaHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Queue a request and wait for the replica's answer
    pub async fn deliver(&self, request: OperationRequest) -> Result<OperationResponse, ReplicaError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Deliver { request, reply })
            .await
            .map_err(|_| ReplicaError::Stopped(self.id))?;
        rx.await.map_err(|_| ReplicaError::Stopped(self.id))
    }

    pub async fn snapshot(&self) -> Result<ReplicaSnapshot, ReplicaError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| ReplicaError::Stopped(self.id))?;
        rx.await.map_err(|_| ReplicaError::Stopped(self.id))
    }

    /// Stop the loop once the requests already queued have been handled
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

/// One branch: balance, peer pool and diagnostics
pub struct Replica {
    id: NodeId,
    ledger: Ledger,
    pool: PeerPool,
    diagnostics: DiagnosticLog,
    stats: ReplicaStats,
    config: ReplicaConfig,
}

impl Replica {
    pub fn new(id: NodeId, balance: Amount, pool: PeerPool, config: ReplicaConfig) -> Self {
        Self {
            id,
            ledger: Ledger::new(balance),
            pool,
            diagnostics: DiagnosticLog::new(config.diagnostic_capacity),
            stats: ReplicaStats::default(),
            config,
        }
    }

    pub fn balance(&self) -> Amount {
        self.ledger.balance()
    }

    pub fn stats(&self) -> &ReplicaStats {
        &self.stats
    }

    /// Start the processing loop on the current tokio runtime
    pub fn spawn(self) -> ReplicaHandle {
        let (tx, rx) = mpsc::channel(self.config.inbox_capacity.max(1));
        let handle = ReplicaHandle { id: self.id, tx };
        tokio::spawn(self.run(rx));
        handle
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) {
        tracing::info!("Branch {} started with balance {}", self.id, self.ledger.balance());

        while let Some(command) = inbox.recv().await {
            match command {
                Command::Deliver { request, reply } => {
                    let response = self.handle_message(request).await;
                    // The caller may have gone away; the write stands regardless
                    let _ = reply.send(response);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Shutdown => break,
            }
        }

        tracing::info!("Branch {} stopped with balance {}", self.id, self.ledger.balance());
    }

    fn snapshot(&self) -> ReplicaSnapshot {
        ReplicaSnapshot {
            id: self.id,
            balance: self.ledger.balance(),
            stats: self.stats.clone(),
            pool_built: self.pool.is_built(),
            recent: self.diagnostics.recent(),
        }
    }

    /// Classify a request by operation and source, apply it, and build the
    /// single response for the caller.
    ///
    /// | operation        | source   | action                                   |
    /// |------------------|----------|------------------------------------------|
    /// | Query            | any      | wait the settle delay, report balance    |
    /// | Deposit/Withdraw | Customer | apply, propagate on success, fold acks   |
    /// | Deposit/Withdraw | Branch   | apply locally only                       |
    pub async fn handle_message(&mut self, request: OperationRequest) -> OperationResponse {
        self.diagnostics.record(&request);
        self.stats.requests_handled += 1;
        tracing::info!(
            "Branch {} has received {} request from {} {}",
            self.id,
            request.operation,
            request.source,
            request.requester_id
        );

        let result = match (request.operation, request.source) {
            (OperationKind::Query, _) => {
                tokio::time::sleep(self.config.settle_delay).await;
                ResultKind::Success
            }
            (operation, SourceKind::Customer) => {
                let local = self.apply(operation, request.amount);
                if local.is_success() {
                    self.propagate(operation, request.amount).await
                } else {
                    local
                }
            }
            (operation, SourceKind::Branch) => self.apply(operation, request.amount),
        };

        tracing::info!(
            "Branch {} after {} {} from {} {}: {}, balance {}",
            self.id,
            request.operation,
            request.amount,
            request.source,
            request.requester_id,
            result,
            self.ledger.balance()
        );

        OperationResponse::from_branch(result, self.id, self.ledger.balance())
    }

    fn apply(&mut self, operation: OperationKind, amount: Amount) -> ResultKind {
        match operation {
            OperationKind::Deposit => self.ledger.deposit(amount),
            OperationKind::Withdraw => self.ledger.withdraw(amount),
            OperationKind::Query => ResultKind::Success,
        }
    }

    /// Fan a locally applied customer write out to every peer. The local
    /// mutation is never rolled back; a peer that did not succeed only turns
    /// the customer's result into Error.
    async fn propagate(&mut self, operation: OperationKind, amount: Amount) -> ResultKind {
        let outcome = self.pool.propagate(operation, amount).await;
        self.stats.propagations += outcome.acks.len() as u64;
        self.stats.peer_faults += outcome.unreachable_count() as u64;

        if outcome.all_success() {
            ResultKind::Success
        } else {
            self.stats.downgraded_writes += 1;
            tracing::warn!(
                "Branch {} {} of {} not acknowledged by every peer ({} rejected, {} unreachable)",
                self.id,
                operation,
                amount,
                outcome.rejected_count(),
                outcome.unreachable_count()
            );
            ResultKind::Error
        }
    }
}

/// Builder for Replica
pub struct ReplicaBuilder {
    id: NodeId,
    balance: Amount,
    peers: PeerTable,
    connector: Arc<dyn PeerConnector>,
    config: ReplicaConfig,
}

impl ReplicaBuilder {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            balance: 0,
            peers: PeerTable::new(),
            connector: Arc::new(TcpConnector),
            config: ReplicaConfig::default(),
        }
    }

    pub fn balance(mut self, balance: Amount) -> Self {
        self.balance = balance;
        self
    }

    /// Full branch table; the replica's own entry is skipped when propagating
    pub fn peers(mut self, peers: PeerTable) -> Self {
        self.peers = peers;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn PeerConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(mut self, config: ReplicaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn build(self) -> Replica {
        let pool = PeerPool::new(self.id, self.peers, self.connector)
            .with_call_timeout(self.config.peer_call_timeout);
        Replica::new(self.id, self.balance, pool, self.config)
    }

    pub fn spawn(self) -> ReplicaHandle {
        self.build().spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solo(balance: Amount) -> Replica {
        ReplicaBuilder::new(1)
            .balance(balance)
            .settle_delay(Duration::ZERO)
            .build()
    }

    #[tokio::test]
    async fn test_customer_deposit_without_peers() {
        let mut replica = solo(100);
        let resp = replica
            .handle_message(OperationRequest::customer(OperationKind::Deposit, 1, 50))
            .await;

        assert_eq!(resp.result, ResultKind::Success);
        assert_eq!(resp.amount, 150);
        assert_eq!(resp.responder_id, 1);
        assert_eq!(resp.source, SourceKind::Branch);
        assert_eq!(replica.stats().propagations, 0);
    }

    #[tokio::test]
    async fn test_overdraw_reports_failure_and_unchanged_balance() {
        let mut replica = solo(100);
        let resp = replica
            .handle_message(OperationRequest::customer(OperationKind::Withdraw, 1, 120))
            .await;

        assert_eq!(resp.result, ResultKind::Failure);
        assert_eq!(resp.amount, 100);
        assert_eq!(replica.balance(), 100);
    }

    #[tokio::test]
    async fn test_negative_deposit_reports_error() {
        let mut replica = solo(100);
        let resp = replica
            .handle_message(OperationRequest::customer(OperationKind::Deposit, 1, -10))
            .await;

        assert_eq!(resp.result, ResultKind::Error);
        assert_eq!(resp.amount, 100);
    }

    #[tokio::test]
    async fn test_branch_sourced_write_applies_locally() {
        let mut replica = solo(100);
        let resp = replica
            .handle_message(OperationRequest::propagate(OperationKind::Withdraw, 2, 30))
            .await;

        assert_eq!(resp.result, ResultKind::Success);
        assert_eq!(resp.amount, 70);
    }

    #[tokio::test]
    async fn test_query_reports_balance_without_mutation() {
        let mut replica = solo(42);
        let resp = replica
            .handle_message(OperationRequest::customer(OperationKind::Query, 1, 999))
            .await;

        assert_eq!(resp.result, ResultKind::Success);
        assert_eq!(resp.amount, 42);
        assert_eq!(replica.balance(), 42);
    }

    #[tokio::test]
    async fn test_handle_stops_after_shutdown() {
        let handle = solo(10).spawn();
        assert_eq!(handle.snapshot().await.unwrap().balance, 10);

        handle.shutdown().await;
        let err = handle
            .deliver(OperationRequest::customer(OperationKind::Query, 1, 0))
            .await
            .unwrap_err();
        assert_eq!(err, ReplicaError::Stopped(1));
    }
}
