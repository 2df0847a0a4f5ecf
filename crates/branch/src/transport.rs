//! Outbound transport to peer branches
//!
//! [`PeerConnector`] opens a channel to a peer, [`PeerChannel`] carries one
//! request/response exchange at a time. TCP is the production transport;
//! [`MemoryNetwork`] routes straight to in-process replica handles and can
//! cut individual branches off.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bank_wire::{read_frame, write_frame, NodeId, OperationRequest, OperationResponse};
use parking_lot::RwLock;
use tokio::net::TcpStream;

use crate::error::TransportError;
use crate::replica::ReplicaHandle;

/// An open connection to one peer branch
#[async_trait]
pub trait PeerChannel: Send {
    /// Send one request and wait for its response
    async fn call(&mut self, request: OperationRequest) -> Result<OperationResponse, TransportError>;
}

/// Factory for peer channels
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, peer_id: NodeId, addr: &str) -> Result<Box<dyn PeerChannel>, TransportError>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl PeerConnector for TcpConnector {
    async fn connect(&self, peer_id: NodeId, addr: &str) -> Result<Box<dyn PeerChannel>, TransportError> {
        let channel = TcpChannel::connect(peer_id, addr).await?;
        Ok(Box::new(channel))
    }
}

/// One persistent TCP stream to a branch
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    pub async fn connect(peer_id: NodeId, addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                peer_id,
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| TransportError::Connect {
            peer_id,
            addr: addr.to_string(),
            source,
        })?;
        tracing::debug!("Connected to branch {} at {}", peer_id, addr);
        Ok(Self { stream })
    }
}

#[async_trait]
impl PeerChannel for TcpChannel {
    async fn call(&mut self, request: OperationRequest) -> Result<OperationResponse, TransportError> {
        write_frame(&mut self.stream, &request).await?;
        let response = read_frame(&mut self.stream).await?;
        Ok(response)
    }
}

#[derive(Default)]
struct MemoryNetworkState {
    endpoints: HashMap<String, ReplicaHandle>,
    isolated: HashSet<String>,
    calls: HashMap<String, u64>,
}

/// In-process network of replica handles keyed by address
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<RwLock<MemoryNetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` reachable at `addr`
    pub fn register(&self, addr: &str, handle: ReplicaHandle) {
        self.state.write().endpoints.insert(addr.to_string(), handle);
    }

    /// Cut `addr` off: connects and calls to it fail until healed
    pub fn isolate(&self, addr: &str) {
        self.state.write().isolated.insert(addr.to_string());
    }

    pub fn heal(&self, addr: &str) {
        self.state.write().isolated.remove(addr);
    }

    /// Calls that reached the branch at `addr`
    pub fn calls_to(&self, addr: &str) -> u64 {
        self.state.read().calls.get(addr).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u64 {
        self.state.read().calls.values().sum()
    }

    pub fn connector(&self) -> Arc<dyn PeerConnector> {
        Arc::new(MemoryConnector {
            network: self.clone(),
        })
    }

    fn endpoint(&self, addr: &str) -> Result<ReplicaHandle, TransportError> {
        let state = self.state.read();
        if state.isolated.contains(addr) {
            return Err(TransportError::Unreachable(addr.to_string()));
        }
        state
            .endpoints
            .get(addr)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable(addr.to_string()))
    }
}

struct MemoryConnector {
    network: MemoryNetwork,
}

#[async_trait]
impl PeerConnector for MemoryConnector {
    async fn connect(&self, _peer_id: NodeId, addr: &str) -> Result<Box<dyn PeerChannel>, TransportError> {
        self.network.endpoint(addr)?;
        Ok(Box::new(MemoryChannel {
            network: self.network.clone(),
            addr: addr.to_string(),
        }))
    }
}

struct MemoryChannel {
    network: MemoryNetwork,
    addr: String,
}

#[async_trait]
impl PeerChannel for MemoryChannel {
    async fn call(&mut self, request: OperationRequest) -> Result<OperationResponse, TransportError> {
        let handle = self.network.endpoint(&self.addr)?;
        *self
            .network
            .state
            .write()
            .calls
            .entry(self.addr.clone())
            .or_insert(0) += 1;

        handle
            .deliver(request)
            .await
            .map_err(|_| TransportError::Unreachable(self.addr.clone()))
    }
}
