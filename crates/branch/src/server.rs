//! TCP front end of a branch
//!
//! Customers and peer branches connect the same way. Each connection gets
//! its own task that reads request frames and forwards them to the replica
//! actor, so connections are concurrent while request handling stays serial.

use std::net::SocketAddr;
use std::sync::Arc;

use bank_wire::{read_frame, write_frame, Amount, NodeId, OperationRequest, WireError};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::peers::PeerTable;
use crate::replica::{ReplicaBuilder, ReplicaConfig, ReplicaHandle};
use crate::transport::TcpConnector;

/// Initial state of one branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSpec {
    pub id: NodeId,
    pub balance: Amount,
}

/// Bound listener for one branch
pub struct BranchServer {
    listener: TcpListener,
}

impl BranchServer {
    pub async fn bind(addr: &str) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, feeding requests into `handle`
    pub async fn serve(self, handle: ReplicaHandle) -> anyhow::Result<()> {
        tracing::info!(
            "Branch {} listening on {}",
            handle.id(),
            self.listener.local_addr()?
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    tracing::debug!("Branch {} accepted connection from {}", handle.id(), peer_addr);
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handle).await {
                            tracing::warn!("Connection from {} ended with error: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, handle: ReplicaHandle) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;

    loop {
        let request: OperationRequest = match read_frame(&mut stream).await {
            Ok(request) => request,
            Err(WireError::ConnectionClosed) => break,
            Err(e) => return Err(e.into()),
        };
        let response = handle.deliver(request).await?;
        write_frame(&mut stream, &response).await?;
    }

    Ok(())
}

/// A branch with its replica actor and accept loop running
pub struct RunningBranch {
    pub id: NodeId,
    pub addr: SocketAddr,
    pub handle: ReplicaHandle,
    server: JoinHandle<()>,
}

impl RunningBranch {
    /// Stop accepting connections and stop the replica
    pub async fn shutdown(self) {
        self.server.abort();
        self.handle.shutdown().await;
        tracing::info!("Branch {} shut down", self.id);
    }
}

/// Wire a bound server to a fresh replica that reaches its peers over TCP
///
/// `peers` is the full branch table; the branch's own entry is ignored when
/// propagating.
pub fn start_branch(
    spec: BranchSpec,
    server: BranchServer,
    peers: PeerTable,
    config: ReplicaConfig,
) -> anyhow::Result<RunningBranch> {
    let addr = server.local_addr()?;
    let handle = ReplicaBuilder::new(spec.id)
        .balance(spec.balance)
        .peers(peers)
        .connector(Arc::new(TcpConnector))
        .config(config)
        .spawn();

    let server_handle = handle.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = server.serve(server_handle).await {
            tracing::error!("Branch {} server error: {}", spec.id, e);
        }
    });

    Ok(RunningBranch {
        id: spec.id,
        addr,
        handle,
        server,
    })
}
