//! Replays one customer's events against its branch

use bank_wire::{
    read_frame, write_frame, NodeId, OperationKind, OperationRequest, OperationResponse, ResultKind,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use crate::error::DriverError;
use crate::result_log::ResultLog;
use crate::scenario::Customer;

/// Outcome of a single event as written to the result log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub interface: OperationKind,
    pub result: ResultKind,
    pub money: i64,
}

/// Everything one customer received, in event order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: NodeId,
    pub recv: Vec<EventOutcome>,
}

/// Customer-side connection to a single branch
pub struct BranchClient {
    stream: TcpStream,
}

impl BranchClient {
    pub async fn connect(addr: &str) -> Result<Self, DriverError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, request: &OperationRequest) -> Result<OperationResponse, DriverError> {
        write_frame(&mut self.stream, request).await?;
        Ok(read_frame(&mut self.stream).await?)
    }
}

impl Customer {
    /// Send every event in order, waiting for each response before the next
    pub async fn execute_events(&self, client: &mut BranchClient) -> Result<CustomerRecord, DriverError> {
        let mut recv = Vec::with_capacity(self.events.len());

        for event in &self.events {
            tracing::info!(
                "Customer {} sending {} request, amount {}",
                self.id,
                event.interface,
                event.money
            );
            let request = OperationRequest::customer(event.interface, self.id, event.money);
            let response = client.send(&request).await?;

            let outcome = EventOutcome {
                interface: event.interface,
                result: response.result,
                money: response.amount,
            };
            tracing::info!("Customer {} received {:?}", self.id, outcome);
            recv.push(outcome);
        }

        Ok(CustomerRecord { id: self.id, recv })
    }
}

/// Connect to `branch_addr`, replay `customer` and append its record to `log`
pub async fn run_customer(
    customer: &Customer,
    branch_addr: &str,
    log: &ResultLog,
) -> Result<CustomerRecord, DriverError> {
    let mut client = BranchClient::connect(branch_addr).await?;
    let record = customer.execute_events(&mut client).await?;
    log.append(&record)?;
    Ok(record)
}
