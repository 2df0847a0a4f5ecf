//! Core message types shared by customers and branches

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Identifier of a branch or a customer
pub type NodeId = u64;

/// Money amount. Signed so that invalid (negative) deposits can be expressed
/// on the wire and rejected by the branch.
pub type Amount = i64;

/// Who sent a request
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An external customer; writes from here are propagated
    Customer,
    /// Another branch replica; writes from here are applied locally only
    Branch,
}

/// Requested operation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Query,
}

/// Outcome reported by a branch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Operation applied
    Success,
    /// Business-rule rejection (insufficient funds); nothing changed
    Failure,
    /// Invalid input or incomplete propagation
    Error,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Customer => "customer",
            SourceKind::Branch => "branch",
        }
    }
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdraw => "withdraw",
            OperationKind::Query => "query",
        }
    }
}

impl ResultKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResultKind::Success => "success",
            ResultKind::Failure => "failure",
            ResultKind::Error => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultKind::Success)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(OperationKind::Deposit),
            "withdraw" => Ok(OperationKind::Withdraw),
            "query" => Ok(OperationKind::Query),
            other => Err(WireError::UnknownOperation(other.to_string())),
        }
    }
}

/// A request delivered to a branch
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct OperationRequest {
    /// What to do
    pub operation: OperationKind,
    /// Customer id or originating branch id
    pub requester_id: NodeId,
    /// Amount to deposit/withdraw (ignored for queries)
    pub amount: Amount,
    /// Customer or Branch
    pub source: SourceKind,
}

impl OperationRequest {
    /// Request issued by a customer
    pub fn customer(operation: OperationKind, customer_id: NodeId, amount: Amount) -> Self {
        Self {
            operation,
            requester_id: customer_id,
            amount,
            source: SourceKind::Customer,
        }
    }

    /// Request forwarded by a branch while propagating a customer write
    pub fn propagate(operation: OperationKind, branch_id: NodeId, amount: Amount) -> Self {
        Self {
            operation,
            requester_id: branch_id,
            amount,
            source: SourceKind::Branch,
        }
    }
}

/// A branch's answer. Always stamped `source = Branch`.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct OperationResponse {
    pub result: ResultKind,
    /// Id of the branch that answered
    pub responder_id: NodeId,
    /// Balance after the operation (unchanged if it was rejected)
    pub amount: Amount,
    pub source: SourceKind,
}

impl OperationResponse {
    pub fn from_branch(result: ResultKind, branch_id: NodeId, balance: Amount) -> Self {
        Self {
            result,
            responder_id: branch_id,
            amount: balance,
            source: SourceKind::Branch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_parse_back() {
        for op in [OperationKind::Deposit, OperationKind::Withdraw, OperationKind::Query] {
            assert_eq!(op.name().parse::<OperationKind>().unwrap(), op);
        }
        assert!(matches!(
            "transfer".parse::<OperationKind>(),
            Err(WireError::UnknownOperation(name)) if name == "transfer"
        ));
    }

    #[test]
    fn test_propagate_request_is_branch_sourced() {
        let req = OperationRequest::propagate(OperationKind::Deposit, 3, 50);
        assert_eq!(req.source, SourceKind::Branch);
        assert_eq!(req.requester_id, 3);

        let req = OperationRequest::customer(OperationKind::Withdraw, 7, 10);
        assert_eq!(req.source, SourceKind::Customer);
    }

    #[test]
    fn test_response_always_from_branch() {
        let resp = OperationResponse::from_branch(ResultKind::Failure, 2, 100);
        assert_eq!(resp.source, SourceKind::Branch);
        assert_eq!(resp.amount, 100);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ResultKind::Success.to_string(), "success");
        assert_eq!(SourceKind::Branch.to_string(), "branch");
        assert!(!ResultKind::Error.is_success());
    }
}
