//! Scenario file model
//!
//! ```json
//! [
//!   {"id": 1, "type": "customer", "events": [{"interface": "deposit", "money": 10}]},
//!   {"id": 1, "type": "branch", "balance": 400}
//! ]
//! ```

use std::collections::HashSet;
use std::path::Path;

use bank_wire::{Amount, NodeId, OperationKind};
use serde::{Deserialize, Serialize};

use crate::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchEntry {
    pub id: NodeId,
    pub balance: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerEvent {
    pub interface: OperationKind,
    /// Queries usually omit it
    #[serde(default)]
    pub money: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: NodeId,
    #[serde(default)]
    pub events: Vec<CustomerEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScenarioEntry {
    Branch(BranchEntry),
    Customer(Customer),
}

/// Parsed scenario, file order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    entries: Vec<ScenarioEntry>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let data = std::fs::read_to_string(&path)?;
        tracing::info!("Loaded scenario from {:?}", path.as_ref());
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, DriverError> {
        let entries: Vec<ScenarioEntry> = serde_json::from_str(data)?;

        let mut seen = HashSet::new();
        for entry in &entries {
            if let ScenarioEntry::Branch(branch) = entry {
                if !seen.insert(branch.id) {
                    return Err(DriverError::DuplicateBranch(branch.id));
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn branches(&self) -> impl Iterator<Item = &BranchEntry> {
        self.entries.iter().filter_map(|entry| match entry {
            ScenarioEntry::Branch(branch) => Some(branch),
            ScenarioEntry::Customer(_) => None,
        })
    }

    pub fn customers(&self) -> impl Iterator<Item = &Customer> {
        self.entries.iter().filter_map(|entry| match entry {
            ScenarioEntry::Customer(customer) => Some(customer),
            ScenarioEntry::Branch(_) => None,
        })
    }
}
