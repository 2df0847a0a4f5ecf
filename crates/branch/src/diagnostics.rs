//! Bounded record of received requests
//!
//! Purely diagnostic. Once `capacity` entries are held the oldest is evicted.

use std::collections::VecDeque;

use bank_wire::OperationRequest;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub request: OperationRequest,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DiagnosticLog {
    entries: VecDeque<ReceivedMessage>,
    capacity: usize,
    total_received: u64,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(crate::DEFAULT_DIAGNOSTIC_CAPACITY)),
            capacity,
            total_received: 0,
        }
    }

    pub fn record(&mut self, request: &OperationRequest) {
        self.total_received += 1;
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ReceivedMessage {
            request: request.clone(),
            received_at: Utc::now(),
        });
    }

    /// Retained entries, oldest first
    pub fn recent(&self) -> Vec<ReceivedMessage> {
        self.entries.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Everything ever recorded, including evicted entries
    pub fn total_received(&self) -> u64 {
        self.total_received
    }
}
