//! Customer driver
//!
//! Loads a scenario file, replays each customer's events in order against
//! the branch that shares its id, and appends one JSON line per customer to
//! a result log.

pub mod driver;
pub mod error;
pub mod result_log;
pub mod scenario;

pub use driver::{run_customer, BranchClient, CustomerRecord, EventOutcome};
pub use error::DriverError;
pub use result_log::ResultLog;
pub use scenario::{BranchEntry, Customer, CustomerEvent, Scenario, ScenarioEntry};
