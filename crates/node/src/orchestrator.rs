//! Scenario orchestration
//!
//! Starts every branch before any customer traffic, replays customers one
//! after another, then stops the branches.

use std::path::Path;

use anyhow::Result;
use bank_branch::{start_branch, BranchServer, BranchSpec, PeerTable, ReplicaConfig, RunningBranch};
use bank_customer::{run_customer, DriverError, ResultLog, Scenario};

/// Bind a listener per branch on `host` with an OS-assigned port and start
/// them all. The table is complete before any replica starts.
pub async fn start_branches(
    scenario: &Scenario,
    host: &str,
    config: &ReplicaConfig,
) -> Result<(PeerTable, Vec<RunningBranch>)> {
    let mut table = PeerTable::new();
    let mut bound = Vec::new();
    for entry in scenario.branches() {
        let server = BranchServer::bind(&format!("{}:0", host)).await?;
        table.insert(entry.id, server.local_addr()?.to_string());
        bound.push((
            BranchSpec {
                id: entry.id,
                balance: entry.balance,
            },
            server,
        ));
    }

    if table.is_empty() {
        tracing::warn!("Scenario defines no branches");
    }

    let mut running = Vec::with_capacity(bound.len());
    for (spec, server) in bound {
        running.push(start_branch(spec, server, table.clone(), config.clone())?);
    }

    tracing::info!("{} branches running", running.len());
    Ok((table, running))
}

/// Replay every customer against the branch sharing its id
pub async fn replay_customers(scenario: &Scenario, table: &PeerTable, log: &ResultLog) -> Result<usize> {
    let mut replayed = 0;
    for customer in scenario.customers() {
        let addr = table
            .get(customer.id)
            .ok_or(DriverError::UnknownBranch(customer.id))?;

        tracing::info!("Customer {} starting to execute events", customer.id);
        let record = run_customer(customer, addr, log).await?;
        tracing::info!("Customer {} finished {} events", record.id, record.recv.len());
        replayed += 1;
    }
    Ok(replayed)
}

pub async fn stop_branches(branches: Vec<RunningBranch>) {
    for branch in branches {
        match branch.handle.snapshot().await {
            Ok(snapshot) => tracing::info!(
                "Branch {} final balance {} ({} requests, {} propagations, {} peer faults)",
                snapshot.id,
                snapshot.balance,
                snapshot.stats.requests_handled,
                snapshot.stats.propagations,
                snapshot.stats.peer_faults
            ),
            Err(e) => tracing::warn!("No final snapshot for branch {}: {}", branch.id, e),
        }
        branch.shutdown().await;
    }
}

/// Full `run` subcommand
pub async fn run_scenario(input: &Path, output: &Path, host: &str, config: ReplicaConfig) -> Result<()> {
    let scenario = Scenario::load(input)?;
    let log = ResultLog::new(output);

    let (table, branches) = start_branches(&scenario, host, &config).await?;
    let replayed = replay_customers(&scenario, &table, &log).await;
    stop_branches(branches).await;

    let replayed = replayed?;
    tracing::info!("Replayed {} customers, results appended to {:?}", replayed, log.path());
    Ok(())
}
