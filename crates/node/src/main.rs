//! Replicated bank
//!
//! `bank run` starts every branch of a scenario in-process, replays the
//! customers and appends their results to a log.
//! `bank branch` runs a single branch until interrupted, for one-process-per-
//! branch deployments.

use std::path::PathBuf;

use anyhow::Result;
use bank_branch::{start_branch, BranchServer, BranchSpec, PeerTable};
use bank_wire::NodeId;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod orchestrator;

use config::{parse_peer, ReplicaArgs};

/// Replicated bank branches
#[derive(Parser, Debug)]
#[command(name = "bank")]
#[command(about = "Bank branches that mirror every customer write to each other", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a whole scenario file
    ///
    /// Every branch runs inside this one process as its own actor with its
    /// own TCP listener; use `bank branch` for one process per branch.
    Run {
        /// Scenario file
        #[arg(short, long, default_value = "input.json")]
        input: PathBuf,

        /// Result log, appended to
        #[arg(short, long, default_value = "output.json")]
        output: PathBuf,

        /// Host branches bind on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[command(flatten)]
        replica: ReplicaArgs,
    },

    /// Run one branch until Ctrl+C
    Branch {
        /// Branch id
        #[arg(long)]
        id: NodeId,

        /// Initial balance
        #[arg(long, default_value = "0")]
        balance: i64,

        /// Listen address
        #[arg(long, default_value = "127.0.0.1:50051")]
        bind: String,

        /// Peer branch as <id>=<host:port>, repeatable
        #[arg(long = "peer", value_parser = parse_peer)]
        peers: Vec<(NodeId, String)>,

        #[command(flatten)]
        replica: ReplicaArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command {
        Command::Run {
            input,
            output,
            host,
            replica,
        } => {
            tracing::info!("Running scenario {:?}", input);
            tracing::info!("  Result log: {:?}", output);
            tracing::info!("  Settle delay: {}ms", replica.settle_delay_ms);
            orchestrator::run_scenario(&input, &output, &host, replica.replica_config()).await
        }
        Command::Branch {
            id,
            balance,
            bind,
            peers,
            replica,
        } => run_branch(id, balance, bind, peers, replica).await,
    }
}

/// Run a single branch process
async fn run_branch(
    id: NodeId,
    balance: i64,
    bind: String,
    peers: Vec<(NodeId, String)>,
    replica: ReplicaArgs,
) -> Result<()> {
    let server = BranchServer::bind(&bind).await?;

    let mut table = PeerTable::new();
    table.insert(id, server.local_addr()?.to_string());
    for (peer_id, addr) in peers {
        if peer_id == id {
            tracing::warn!("Ignoring --peer entry for the branch's own id {}", id);
            continue;
        }
        table.insert(peer_id, addr);
    }

    tracing::info!("Starting branch {} with balance {}", id, balance);
    tracing::info!("  Listening on: {}", server.local_addr()?);
    tracing::info!("  Peers: {}", table.len() - 1);

    let branch = start_branch(BranchSpec { id, balance }, server, table, replica.replica_config())?;

    tracing::info!("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down branch {}...", id);
    branch.shutdown().await;

    Ok(())
}
