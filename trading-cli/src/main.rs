//! `trading-ctl`: the operator CLI (spec.md §6) — ledger tail, state
//! snapshot, manual-review acknowledgment, kill-switch trigger, pause/
//! resume, all read/append through the same ledger a running process
//! writes to.
//!
//! Subcommand shape grounded on `cooprefr-bettersys`'s `dataset_inspect`
//! CLI (`clap::Subcommand` enum, one variant per read/action operation);
//! this replaces the teacher's TUI debug binaries (`bog-debug`) since
//! spec.md §6 calls for a scriptable operator surface rather than an
//! interactive terminal dashboard.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use trading_core::config::TradingConfig;
use trading_core::event::{EventBus, EventKind, EventLedger, Metadata};
use trading_core::state::StateManager;

#[derive(Parser, Debug)]
#[command(name = "trading-ctl", author, version, about = "Operator CLI for the trading core")]
struct Cli {
    /// Path to the TOML config file this process's ledger/paths live under.
    #[arg(short = 'f', long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current `TradingState` snapshot as JSON.
    State,

    /// Print the last N ledger events as JSON, oldest first.
    Tail {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List open positions.
    Positions,

    /// List open orders.
    Orders,

    /// Acknowledge manual review, clearing `requires_manual_review`.
    AckReview {
        /// Name or id of the operator acknowledging.
        #[arg(long)]
        operator: String,
    },

    /// Trigger the kill switch: appends `ShutdownInitiated`.
    KillSwitch {
        #[arg(long, default_value = "operator requested shutdown via trading-ctl")]
        reason: String,
    },

    /// Pause trading: reuses `ManualInterventionDetected`, the same flag
    /// the circuit breaker trips (see DESIGN.md's Open Question decision).
    Pause {
        #[arg(long, default_value = "operator requested pause via trading-ctl")]
        reason: String,
    },

    /// Resume trading: appends `ManualReviewAcknowledged`.
    Resume {
        #[arg(long)]
        operator: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let cli = Cli::parse();
    let config = TradingConfig::load(&cli.config).context("loading config")?;

    let ledger = Arc::new(EventLedger::open(config.ledger_path.clone()).context("opening event ledger")?);
    let history = ledger.read_all().context("reading ledger history")?;

    match cli.command {
        Command::State => {
            let state_manager = StateManager::new(config.starting_equity);
            state_manager.rebuild(&history);
            println!("{}", serde_json::to_string_pretty(&state_manager.snapshot())?);
        }
        Command::Tail { limit } => {
            let start = history.len().saturating_sub(limit);
            println!("{}", serde_json::to_string_pretty(&history[start..])?);
        }
        Command::Positions => {
            let state_manager = StateManager::new(config.starting_equity);
            state_manager.rebuild(&history);
            println!("{}", serde_json::to_string_pretty(&state_manager.snapshot().positions)?);
        }
        Command::Orders => {
            let state_manager = StateManager::new(config.starting_equity);
            state_manager.rebuild(&history);
            println!("{}", serde_json::to_string_pretty(&state_manager.snapshot().open_orders)?);
        }
        Command::AckReview { operator } => {
            let event_bus = EventBus::new(ledger);
            event_bus
                .publish(EventKind::ManualReviewAcknowledged { operator: operator.clone() }, Metadata::source("trading-ctl"))
                .context("publishing ManualReviewAcknowledged")?;
            println!("acknowledged manual review as {operator}");
        }
        Command::KillSwitch { reason } => {
            let event_bus = EventBus::new(ledger);
            event_bus
                .publish(EventKind::ShutdownInitiated { reason: reason.clone() }, Metadata::source("trading-ctl"))
                .context("publishing ShutdownInitiated")?;
            println!("kill switch triggered: {reason}");
        }
        Command::Pause { reason } => {
            let event_bus = EventBus::new(ledger);
            event_bus
                .publish(EventKind::ManualInterventionDetected { reason: reason.clone() }, Metadata::source("trading-ctl"))
                .context("publishing ManualInterventionDetected")?;
            println!("trading paused: {reason}");
        }
        Command::Resume { operator } => {
            let event_bus = EventBus::new(ledger);
            event_bus
                .publish(EventKind::ManualReviewAcknowledged { operator: operator.clone() }, Metadata::source("trading-ctl"))
                .context("publishing ManualReviewAcknowledged")?;
            println!("trading resumed by {operator}");
        }
    }

    Ok(())
}
