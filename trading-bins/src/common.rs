//! Shared CLI surface and bootstrap sequence for every run-mode binary.
//!
//! Grounded on the teacher's `bog_bins::common` (`CommonArgs`, `init_logging`)
//! — the same "one `#[command(flatten)]`-able args struct, one logging
//! init function" shape, with the teacher's CPU-pinning/real-time-priority
//! fields dropped (this system has no microsecond-latency budget to protect)
//! and a config-path argument added since this crate's thresholds are
//! runtime-loaded rather than compiled in.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use trading_core::config::TradingConfig;
use trading_core::event::{EventBus, EventLedger};
use trading_core::metrics::MetricsRegistry;
use trading_core::resilience::KillSwitch;
use trading_core::state::StateManager;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to the TOML config file (spec.md §6 run-mode gates).
    #[arg(short = 'f', long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Log level, overridden by `RUST_LOG` if set.
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

/// Everything a run-mode binary's main loop needs, assembled once at
/// startup and then handed to the orchestrator's concrete tasks.
pub struct RuntimeHandles {
    pub config: TradingConfig,
    pub state_manager: Arc<StateManager>,
    pub event_bus: Arc<EventBus>,
    pub metrics: Arc<MetricsRegistry>,
    pub kill_switch: KillSwitch,
    pub _instance_lock: trading_core::resilience::InstanceLock,
}

pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();
    Ok(())
}

/// Loads config, acquires the single-instance lock, opens the ledger and
/// replays it into a fresh `TradingState`, and installs the process-wide
/// kill switch. Shared by every run-mode binary so the bootstrap sequence
/// (and its failure modes) is identical regardless of which exchange
/// surface the binary ultimately talks to.
pub fn bootstrap(args: &CommonArgs) -> Result<RuntimeHandles> {
    let config = TradingConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    let instance_lock = trading_core::resilience::InstanceLock::acquire(&config.lock_file_path)
        .context("acquiring single-instance lock")?;

    let ledger = Arc::new(EventLedger::open(config.ledger_path.clone()).context("opening event ledger")?);
    let event_bus = Arc::new(EventBus::new(ledger.clone()));
    let state_manager = StateManager::new(config.starting_equity);
    let history = ledger.read_all().context("replaying event ledger")?;
    state_manager.rebuild(&history);
    tracing::info!(events = history.len(), "replayed ledger into state");

    {
        let state_manager = state_manager.clone();
        event_bus.subscribe(Box::new(move |event| state_manager.apply(event)));
    }

    let metrics = Arc::new(MetricsRegistry::new().context("registering metrics")?);
    let kill_switch = KillSwitch::install();

    Ok(RuntimeHandles { config, state_manager, event_bus, metrics, kill_switch, _instance_lock: instance_lock })
}
