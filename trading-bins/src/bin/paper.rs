//! Paper-trading entrypoint: the full loop set running against
//! `PaperExecutor` and CSV-replayed indicator data. No real orders are ever
//! placed.

use anyhow::Result;
use clap::Parser;
use rust_decimal_macros::dec;
use std::sync::Arc;
use trading_bins::common::{bootstrap, init_logging, CommonArgs};
use trading_bins::market_data::{CsvMarketDataSource, DirectoryUniverseSource};
use trading_bins::tasks::{ReconciliationTask, StrategyCycleTask, TelemetryTask, UniverseTask, WatchdogTask};
use trading_core::execution::ExecutionEngine;
use trading_core::operator;
use trading_core::orchestrator::{LoopSlot, Orchestrator};
use trading_core::paper::PaperExecutor;
use trading_core::pending::PendingEntryStore;
use trading_core::reconcile::Reconciler;
use trading_strategy::{ProposalSizing, RegimeClassifier, RegimeThresholds, ScoringConfig, ScoringEngine};

#[derive(Parser, Debug)]
#[command(author, version, about = "Paper-trading run of the trading core")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory of per-symbol indicator CSV files, read in place of a
    /// live exchange/indicator feed. Also doubles as the tradeable universe:
    /// every `<symbol>.csv` in this directory is a symbol the universe loop
    /// publishes.
    #[arg(long, default_value = "indicators")]
    indicator_dir: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level)?;
    tracing::warn!("PAPER TRADING MODE - no real orders will be placed");

    let handles = bootstrap(&args.common)?;
    let mut orchestrator = Orchestrator::new(handles.config.cadences.clone(), handles.kill_switch.clone());

    let universe_source = Arc::new(DirectoryUniverseSource::new(args.indicator_dir.clone()));
    orchestrator
        .spawn(LoopSlot::Universe, Box::new(UniverseTask::new(handles.event_bus.clone(), universe_source)));

    let paper_executor = Arc::new(PaperExecutor::new(handles.config.paper.clone()));
    let pending = Arc::new(PendingEntryStore::open(handles.config.pending_store_path.clone())?);
    let execution = Arc::new(ExecutionEngine::new(
        handles.event_bus.clone(),
        paper_executor.clone(),
        pending,
        handles.config.execution.clone(),
    ));

    let source = Arc::new(CsvMarketDataSource::new(args.indicator_dir));
    let scoring = ScoringEngine::new(ScoringConfig::default());
    let regime = RegimeClassifier::new(RegimeThresholds::default());
    orchestrator.spawn(
        LoopSlot::Strategy,
        Box::new(StrategyCycleTask::new(
            handles.state_manager.clone(),
            handles.event_bus.clone(),
            source,
            paper_executor,
            scoring,
            regime,
            handles.config.default_symbol_filters.clone(),
            ProposalSizing::default(),
            execution,
        )),
    );

    let reconciler = Reconciler::new(dec!(0.001), dec!(0.01));
    orchestrator.spawn(
        LoopSlot::Reconciliation,
        Box::new(ReconciliationTask::new(handles.state_manager.clone(), handles.event_bus.clone(), reconciler)),
    );
    orchestrator.spawn(
        LoopSlot::Watchdog,
        Box::new(WatchdogTask::new(handles.state_manager.clone(), handles.event_bus.clone())),
    );
    orchestrator.spawn(
        LoopSlot::Telemetry,
        Box::new(TelemetryTask::new(handles.state_manager.clone(), handles.metrics.clone())),
    );

    let metrics_server = trading_core::metrics::MetricsServer::new(
        trading_core::metrics::MetricsServerConfig {
            listen_addr: handles.config.metrics_listen_addr.parse()?,
            metrics_path: "/metrics".to_string(),
        },
        handles.metrics.clone(),
    );
    tokio::spawn(metrics_server.serve());

    let operator_state =
        operator::OperatorState::new(handles.state_manager.clone(), handles.event_bus.clone(), handles.kill_switch.clone());
    let operator_listener = tokio::net::TcpListener::bind(handles.config.operator_listen_addr.as_str()).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(operator_listener, operator::router(operator_state)).await {
            tracing::error!(error = %e, "operator server exited");
        }
    });

    tracing::info!("paper trading system started");
    orchestrator.join_all().await;
    tracing::info!("shut down cleanly");
    Ok(())
}
