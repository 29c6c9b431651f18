//! Testnet entrypoint: identical ambient wiring to `trading-paper`
//! (config, ledger replay, metrics, operator surface, kill switch), but
//! gated on `run_mode.enable_trading` since testnet places real orders
//! against an exchange's sandbox environment.
//!
//! No exchange adapter crate is part of this workspace (`execution::types`
//! names a live adapter as a separate, out-of-scope implementor of
//! `Executor`) — this binary brings up every piece around that seam and
//! then reports the gap explicitly rather than silently running in paper
//! mode under a different name.

use anyhow::{bail, Result};
use clap::Parser;
use trading_bins::common::{bootstrap, init_logging, CommonArgs};
use trading_core::config::RunMode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Testnet run of the trading core")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level)?;

    let handles = bootstrap(&args.common)?;
    if handles.config.run_mode.mode != RunMode::Testnet {
        bail!("config run_mode is not 'testnet'; refusing to start trading-testnet against it");
    }

    tracing::info!("testnet bootstrap complete: ledger replayed, metrics and operator surface ready");
    bail!(
        "no exchange adapter crate is wired into this workspace (execution::Executor's live \
         implementor is out of scope per the system overview); wire one in before running testnet"
    )
}
