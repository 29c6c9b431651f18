//! Live-trading entrypoint. Same shape as `trading-testnet`, gated on the
//! live confirmation token `RunModeGates::validate` already enforces at
//! config load, plus the same exchange-adapter gap (see that binary's doc
//! comment).

use anyhow::{bail, Result};
use clap::Parser;
use trading_bins::common::{bootstrap, init_logging, CommonArgs};
use trading_core::config::RunMode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Live run of the trading core")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level)?;
    tracing::warn!("LIVE TRADING MODE - real orders, real capital");

    let handles = bootstrap(&args.common)?;
    if handles.config.run_mode.mode != RunMode::Live {
        bail!("config run_mode is not 'live'; refusing to start trading-live against it");
    }

    tracing::info!("live bootstrap complete: ledger replayed, metrics and operator surface ready");
    bail!(
        "no exchange adapter crate is wired into this workspace (execution::Executor's live \
         implementor is out of scope per the system overview); wire one in before running live"
    )
}
