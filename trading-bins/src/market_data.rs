//! A `MarketDataSource` backed by one CSV file of indicator rows per
//! symbol, used by the paper-trading binary in place of a live exchange
//! feed. Row format mirrors `trading_core::logs`'s CSV row structs (named
//! fields, `serde`-derived, one record per line) rather than inventing a
//! new convention for this crate's only CSV reader that isn't a log.

use crate::tasks::{MarketDataSource, MarketFeed, SymbolSnapshot, UniverseSource};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use trading_core::domain::{NewsRisk, Symbol};
use trading_core::paper::{MarketSnapshot, PaperExecutor, Regime};

#[derive(Debug, Clone, Deserialize)]
struct IndicatorRow {
    adx: Decimal,
    choppiness: Decimal,
    trend_alignment: Decimal,
    entry_distance_atr: Decimal,
    funding_rate: Decimal,
    news_risk: String,
    spread_pct: Decimal,
    entry_price: Decimal,
    atr: Decimal,
}

impl IndicatorRow {
    fn into_snapshot(self) -> Result<SymbolSnapshot> {
        let news_risk = match self.news_risk.to_ascii_uppercase().as_str() {
            "LOW" => NewsRisk::Low,
            "MEDIUM" => NewsRisk::Medium,
            "HIGH" => NewsRisk::High,
            other => bail!("unknown news_risk value {other:?}"),
        };
        Ok(SymbolSnapshot {
            adx: self.adx,
            choppiness: self.choppiness,
            trend_alignment: self.trend_alignment,
            entry_distance_atr: self.entry_distance_atr,
            funding_rate: self.funding_rate,
            news_risk,
            spread_pct: self.spread_pct,
            entry_price: self.entry_price,
            atr: self.atr,
        })
    }
}

/// Reads `<dir>/<symbol>.csv` once per symbol, advancing one row per call
/// to `snapshot` — each row is one strategy cycle's worth of indicator
/// values, in the order a backtest run replays them.
pub struct CsvMarketDataSource {
    dir: PathBuf,
    cursors: Mutex<HashMap<Symbol, usize>>,
}

impl CsvMarketDataSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), cursors: Mutex::new(HashMap::new()) }
    }

    fn read_rows(&self, symbol: &Symbol) -> Result<Vec<IndicatorRow>> {
        let path: PathBuf = Path::new(&self.dir).join(format!("{}.csv", symbol.as_str()));
        let mut reader =
            csv::Reader::from_path(&path).with_context(|| format!("opening indicator file {}", path.display()))?;
        reader.deserialize().collect::<std::result::Result<Vec<IndicatorRow>, _>>().context("parsing indicator rows")
    }
}

#[async_trait]
impl MarketDataSource for CsvMarketDataSource {
    async fn snapshot(&self, symbol: &Symbol) -> Result<SymbolSnapshot> {
        let rows = self.read_rows(symbol)?;
        if rows.is_empty() {
            bail!("no indicator rows for {symbol}");
        }

        let index = {
            let mut cursors = self.cursors.lock();
            let cursor = cursors.entry(symbol.clone()).or_insert(0);
            let index = *cursor % rows.len();
            *cursor += 1;
            index
        };

        rows[index].clone().into_snapshot()
    }
}

/// Derives the tradeable universe from `<dir>`'s `*.csv` filenames, the same
/// directory `CsvMarketDataSource` reads indicator rows from — a paper run
/// trades exactly the symbols it has a fixture for.
pub struct DirectoryUniverseSource {
    dir: PathBuf,
}

impl DirectoryUniverseSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl UniverseSource for DirectoryUniverseSource {
    async fn symbols(&self) -> Result<Vec<Symbol>> {
        let mut symbols: Vec<Symbol> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("listing indicator directory {}", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("csv"))
            .filter_map(|entry| entry.path().file_stem().map(|stem| Symbol::new(stem.to_string_lossy().into_owned())))
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Feeds `PaperExecutor`'s bar-close simulation from the same indicator row
/// a cycle already scored on: half-spread from `spread_pct`, a coarse
/// volatility regime from `atr` as a fraction of price (spec.md §4.8's
/// LOW/NORMAL/HIGH multiplier bands). No separate market data source exists
/// in this workspace, so the indicator feed is the closest thing to a tape.
#[async_trait]
impl MarketFeed for PaperExecutor {
    async fn feed(&self, symbol: &Symbol, snapshot: &SymbolSnapshot) {
        let half_spread = snapshot.entry_price * snapshot.spread_pct / Decimal::TWO;
        let atr_pct = if snapshot.entry_price.is_zero() {
            Decimal::ZERO
        } else {
            snapshot.atr / snapshot.entry_price * Decimal::ONE_HUNDRED
        };
        let regime = if atr_pct < dec!(1) {
            Regime::Low
        } else if atr_pct < dec!(3) {
            Regime::Normal
        } else {
            Regime::High
        };
        self.update_market(
            symbol.clone(),
            MarketSnapshot {
                bid: snapshot.entry_price - half_spread,
                ask: snapshot.entry_price + half_spread,
                close: snapshot.entry_price,
                atr_pct,
                regime,
            },
        );
        self.on_bar_close(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_csv(dir: &Path, symbol: &str, rows: &[&str]) {
        let mut content = String::from("adx,choppiness,trend_alignment,entry_distance_atr,funding_rate,news_risk,spread_pct,entry_price,atr\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
    }

    #[tokio::test]
    async fn cycles_through_rows_per_symbol() {
        let dir = tempdir().unwrap();
        write_csv(
            dir.path(),
            "BTCUSDT",
            &["30,20,0.8,0.7,0.0001,LOW,0.05,60000,500", "31,21,0.7,0.6,0.0002,MEDIUM,0.06,60100,510"],
        );
        let source = CsvMarketDataSource::new(dir.path());
        let symbol = Symbol::new("BTCUSDT");

        let first = source.snapshot(&symbol).await.unwrap();
        assert_eq!(first.adx, Decimal::new(30, 0));
        assert!(matches!(first.news_risk, NewsRisk::Low));

        let second = source.snapshot(&symbol).await.unwrap();
        assert_eq!(second.adx, Decimal::new(31, 0));

        let wrapped = source.snapshot(&symbol).await.unwrap();
        assert_eq!(wrapped.adx, first.adx);
    }

    #[tokio::test]
    async fn missing_file_errors_instead_of_panicking() {
        let dir = tempdir().unwrap();
        let source = CsvMarketDataSource::new(dir.path());
        let result = source.snapshot(&Symbol::new("ETHUSDT")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_news_risk_value_is_rejected() {
        let dir = tempdir().unwrap();
        write_csv(dir.path(), "SOLUSDT", &["25,30,0.1,0.3,0.0,EXTREME,0.02,100,2"]);
        let source = CsvMarketDataSource::new(dir.path());
        let result = source.snapshot(&Symbol::new("SOLUSDT")).await;
        assert!(result.is_err());
    }
}
