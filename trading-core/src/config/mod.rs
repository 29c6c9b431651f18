//! Runtime configuration (spec.md §6 run-mode gates, §4.3 risk thresholds,
//! §5 loop cadences), deserialized from TOML.
//!
//! The teacher pins risk limits as compile-time Cargo features
//! (`engine::risk` consts) because its HFT engine never needs to retune
//! without a rebuild; a 15-minute-cadence swing system does, so this is a
//! deliberate Open Question resolution (recorded in DESIGN.md): thresholds
//! move to a runtime-loaded `TradingConfig` instead.

use crate::execution::ExecutionConfig;
use crate::paper::PaperConfig;
use crate::risk::SymbolFilters;
use crate::state::CircuitBreakerThresholds;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Paper,
    Testnet,
    Live,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopCadences {
    pub universe_interval_sec: u64,
    pub universe_retry_interval_sec: u64,
    pub news_interval_sec: u64,
    pub strategy_interval_sec: u64,
    pub reconciliation_interval_sec: u64,
    pub watchdog_interval_sec: u64,
    pub telemetry_interval_sec: u64,
    pub time_sync_interval_sec: u64,
}

impl Default for LoopCadences {
    fn default() -> Self {
        Self {
            universe_interval_sec: 86_400,
            universe_retry_interval_sec: 300,
            news_interval_sec: 900,
            strategy_interval_sec: 900,
            reconciliation_interval_sec: 1_800,
            watchdog_interval_sec: 300,
            telemetry_interval_sec: 300,
            time_sync_interval_sec: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunModeGates {
    pub mode: RunMode,
    pub enable_trading: bool,
    pub live_confirmation_token: Option<String>,
}

impl RunModeGates {
    /// Validates the gates required before trading is allowed to place
    /// orders (spec.md §6: "Mode gates are enforced at config validation
    /// and re-checked before every placement").
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.mode {
            RunMode::Paper => Ok(()),
            RunMode::Testnet => {
                if !self.enable_trading {
                    return Err(ConfigError::Invalid("testnet mode requires enable_trading".into()));
                }
                Ok(())
            }
            RunMode::Live => {
                if !self.enable_trading {
                    return Err(ConfigError::Invalid("live mode requires enable_trading".into()));
                }
                if self.live_confirmation_token.as_deref().unwrap_or_default().is_empty() {
                    return Err(ConfigError::Invalid("live mode requires a confirmation token".into()));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub starting_equity: rust_decimal::Decimal,
    pub run_mode: RunModeGates,
    pub cadences: LoopCadences,
    pub circuit_breaker: CircuitBreakerThresholds,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    pub default_symbol_filters: SymbolFilters,
    pub per_symbol_filters: HashMap<String, SymbolFilters>,
    pub ledger_path: String,
    pub pending_store_path: String,
    pub lock_file_path: String,
    pub trade_log_path: String,
    pub order_log_path: String,
    pub thinking_log_path: String,
    pub metrics_listen_addr: String,
    pub operator_listen_addr: String,
}

impl TradingConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let config: TradingConfig = toml::from_str(&contents)?;
        config.run_mode.validate()?;
        Ok(config)
    }

    pub fn filters_for(&self, symbol: &str) -> &SymbolFilters {
        self.per_symbol_filters.get(symbol).unwrap_or(&self.default_symbol_filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_mode_without_token_fails_validation() {
        let gates = RunModeGates { mode: RunMode::Live, enable_trading: true, live_confirmation_token: None };
        assert!(gates.validate().is_err());
    }

    #[test]
    fn paper_mode_always_validates() {
        let gates = RunModeGates { mode: RunMode::Paper, enable_trading: false, live_confirmation_token: None };
        assert!(gates.validate().is_ok());
    }

    #[test]
    fn testnet_requires_enable_trading() {
        let gates = RunModeGates { mode: RunMode::Testnet, enable_trading: false, live_confirmation_token: None };
        assert!(gates.validate().is_err());
    }
}
