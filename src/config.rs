//! Engine configuration: the recognized options consumed by the grid
//! trading engine, loadable from a layered file + environment source
//! or built in-process for tests and embedders.

use config::{Config, ConfigError as ExternalConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// How the engine sources prices and executes orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingMode {
    /// Replays historical OHLCV bars with deterministic fill simulation.
    Backtest,
    /// Trades against the live exchange with real funds.
    Live,
    /// Trades against the live exchange's price feed with simulated fills.
    PaperTrading,
}

/// Whether a level, once filled, reverts to a single ready side or to
/// a quiescent either-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyType {
    SimpleGrid,
    HedgedGrid,
}

/// Price ladder spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpacingType {
    Arithmetic,
    Geometric,
}

/// Take-profit / stop-loss trigger configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct RiskThreshold {
    #[serde(default)]
    pub enabled: bool,
    /// Threshold price (take-profit: sell above; stop-loss: sell below).
    #[serde(default)]
    pub threshold: f64,
}

/// Recognized configuration options (§6 "Configuration (consumed)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub trading_mode: TradingMode,
    pub strategy_type: StrategyType,
    pub spacing_type: SpacingType,

    pub bottom_range: f64,
    pub top_range: f64,
    pub num_grids: u32,

    pub base_currency: String,
    pub quote_currency: String,

    pub initial_balance: f64,
    #[serde(default)]
    pub initial_crypto_balance: f64,
    #[serde(default)]
    pub trading_fee: f64,

    /// Backtest-only: candle width, e.g. "1h".
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,

    /// Overrides the central-price default when set.
    #[serde(default)]
    pub trigger_price: Option<f64>,

    #[serde(default)]
    pub take_profit: RiskThreshold,
    #[serde(default)]
    pub stop_loss: RiskThreshold,

    /// Perpetual variant only.
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(default)]
    pub maintenance_margin_ratio: Option<f64>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_max_slippage")]
    pub max_slippage: f64,

    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,
    #[serde(default = "default_ticker_refresh_interval_secs")]
    pub ticker_refresh_interval_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    1
}

fn default_max_slippage() -> f64 {
    0.01
}

fn default_polling_interval_secs() -> u64 {
    5
}

fn default_ticker_refresh_interval_secs() -> u64 {
    3
}

impl EngineConfig {
    /// Load configuration from `config_path`, layering environment
    /// variables prefixed `GRID__` (double underscore separated) on
    /// top, e.g. `GRID__TRADING_FEE=0.001`.
    pub fn load(config_path: &str) -> Result<Self, ExternalConfigError> {
        let built = Config::builder()
            .add_source(File::with_name(config_path))
            .add_source(Environment::with_prefix("GRID").separator("__"))
            .build()?;
        built.try_deserialize()
    }

    /// Validate the fields this crate relies on beyond what serde's
    /// shape-checking already guarantees.
    pub fn validate(&self) -> GridResult<()> {
        if self.bottom_range <= 0.0 {
            return Err(GridError::ConfigError(
                "bottom_range must be positive".into(),
            ));
        }
        if self.top_range <= self.bottom_range {
            return Err(GridError::ConfigError(
                "top_range must be greater than bottom_range".into(),
            ));
        }
        if self.num_grids < 2 {
            return Err(GridError::ConfigError("num_grids must be at least 2".into()));
        }
        if self.initial_balance < 0.0 {
            return Err(GridError::ConfigError(
                "initial_balance must not be negative".into(),
            ));
        }
        if matches!(self.strategy_type, StrategyType::HedgedGrid)
            && self.leverage.is_some()
            && self.leverage.unwrap() <= 0.0
        {
            return Err(GridError::ConfigError("leverage must be positive".into()));
        }
        Ok(())
    }
}
