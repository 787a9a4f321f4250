//! Leveraged-futures variant: margin-scaled sizing and funding/risk
//! tracking (§4.2.4 perpetual variant; supplemented risk tiers).
//!
//! The spot core remains the primary target (§1); this module adds a
//! sizing policy and position/risk bookkeeping layered on top of it
//! without touching the grid or order manager.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::grid::Grid;
use crate::order_manager::SizingPolicy;

/// Contract quantities held per level, split long/short, plus the
/// scalar margin ratio and funding history (§3 "Positions").
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    pub long_positions: HashMap<u32, f64>,
    pub short_positions: HashMap<u32, f64>,
    pub margin_ratio: f64,
    pub funding_rate_history: Vec<FundingRateSample>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FundingRateSample {
    pub timestamp: i64,
    pub rate: f64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_funding_rate(&mut self, timestamp: i64, rate: f64) {
        self.funding_rate_history.push(FundingRateSample { timestamp, rate });
    }

    pub fn open_long(&mut self, level_index: u32, qty: f64) {
        *self.long_positions.entry(level_index).or_insert(0.0) += qty;
    }

    pub fn open_short(&mut self, level_index: u32, qty: f64) {
        *self.short_positions.entry(level_index).or_insert(0.0) += qty;
    }

    pub fn total_long(&self) -> f64 {
        self.long_positions.values().sum()
    }

    pub fn total_short(&self) -> f64 {
        self.short_positions.values().sum()
    }

    pub fn update_margin_ratio(&mut self, equity: f64, maintenance_margin: f64) {
        self.margin_ratio = if maintenance_margin > 0.0 {
            equity / maintenance_margin
        } else {
            f64::INFINITY
        };
    }
}

/// Risk tiers derived from `margin_ratio`, feeding an emergency
/// TP/SL path distinct from the configured take-profit/stop-loss
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Safe,
    Warning,
    HighRisk,
    Critical,
}

impl RiskStatus {
    /// Thresholds are ratios of equity to maintenance margin: below
    /// 1.5 is a warning, below 1.2 high risk, below 1.05 critical — a
    /// liquidation engine would normally force-close at 1.0.
    pub fn from_margin_ratio(margin_ratio: f64) -> Self {
        if margin_ratio < 1.05 {
            RiskStatus::Critical
        } else if margin_ratio < 1.2 {
            RiskStatus::HighRisk
        } else if margin_ratio < 1.5 {
            RiskStatus::Warning
        } else {
            RiskStatus::Safe
        }
    }

    pub fn requires_emergency_exit(&self) -> bool {
        matches!(self, RiskStatus::Critical)
    }
}

/// Perpetual sizing per §4.2.4: per-level margin = total_margin /
/// num_levels; max size = margin_per_grid * leverage / price * (1 -
/// maintenance_margin_ratio); spacing is scaled upstream at grid
/// construction time, not here.
pub struct PerpSizingPolicy {
    pub leverage: f64,
    pub maintenance_margin_ratio: f64,
}

impl PerpSizingPolicy {
    pub fn new(leverage: f64, maintenance_margin_ratio: f64) -> GridResult<Self> {
        if leverage <= 0.0 {
            return Err(GridError::ConfigError("leverage must be positive".into()));
        }
        Ok(Self {
            leverage,
            maintenance_margin_ratio,
        })
    }

    /// §4.2.4: widens grid spacing as leverage rises.
    pub fn spacing_multiplier(&self) -> f64 {
        1.0 + (self.leverage - 1.0) * 0.1
    }
}

impl SizingPolicy for PerpSizingPolicy {
    fn per_level_size(&self, grid: &Grid, total_balance_in_quote: f64, current_price: f64) -> f64 {
        let margin_per_grid = total_balance_in_quote / grid.levels.len() as f64;
        let max_size = margin_per_grid * self.leverage / current_price
            * (1.0 - self.maintenance_margin_ratio);
        if max_size < 0.0 {
            warn!("perpetual max size computed negative, clamping to 0");
            0.0
        } else {
            max_size
        }
    }

    fn initial_order_quantity(
        &self,
        grid: &Grid,
        current_fiat_balance: f64,
        current_crypto_balance: f64,
        current_price: f64,
        total_balance_in_quote: f64,
    ) -> f64 {
        let per_level = self.per_level_size(grid, total_balance_in_quote, current_price);
        let target_base: f64 = grid
            .levels
            .iter()
            .filter(|l| l.in_sell_set)
            .map(|_| per_level)
            .sum();
        let shortfall = target_base - current_crypto_balance;
        if shortfall <= 0.0 {
            return 0.0;
        }
        (shortfall * current_price).min(current_fiat_balance).max(0.0)
    }
}
