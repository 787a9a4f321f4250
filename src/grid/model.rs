//! The Grid aggregate: the ladder plus pairing and sizing logic
//! (§3 "Grid", §4.2.3 pairing policy, §4.2.4 sizing).

use log::debug;

use crate::config::{EngineConfig, SpacingType, StrategyType};
use crate::error::GridResult;
use crate::order::OrderSide;

use super::geometry::build_ladder;
use super::level::{GridLevel, LevelState};

/// A sorted sequence of `GridLevel`s plus the strategy-wide central
/// price used to partition the initial ladder.
pub struct Grid {
    pub levels: Vec<GridLevel>,
    pub central_price: f64,
    pub strategy_type: StrategyType,
}

impl Grid {
    /// Build a grid's geometry and initial per-level state assignment
    /// from engine configuration.
    pub fn new(config: &EngineConfig) -> GridResult<Self> {
        let spacing = config.spacing_type;
        let (prices, central_price) = build_ladder(
            config.bottom_range,
            config.top_range,
            config.num_grids,
            spacing,
        )?;
        let top_index = prices.len() as u32 - 1;

        let levels = prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| {
                let index = i as u32;
                let (in_buy_set, in_sell_set, state) = match config.strategy_type {
                    StrategyType::SimpleGrid => {
                        let is_buy = price <= central_price;
                        (is_buy, !is_buy, if is_buy {
                            LevelState::ReadyToBuy
                        } else {
                            LevelState::ReadyToSell
                        })
                    }
                    StrategyType::HedgedGrid => {
                        let is_top = index == top_index;
                        let is_bottom = index == 0;
                        let state = if is_top {
                            LevelState::ReadyToSell
                        } else {
                            LevelState::ReadyToBuyOrSell
                        };
                        (!is_top, !is_bottom, state)
                    }
                };
                GridLevel::new(index, price, state, in_buy_set, in_sell_set)
            })
            .collect();

        Ok(Self {
            levels,
            central_price,
            strategy_type: config.strategy_type,
        })
    }

    pub fn level(&self, index: u32) -> Option<&GridLevel> {
        self.levels.get(index as usize)
    }

    pub fn level_mut(&mut self, index: u32) -> Option<&mut GridLevel> {
        self.levels.get_mut(index as usize)
    }

    /// Levels currently eligible for a buy placement, in price order.
    pub fn sorted_buy_grids(&self) -> Vec<&GridLevel> {
        self.levels
            .iter()
            .filter(|l| l.can_place(OrderSide::Buy))
            .collect()
    }

    /// Levels currently eligible for a sell placement, in price order.
    pub fn sorted_sell_grids(&self) -> Vec<&GridLevel> {
        self.levels
            .iter()
            .filter(|l| l.can_place(OrderSide::Sell))
            .collect()
    }

    fn is_hedged_interior(&self, index: u32) -> bool {
        self.strategy_type == StrategyType::HedgedGrid && index != self.levels.len() as u32 - 1
    }

    /// Apply a fill at `index` to its level's state machine.
    pub fn transition_on_fill(&mut self, index: u32, filled_side: OrderSide) {
        let interior = self.is_hedged_interior(index);
        if let Some(level) = self.level_mut(index) {
            level.transition_on_fill(filled_side, interior);
        }
    }

    /// §4.2.3: when a buy fills at `filled_index`, the paired sell is
    /// the smallest index above it that can currently place a sell.
    /// Pairing links are stored bidirectionally.
    pub fn pair_sell_for_filled_buy(&mut self, filled_index: u32) -> Option<u32> {
        let target = self
            .levels
            .iter()
            .filter(|l| l.index > filled_index && l.can_place(OrderSide::Sell))
            .map(|l| l.index)
            .min()?;

        if let Some(l) = self.level_mut(filled_index) {
            l.paired_sell_level = Some(target);
        }
        if let Some(l) = self.level_mut(target) {
            l.paired_buy_level = Some(filled_index);
        }
        Some(target)
    }

    /// §4.2.3: when a sell fills at `filled_index`, the paired buy is
    /// the level's stored `paired_buy_level` if still placeable, else
    /// the greatest placeable index below it.
    ///
    /// The fallback target is used only for this placement; the
    /// stored link is left untouched so a later reverse fill still
    /// re-targets the originally paired level (resolves the open
    /// question on whether a fallback overwrites the stored link: it
    /// does not).
    pub fn pair_buy_for_filled_sell(&mut self, filled_index: u32) -> Option<u32> {
        let stored = self.level(filled_index).and_then(|l| l.paired_buy_level);
        if let Some(stored_index) = stored {
            if self
                .level(stored_index)
                .map(|l| l.can_place(OrderSide::Buy))
                .unwrap_or(false)
            {
                return Some(stored_index);
            }
        }

        let fallback = self
            .levels
            .iter()
            .filter(|l| l.index < filled_index && l.can_place(OrderSide::Buy))
            .map(|l| l.index)
            .max();

        debug!(
            "pairing fallback for filled sell at {}: stored={:?}, fallback={:?}",
            filled_index, stored, fallback
        );
        fallback
    }

    /// §4.2.4 sizing (spot): per-level order size given the total
    /// balance denominated in quote currency and the current price.
    pub fn per_level_size(&self, total_balance_in_quote: f64, current_price: f64) -> f64 {
        total_balance_in_quote / self.levels.len() as f64 / current_price
    }

    /// §4.2.4: quote-denominated amount needed to bring the base
    /// position up to the target implied by the initial ladder of
    /// sell-eligible levels. Adapted from the perpetual sizing
    /// pattern of "target minus current, clipped by what's available"
    /// since the spot grid manager's own version was not retrievable;
    /// see DESIGN.md.
    pub fn get_initial_order_quantity(
        &self,
        current_fiat_balance: f64,
        current_crypto_balance: f64,
        current_price: f64,
        total_balance_in_quote: f64,
    ) -> f64 {
        let per_level = self.per_level_size(total_balance_in_quote, current_price);
        let target_base: f64 = self
            .levels
            .iter()
            .filter(|l| l.can_place(OrderSide::Sell))
            .map(|_| per_level)
            .sum();

        let shortfall_base = target_base - current_crypto_balance;
        if shortfall_base <= 0.0 {
            return 0.0;
        }
        let quote_needed = shortfall_base * current_price;
        quote_needed.min(current_fiat_balance).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RiskThreshold, TradingMode};

    fn config(strategy_type: StrategyType, spacing: SpacingType) -> EngineConfig {
        EngineConfig {
            trading_mode: TradingMode::Backtest,
            strategy_type,
            spacing_type: spacing,
            bottom_range: 100.0,
            top_range: 110.0,
            num_grids: 11,
            base_currency: "BTC".into(),
            quote_currency: "USDT".into(),
            initial_balance: 1000.0,
            initial_crypto_balance: 0.0,
            trading_fee: 0.0,
            timeframe: None,
            start_date: None,
            end_date: None,
            trigger_price: None,
            take_profit: RiskThreshold::default(),
            stop_loss: RiskThreshold::default(),
            leverage: None,
            maintenance_margin_ratio: None,
            max_retries: 3,
            retry_delay_secs: 1,
            max_slippage: 0.01,
            polling_interval_secs: 5,
            ticker_refresh_interval_secs: 3,
        }
    }

    #[test]
    fn simple_grid_partitions_by_central_price() {
        let grid = Grid::new(&config(StrategyType::SimpleGrid, SpacingType::Arithmetic)).unwrap();
        assert_eq!(grid.sorted_buy_grids().len(), 6); // 100..105 inclusive
        assert_eq!(grid.sorted_sell_grids().len(), 5); // 106..110
    }

    #[test]
    fn hedged_grid_excludes_extremes_from_opposite_side() {
        let grid = Grid::new(&config(StrategyType::HedgedGrid, SpacingType::Arithmetic)).unwrap();
        assert!(!grid.level(10).unwrap().in_buy_set);
        assert!(!grid.level(0).unwrap().in_sell_set);
        assert!(grid.sorted_buy_grids().iter().all(|l| l.index != 10));
        assert!(grid.sorted_sell_grids().iter().all(|l| l.index != 0));
    }

    #[test]
    fn pairing_picks_smallest_higher_sell_level() {
        let mut grid = Grid::new(&config(StrategyType::SimpleGrid, SpacingType::Arithmetic)).unwrap();
        // level 5 (price 105) fills its buy.
        grid.transition_on_fill(5, OrderSide::Buy);
        let paired = grid.pair_sell_for_filled_buy(5).unwrap();
        assert_eq!(paired, 6);
        assert_eq!(grid.level(5).unwrap().paired_sell_level, Some(6));
        assert_eq!(grid.level(6).unwrap().paired_buy_level, Some(5));
    }

    #[test]
    fn fallback_pairing_does_not_overwrite_stored_link() {
        let mut grid = Grid::new(&config(StrategyType::SimpleGrid, SpacingType::Arithmetic)).unwrap();
        grid.transition_on_fill(5, OrderSide::Buy);
        grid.pair_sell_for_filled_buy(5);
        // Level 5's buy slot is occupied again (pretend retrieved elsewhere) so
        // it cannot be the direct fallback target for level 6's next sell fill.
        grid.level_mut(5).unwrap().mark_waiting(OrderSide::Buy, "x".into());
        grid.transition_on_fill(6, OrderSide::Sell);
        let paired = grid.pair_buy_for_filled_sell(6).unwrap();
        assert_ne!(paired, 5);
        // Stored link is untouched.
        assert_eq!(grid.level(6).unwrap().paired_buy_level, Some(5));
    }

    #[test]
    fn per_level_size_matches_formula() {
        let grid = Grid::new(&config(StrategyType::SimpleGrid, SpacingType::Arithmetic)).unwrap();
        let size = grid.per_level_size(1000.0, 100.0);
        assert!((size - 1000.0 / 11.0 / 100.0).abs() < 1e-9);
    }
}
