//! Per-level state (§3 "GridLevel", §4.2.2 state machine).

use serde::{Deserialize, Serialize};

use crate::order::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelState {
    ReadyToBuy,
    ReadyToSell,
    /// Quiescent state used by HEDGED_GRID interior levels.
    ReadyToBuyOrSell,
    WaitingForBuyFill,
    WaitingForSellFill,
    Completed,
}

/// One entity per price in the ladder. Created during grid
/// initialization, destroyed only at process end; only `state`,
/// `pending_order_id`, and the pairing links mutate afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridLevel {
    /// Stable index into the ladder — levels are referenced by index
    /// rather than by direct reference to avoid cycles in the pairing
    /// links.
    pub index: u32,
    pub price: f64,
    pub state: LevelState,
    pub pending_order_id: Option<String>,
    pub paired_buy_level: Option<u32>,
    pub paired_sell_level: Option<u32>,
    /// Whether this level may hold a buy order (all but the topmost
    /// level in HEDGED_GRID; all levels at/below central price in
    /// SIMPLE_GRID).
    pub in_buy_set: bool,
    /// Whether this level may hold a sell order (all but the
    /// bottommost level in HEDGED_GRID; all levels above central
    /// price in SIMPLE_GRID).
    pub in_sell_set: bool,
}

impl GridLevel {
    pub fn new(index: u32, price: f64, state: LevelState, in_buy_set: bool, in_sell_set: bool) -> Self {
        Self {
            index,
            price,
            state,
            pending_order_id: None,
            paired_buy_level: None,
            paired_sell_level: None,
            in_buy_set,
            in_sell_set,
        }
    }

    /// Per-level uniqueness: at most one order may be resting here.
    pub fn has_resting_order(&self) -> bool {
        matches!(
            self.state,
            LevelState::WaitingForBuyFill | LevelState::WaitingForSellFill
        )
    }

    /// Whether an order of `side` may currently be placed at this level.
    pub fn can_place(&self, side: OrderSide) -> bool {
        if self.has_resting_order() {
            return false;
        }
        match side {
            OrderSide::Buy => {
                self.in_buy_set
                    && matches!(self.state, LevelState::ReadyToBuy | LevelState::ReadyToBuyOrSell)
            }
            OrderSide::Sell => {
                self.in_sell_set
                    && matches!(self.state, LevelState::ReadyToSell | LevelState::ReadyToBuyOrSell)
            }
        }
    }

    pub fn mark_waiting(&mut self, side: OrderSide, order_id: String) {
        self.pending_order_id = Some(order_id);
        self.state = match side {
            OrderSide::Buy => LevelState::WaitingForBuyFill,
            OrderSide::Sell => LevelState::WaitingForSellFill,
        };
    }

    /// Revert to the most recent `READY_*` state, e.g. after a cancel.
    pub fn revert_to_ready(&mut self, side: OrderSide) {
        self.pending_order_id = None;
        self.state = match side {
            OrderSide::Buy => LevelState::ReadyToBuy,
            OrderSide::Sell => LevelState::ReadyToSell,
        };
    }

    /// Transition on fill (§4.2.2). `is_hedged_interior` selects the
    /// HEDGED_GRID quiescent-state behavior for all levels but the
    /// topmost.
    pub fn transition_on_fill(&mut self, filled_side: OrderSide, is_hedged_interior: bool) {
        self.pending_order_id = None;
        self.state = if is_hedged_interior {
            LevelState::ReadyToBuyOrSell
        } else {
            match filled_side {
                OrderSide::Buy => LevelState::ReadyToSell,
                OrderSide::Sell => LevelState::ReadyToBuy,
            }
        };
    }
}
