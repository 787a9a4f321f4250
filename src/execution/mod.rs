//! The execution strategy interface and its live/backtest implementations (§4.4).

mod backtest;
mod live;

pub use backtest::BacktestExecutionStrategy;
pub use live::LiveExecutionStrategy;

use async_trait::async_trait;

use crate::error::GridResult;
use crate::order::{Order, OrderSide};

/// Interface to the exchange for order placement and status retrieval.
/// Live and backtest implementations share this contract so the Order
/// Manager never branches on trading mode itself.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// `price` is the reference price used to compute the slippage
    /// adjustment on retries; the live strategy submits at
    /// `price * (1 +/- adjustment)`, the backtest strategy ignores it
    /// and fills at the bar close.
    async fn execute_market_order(
        &self,
        side: OrderSide,
        symbol: &str,
        qty: f64,
        price: f64,
    ) -> GridResult<Order>;

    async fn execute_limit_order(
        &self,
        side: OrderSide,
        symbol: &str,
        qty: f64,
        price: f64,
    ) -> GridResult<Order>;

    async fn get_order(&self, id: &str, symbol: &str) -> GridResult<Order>;
}
