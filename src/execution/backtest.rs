//! Deterministic, network-free execution for unit tests and backtest
//! runs (§4.4.2).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{GridError, GridResult};
use crate::order::{Order, OrderSide, OrderStatus, OrderType};

use super::ExecutionStrategy;

/// Synthesizes orders with a monotonically increasing synthetic id.
/// `current_bar_close` is mutated by the backtest driver as it
/// advances through bars and is used as the fill price for market
/// orders.
pub struct BacktestExecutionStrategy {
    next_id: AtomicU64,
    current_bar_close: Mutex<f64>,
    placed: Mutex<std::collections::HashMap<String, Order>>,
}

impl BacktestExecutionStrategy {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            current_bar_close: Mutex::new(0.0),
            placed: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn set_current_bar_close(&self, close: f64) {
        *self.current_bar_close.lock().expect("poisoned") = close;
    }

    fn next_synthetic_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

impl Default for BacktestExecutionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStrategy for BacktestExecutionStrategy {
    async fn execute_market_order(
        &self,
        side: OrderSide,
        symbol: &str,
        qty: f64,
        _price: f64,
    ) -> GridResult<Order> {
        let close = *self.current_bar_close.lock().expect("poisoned");
        let mut order = Order::new(
            self.next_synthetic_id(),
            side,
            OrderType::Market,
            close,
            qty,
            symbol.to_string(),
        );
        order.status = OrderStatus::Closed;
        order.filled = qty;
        order.remaining = 0.0;
        order.average = Some(close);
        self.placed
            .lock()
            .expect("poisoned")
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn execute_limit_order(
        &self,
        side: OrderSide,
        symbol: &str,
        qty: f64,
        price: f64,
    ) -> GridResult<Order> {
        let order = Order::new(
            self.next_synthetic_id(),
            side,
            OrderType::Limit,
            price,
            qty,
            symbol.to_string(),
        );
        self.placed
            .lock()
            .expect("poisoned")
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: &str, _symbol: &str) -> GridResult<Order> {
        self.placed
            .lock()
            .expect("poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| GridError::OrderNotFound(id.to_string()))
    }
}
