//! The abstract exchange adapter consumed by the execution strategies
//! and the status tracker (§6 "Exchange adapter (consumed)").
//!
//! This crate does not implement a concrete exchange; the adapter
//! implementation is an external collaborator (§1). A deterministic,
//! network-free implementation for tests and backtest mode lives in
//! [`crate::execution::backtest`].

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::GridResult;
use crate::order::{OrderSide, OrderType, RawOrder};

/// One OHLCV bar.
#[derive(Debug, Clone, Copy)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// `{free: {CCY: amount}, used: {...}, total: {...}}`.
#[derive(Debug, Clone, Default)]
pub struct ExchangeBalance {
    pub free: HashMap<String, f64>,
    pub used: HashMap<String, f64>,
    pub total: HashMap<String, f64>,
}

impl ExchangeBalance {
    pub fn free_of(&self, currency: &str) -> f64 {
        self.free.get(currency).copied().unwrap_or(0.0)
    }
}

/// The abstract exchange interface (§6). Every method may suspend;
/// implementations are expected to raise [`crate::error::GridError::DataFetchError`]
/// on connectivity or response-shape failures.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn get_balance(&self) -> GridResult<ExchangeBalance>;

    async fn place_order(
        &self,
        symbol: &str,
        order_type: OrderType,
        side: OrderSide,
        qty: f64,
        price: f64,
    ) -> GridResult<RawOrder>;

    async fn fetch_order(&self, id: &str, symbol: &str) -> GridResult<RawOrder>;

    /// Returns `{status: "canceled"|...}`; here surfaced as whether
    /// the cancel succeeded.
    async fn cancel_order(&self, id: &str, symbol: &str) -> GridResult<bool>;

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        start: i64,
        end: i64,
    ) -> GridResult<Vec<Bar>>;

    /// Ticker stream: the returned channel receives a price every
    /// `interval` seconds, the Rust-idiomatic equivalent of the
    /// consumed `listen_to_ticker_updates(symbol, cb, interval)`
    /// callback contract.
    async fn listen_to_ticker_updates(
        &self,
        symbol: &str,
        interval_secs: u64,
    ) -> GridResult<tokio::sync::mpsc::Receiver<f64>>;

    /// `{status: "ok"|...}`.
    async fn get_exchange_status(&self) -> GridResult<String>;

    /// Idempotent teardown.
    async fn close_connection(&self) -> GridResult<()>;
}
