//! Retrying, slippage-adjusted execution against a real exchange adapter (§4.4.1).

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::error::{GridError, GridResult};
use crate::exchange::Exchange;
use crate::order::{Order, OrderSide, OrderStatus, OrderType};

use super::ExecutionStrategy;

pub struct LiveExecutionStrategy {
    exchange: Arc<dyn Exchange>,
    max_retries: u32,
    retry_delay: Duration,
    max_slippage: f64,
    /// Every attempt's resulting order, for diagnostics and tests —
    /// a partial fill followed by a successful retry leaves two
    /// entries here even though only the final one is returned.
    history: Mutex<Vec<Order>>,
}

impl LiveExecutionStrategy {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        max_retries: u32,
        retry_delay: Duration,
        max_slippage: f64,
    ) -> Self {
        Self {
            exchange,
            max_retries,
            retry_delay,
            max_slippage,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history(&self) -> Vec<Order> {
        self.history.lock().expect("poisoned").clone()
    }

    fn slippage_adjusted_price(&self, side: OrderSide, price: f64, attempt: u32) -> f64 {
        let adjustment = self.max_slippage * attempt as f64 / self.max_retries as f64;
        match side {
            OrderSide::Buy => price * (1.0 + adjustment),
            OrderSide::Sell => price * (1.0 - adjustment),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for LiveExecutionStrategy {
    async fn execute_market_order(
        &self,
        side: OrderSide,
        symbol: &str,
        qty: f64,
        price: f64,
    ) -> GridResult<Order> {
        let mut remaining = qty;
        let mut attempt = 1u32;

        while attempt <= self.max_retries {
            let adj_price = self.slippage_adjusted_price(side, price, attempt);
            debug!(
                "market order attempt {}/{}: {:?} {} {} @ {}",
                attempt, self.max_retries, side, remaining, symbol, adj_price
            );
            let raw = self
                .exchange
                .place_order(symbol, OrderType::Market, side, remaining, adj_price)
                .await?;
            let order = raw.into_order();
            self.history.lock().expect("poisoned").push(order.clone());

            if order.status == OrderStatus::Closed {
                return Ok(order);
            }

            if order.status == OrderStatus::Open && order.filled > 0.0 {
                info!(
                    "partial fill on attempt {}: filled {} of {}",
                    attempt, order.filled, remaining
                );
                remaining = order.remaining;
                if let Err(e) = self.exchange.cancel_order(&order.id, symbol).await {
                    warn!("cancel of partially filled order {} failed: {}", order.id, e);
                }
            }

            attempt += 1;
            if attempt <= self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(GridError::OrderExecutionFailedError {
            attempts: self.max_retries,
            reason: format!("{} of {} remained unfilled after all retries", remaining, qty),
        })
    }

    async fn execute_limit_order(
        &self,
        side: OrderSide,
        symbol: &str,
        qty: f64,
        price: f64,
    ) -> GridResult<Order> {
        let raw = self
            .exchange
            .place_order(symbol, OrderType::Limit, side, qty, price)
            .await?;
        Ok(raw.into_order())
    }

    async fn get_order(&self, id: &str, symbol: &str) -> GridResult<Order> {
        let raw = self.exchange.fetch_order(id, symbol).await?;
        Ok(raw.into_order())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Bar, ExchangeBalance};
    use crate::order::RawOrder;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubExchange {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Exchange for StubExchange {
        async fn get_balance(&self) -> GridResult<ExchangeBalance> {
            Ok(ExchangeBalance::default())
        }

        async fn place_order(
            &self,
            symbol: &str,
            _order_type: OrderType,
            side: OrderSide,
            qty: f64,
            price: f64,
        ) -> GridResult<RawOrder> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt == 0 {
                Ok(RawOrder {
                    id: "1".into(),
                    status: "OPEN".into(),
                    order_type: "MARKET".into(),
                    side: format!("{:?}", side).to_uppercase(),
                    price,
                    amount: qty,
                    filled: 0.3,
                    remaining: qty - 0.3,
                    average: Some(price),
                    timestamp: 0,
                    symbol: symbol.to_string(),
                    fee: 0.0,
                })
            } else {
                Ok(RawOrder {
                    id: "2".into(),
                    status: "CLOSED".into(),
                    order_type: "MARKET".into(),
                    side: format!("{:?}", side).to_uppercase(),
                    price,
                    amount: qty,
                    filled: qty,
                    remaining: 0.0,
                    average: Some(price),
                    timestamp: 0,
                    symbol: symbol.to_string(),
                    fee: 0.0,
                })
            }
        }

        async fn fetch_order(&self, _id: &str, _symbol: &str) -> GridResult<RawOrder> {
            unimplemented!()
        }

        async fn cancel_order(&self, _id: &str, _symbol: &str) -> GridResult<bool> {
            Ok(true)
        }

        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _start: i64,
            _end: i64,
        ) -> GridResult<Vec<Bar>> {
            Ok(vec![])
        }

        async fn listen_to_ticker_updates(
            &self,
            _symbol: &str,
            _interval_secs: u64,
        ) -> GridResult<tokio::sync::mpsc::Receiver<f64>> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        async fn get_exchange_status(&self) -> GridResult<String> {
            Ok("ok".into())
        }

        async fn close_connection(&self) -> GridResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn partial_fill_is_cancelled_and_retried_to_completion() {
        let exchange = Arc::new(StubExchange {
            attempts: AtomicU32::new(0),
        });
        let strategy = LiveExecutionStrategy::new(exchange, 3, Duration::from_millis(1), 0.03);
        let order = strategy
            .execute_market_order(OrderSide::Buy, "BTC/USDT", 1.0, 100.0)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Closed);
        assert_eq!(strategy.history().len(), 2);
        assert!((strategy.history()[0].filled - 0.3).abs() < 1e-9);
    }

    struct AlwaysOpenExchange;

    #[async_trait]
    impl Exchange for AlwaysOpenExchange {
        async fn get_balance(&self) -> GridResult<ExchangeBalance> {
            Ok(ExchangeBalance::default())
        }

        async fn place_order(
            &self,
            symbol: &str,
            _order_type: OrderType,
            side: OrderSide,
            qty: f64,
            price: f64,
        ) -> GridResult<RawOrder> {
            Ok(RawOrder {
                id: "x".into(),
                status: "OPEN".into(),
                order_type: "MARKET".into(),
                side: format!("{:?}", side).to_uppercase(),
                price,
                amount: qty,
                filled: 0.0,
                remaining: qty,
                average: None,
                timestamp: 0,
                symbol: symbol.to_string(),
                fee: 0.0,
            })
        }

        async fn fetch_order(&self, _id: &str, _symbol: &str) -> GridResult<RawOrder> {
            unimplemented!()
        }

        async fn cancel_order(&self, _id: &str, _symbol: &str) -> GridResult<bool> {
            Ok(true)
        }

        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _start: i64,
            _end: i64,
        ) -> GridResult<Vec<Bar>> {
            Ok(vec![])
        }

        async fn listen_to_ticker_updates(
            &self,
            _symbol: &str,
            _interval_secs: u64,
        ) -> GridResult<tokio::sync::mpsc::Receiver<f64>> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        async fn get_exchange_status(&self) -> GridResult<String> {
            Ok("ok".into())
        }

        async fn close_connection(&self) -> GridResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn fails_after_all_retries_exhausted() {
        let strategy = LiveExecutionStrategy::new(
            Arc::new(AlwaysOpenExchange),
            2,
            Duration::from_millis(1),
            0.03,
        );
        let result = strategy
            .execute_market_order(OrderSide::Buy, "BTC/USDT", 1.0, 100.0)
            .await;
        assert!(matches!(result, Err(GridError::OrderExecutionFailedError { .. })));
    }
}
