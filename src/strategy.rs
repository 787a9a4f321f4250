//! Top-level control loop: trigger detection, tick handling, and
//! backtest/live mode dispatch (§4.8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use log::{info, warn};

use crate::config::{EngineConfig, TradingMode};
use crate::error::GridResult;
use crate::event_bus::EventBus;
use crate::exchange::Exchange;
use crate::execution::BacktestExecutionStrategy;
use crate::order_manager::OrderManager;

/// One `(timestamp, account_value)` sample recorded while the
/// strategy runs.
#[derive(Debug, Clone, Copy)]
pub struct AccountValueSample {
    pub timestamp: i64,
    pub account_value: f64,
}

/// Edge-triggered: arms iff `last_price <= trigger_price <=
/// current_price`, or an exact hit on the first observed tick once a
/// `last_price` exists. Never arms before a `last_price` is known.
fn crosses_trigger(last_price: Option<f64>, trigger_price: f64, current_price: f64) -> bool {
    match last_price {
        None => false,
        Some(last) => {
            (last <= trigger_price && trigger_price <= current_price) || last == trigger_price
        }
    }
}

pub struct TradingStrategy {
    order_manager: Arc<OrderManager>,
    exchange: Arc<dyn Exchange>,
    event_bus: EventBus,
    config: EngineConfig,
    symbol: String,
    backtest_execution: Option<Arc<BacktestExecutionStrategy>>,
    stop_flag: Arc<AtomicBool>,
    armed: AtomicBool,
    account_value_series: StdMutex<Vec<AccountValueSample>>,
}

impl TradingStrategy {
    pub fn new(
        order_manager: Arc<OrderManager>,
        exchange: Arc<dyn Exchange>,
        event_bus: EventBus,
        config: EngineConfig,
        symbol: String,
        backtest_execution: Option<Arc<BacktestExecutionStrategy>>,
    ) -> Self {
        Self {
            order_manager,
            exchange,
            event_bus,
            config,
            symbol,
            backtest_execution,
            stop_flag: Arc::new(AtomicBool::new(false)),
            armed: AtomicBool::new(false),
            account_value_series: StdMutex::new(Vec::new()),
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        !self.stop_flag.load(Ordering::SeqCst)
    }

    pub fn account_value_series(&self) -> Vec<AccountValueSample> {
        self.account_value_series.lock().expect("poisoned").clone()
    }

    fn trigger_price(&self) -> f64 {
        self.config.trigger_price.unwrap_or_else(|| self.order_manager.central_price())
    }

    async fn arm(&self, current_price: f64) {
        info!("arming at price {}", current_price);
        if let Err(e) = self.order_manager.perform_initial_purchase(current_price).await {
            warn!("initial purchase failed: {}", e);
        }
        self.order_manager.initialize_grid_orders(current_price).await;
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn check_take_profit_stop_loss(&self, current_price: f64) -> bool {
        let tp_hit = self.config.take_profit.enabled && current_price >= self.config.take_profit.threshold;
        let sl_hit = self.config.stop_loss.enabled && current_price <= self.config.stop_loss.threshold;
        if tp_hit || sl_hit {
            // Overlapping thresholds can both be crossed on the same tick;
            // take-profit wins so an overlap exits a winning position
            // rather than reporting a loss.
            let (tp, sl) = if tp_hit { (true, false) } else { (false, true) };
            if let Err(e) = self
                .order_manager
                .execute_take_profit_or_stop_loss_order(current_price, tp, sl)
                .await
            {
                warn!("take-profit/stop-loss execution failed: {}", e);
            }
            self.stop_flag.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    pub async fn run(&self) -> GridResult<()> {
        match self.config.trading_mode {
            TradingMode::Backtest => self.run_backtest().await,
            TradingMode::Live | TradingMode::PaperTrading => self.run_live().await,
        }
    }

    async fn run_backtest(&self) -> GridResult<()> {
        let timeframe = self.config.timeframe.as_deref().unwrap_or("1h");
        let start = parse_timestamp(self.config.start_date.as_deref());
        let end = parse_timestamp(self.config.end_date.as_deref());
        let bars = self.exchange.fetch_ohlcv(&self.symbol, timeframe, start, end).await?;
        let trigger_price = self.trigger_price();

        let mut last_price: Option<f64> = None;
        for bar in bars {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            if let Some(exec) = &self.backtest_execution {
                exec.set_current_bar_close(bar.close);
            }

            if !self.armed.load(Ordering::SeqCst) && crosses_trigger(last_price, trigger_price, bar.close) {
                self.arm(bar.close).await;
            }

            if self.armed.load(Ordering::SeqCst) {
                self.order_manager
                    .simulate_order_fills(bar.high, bar.low, bar.timestamp)
                    .await;

                if self.check_take_profit_stop_loss(bar.close).await {
                    self.record_account_value(bar.timestamp, bar.close);
                    return Ok(());
                }
            }

            self.record_account_value(bar.timestamp, bar.close);
            last_price = Some(bar.close);
        }
        Ok(())
    }

    async fn run_live(&self) -> GridResult<()> {
        let trigger_price = self.trigger_price();
        let mut rx = self
            .exchange
            .listen_to_ticker_updates(&self.symbol, self.config.ticker_refresh_interval_secs)
            .await?;

        let mut last_price: Option<f64> = None;
        while let Some(price) = rx.recv().await {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }

            if !self.armed.load(Ordering::SeqCst) && crosses_trigger(last_price, trigger_price, price) {
                self.arm(price).await;
            } else if self.armed.load(Ordering::SeqCst) && self.check_take_profit_stop_loss(price).await {
                break;
            }

            self.record_account_value(0, price);
            last_price = Some(price);
        }
        Ok(())
    }

    fn record_account_value(&self, timestamp: i64, current_price: f64) {
        let account_value = self.order_manager.account_value(current_price);
        self.account_value_series.lock().expect("poisoned").push(AccountValueSample {
            timestamp,
            account_value,
        });
    }
}

/// Accepts a bare `YYYY-MM-DD` date or a full RFC 3339 timestamp;
/// unparseable or absent input defaults to the Unix epoch.
fn parse_timestamp(date: Option<&str>) -> i64 {
    date.and_then(|d| {
        chrono::DateTime::parse_from_rfc3339(d)
            .map(|dt| dt.timestamp_millis())
            .ok()
            .or_else(|| {
                chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .ok()
                    .and_then(|nd| nd.and_hms_opt(0, 0, 0))
                    .map(|ndt| chrono::DateTime::<chrono::Utc>::from_utc(ndt, chrono::Utc).timestamp_millis())
            })
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arms_only_on_rising_crossing_with_known_last_price() {
        assert!(!crosses_trigger(None, 105.0, 106.0));
        assert!(crosses_trigger(Some(104.0), 105.0, 106.0));
        assert!(!crosses_trigger(Some(106.0), 105.0, 104.0));
        assert!(crosses_trigger(Some(105.0), 105.0, 105.0));
    }

    #[test]
    fn parses_bare_date_and_rfc3339_and_defaults_on_garbage() {
        assert_eq!(parse_timestamp(None), 0);
        assert_eq!(parse_timestamp(Some("not a date")), 0);
        assert_eq!(parse_timestamp(Some("2024-01-01")), 1704067200000);
        assert_eq!(
            parse_timestamp(Some("2024-01-01T00:00:00Z")),
            1704067200000
        );
    }
}
