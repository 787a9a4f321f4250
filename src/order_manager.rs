//! Initial grid placement, fill handling, and take-profit/stop-loss
//! execution (§4.6).
//!
//! Sizing and validation are behind [`SizingPolicy`]/[`ValidationPolicy`]
//! so this manager serves both the spot and perpetual variants instead
//! of duplicating near-identical managers per variant.

use std::sync::{Arc, Mutex as StdMutex};

use log::{error, info, warn};

use crate::balance::BalanceTracker;
use crate::config::TradingMode;
use crate::error::{GridError, GridResult};
use crate::event_bus::{Event, EventBus, Topic};
use crate::execution::ExecutionStrategy;
use crate::grid::Grid;
use crate::notification::{NotificationHandler, NotificationType};
use crate::order::{Order, OrderSide, OrderStatus};
use crate::order_book::OrderBook;
use crate::validator::{ExchangeStepSize, OrderValidator};

/// Per-level and initial-purchase sizing, abstracted so the spot and
/// perpetual variants share one `OrderManager` (§9: "Factor a single
/// `OrderManager` with a pluggable `SizingPolicy` and `ValidationPolicy`").
pub trait SizingPolicy: Send + Sync {
    fn per_level_size(&self, grid: &Grid, total_balance_in_quote: f64, current_price: f64) -> f64;

    /// Quote-denominated amount to spend on the initial market buy;
    /// zero or negative skips it.
    fn initial_order_quantity(
        &self,
        grid: &Grid,
        current_fiat_balance: f64,
        current_crypto_balance: f64,
        current_price: f64,
        total_balance_in_quote: f64,
    ) -> f64;
}

pub trait ValidationPolicy: Send + Sync {
    fn validate_buy(&self, balance: f64, quantity: f64, price: f64) -> GridResult<f64>;
    fn validate_sell(&self, base_balance: f64, quantity: f64) -> GridResult<f64>;
}

/// Spot sizing per §4.2.4: delegates straight to the grid's own
/// per-level and initial-quantity formulas.
pub struct SpotSizingPolicy;

impl SizingPolicy for SpotSizingPolicy {
    fn per_level_size(&self, grid: &Grid, total_balance_in_quote: f64, current_price: f64) -> f64 {
        grid.per_level_size(total_balance_in_quote, current_price)
    }

    fn initial_order_quantity(
        &self,
        grid: &Grid,
        current_fiat_balance: f64,
        current_crypto_balance: f64,
        current_price: f64,
        total_balance_in_quote: f64,
    ) -> f64 {
        grid.get_initial_order_quantity(
            current_fiat_balance,
            current_crypto_balance,
            current_price,
            total_balance_in_quote,
        )
    }
}

pub struct SpotValidationPolicy {
    pub step: ExchangeStepSize,
}

impl ValidationPolicy for SpotValidationPolicy {
    fn validate_buy(&self, balance: f64, quantity: f64, price: f64) -> GridResult<f64> {
        OrderValidator::validate_buy(balance, quantity, price, self.step)
    }

    fn validate_sell(&self, base_balance: f64, quantity: f64) -> GridResult<f64> {
        OrderValidator::validate_sell(base_balance, quantity)
    }
}

/// Owns the grid, order book, and balance tracker for one trading
/// pair, and subscribes itself to `ORDER_FILLED` to drive pairing.
pub struct OrderManager {
    symbol: String,
    trading_mode: TradingMode,
    trading_fee: f64,
    grid: StdMutex<Grid>,
    order_book: Arc<StdMutex<OrderBook>>,
    balance: StdMutex<BalanceTracker>,
    execution: Arc<dyn ExecutionStrategy>,
    event_bus: EventBus,
    sizing: Arc<dyn SizingPolicy>,
    validation: Arc<dyn ValidationPolicy>,
    notifier: Arc<dyn NotificationHandler>,
}

impl OrderManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: String,
        trading_mode: TradingMode,
        trading_fee: f64,
        grid: Grid,
        order_book: Arc<StdMutex<OrderBook>>,
        balance: BalanceTracker,
        execution: Arc<dyn ExecutionStrategy>,
        event_bus: EventBus,
        sizing: Arc<dyn SizingPolicy>,
        validation: Arc<dyn ValidationPolicy>,
        notifier: Arc<dyn NotificationHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            symbol,
            trading_mode,
            trading_fee,
            grid: StdMutex::new(grid),
            order_book,
            balance: StdMutex::new(balance),
            execution,
            event_bus,
            sizing,
            validation,
            notifier,
        })
    }

    /// Register the `ORDER_FILLED` handler. Must be called once after
    /// construction since it needs an owned `Arc` to move into the
    /// closure.
    pub fn subscribe(self: &Arc<Self>) {
        let this = self.clone();
        self.event_bus.subscribe_async(Topic::OrderFilled, move |event| {
            let this = this.clone();
            async move {
                if let Event::OrderFilled(order) = event {
                    this.handle_order_filled(order).await;
                }
            }
        });
    }

    pub fn balance(&self) -> crate::balance::Balance {
        self.balance.lock().expect("poisoned").balance().clone()
    }

    pub fn account_value(&self, current_price: f64) -> f64 {
        self.balance.lock().expect("poisoned").account_value(current_price)
    }

    pub fn central_price(&self) -> f64 {
        self.grid.lock().expect("poisoned").central_price
    }

    fn total_balance_in_quote(&self, current_price: f64) -> f64 {
        self.balance.lock().expect("poisoned").account_value(current_price)
    }

    /// §4.6.1: place the initial ladder of resting limit orders.
    /// Per-level failures are logged and do not abort the remaining
    /// levels.
    pub async fn initialize_grid_orders(&self, current_price: f64) {
        let total_balance = self.total_balance_in_quote(current_price);

        let buy_targets: Vec<(u32, f64)> = {
            let grid = self.grid.lock().expect("poisoned");
            grid.sorted_buy_grids()
                .into_iter()
                .filter(|l| l.price < current_price)
                .map(|l| (l.index, l.price))
                .collect()
        };
        for (index, price) in buy_targets {
            let size = self.sizing.per_level_size(&self.grid.lock().expect("poisoned"), total_balance, current_price);
            if let Err(e) = self.place_initial_level_order(index, price, OrderSide::Buy, size).await {
                error!("failed to place initial buy at level {}: {}", index, e);
                self.notify_order_failed(index, OrderSide::Buy, &e).await;
            }
        }

        let sell_targets: Vec<(u32, f64)> = {
            let grid = self.grid.lock().expect("poisoned");
            grid.sorted_sell_grids()
                .into_iter()
                .filter(|l| l.price > current_price)
                .map(|l| (l.index, l.price))
                .collect()
        };
        for (index, price) in sell_targets {
            let size = self.sizing.per_level_size(&self.grid.lock().expect("poisoned"), total_balance, current_price);
            if let Err(e) = self.place_initial_level_order(index, price, OrderSide::Sell, size).await {
                error!("failed to place initial sell at level {}: {}", index, e);
                self.notify_order_failed(index, OrderSide::Sell, &e).await;
            }
        }
    }

    async fn notify_order_failed(&self, level_index: u32, side: OrderSide, reason: &GridError) {
        let mut details = std::collections::HashMap::new();
        details.insert("symbol".to_string(), self.symbol.clone());
        details.insert("level_index".to_string(), level_index.to_string());
        details.insert("side".to_string(), format!("{:?}", side));
        details.insert("reason".to_string(), reason.to_string());
        self.notifier.send(NotificationType::OrderFailed, details).await;
    }

    async fn place_initial_level_order(
        &self,
        index: u32,
        price: f64,
        side: OrderSide,
        size: f64,
    ) -> GridResult<()> {
        let (qty, reserved_amount) = self.validate_and_reserve(side, size, price)?;
        let order = self
            .execution
            .execute_limit_order(side, &self.symbol, qty, price)
            .await?;
        self.grid
            .lock()
            .expect("poisoned")
            .level_mut(index)
            .ok_or(GridError::LevelNotFound(index))?
            .mark_waiting(side, order.id.clone());
        let mut book = self.order_book.lock().expect("poisoned");
        book.record_reservation(order.id.clone(), reserved_amount);
        book.insert(order, Some(index));
        Ok(())
    }

    /// Returns `(adjusted quantity, amount reserved for this order)` —
    /// quote for a buy, base for a sell — so the caller can record it
    /// against this order's id and release only this order's share on
    /// fill.
    fn validate_and_reserve(&self, side: OrderSide, qty: f64, price: f64) -> GridResult<(f64, f64)> {
        let mut balance = self.balance.lock().expect("poisoned");
        match side {
            OrderSide::Buy => {
                let adjusted = self.validation.validate_buy(balance.balance().quote_balance, qty, price)?;
                let reserved_amount = adjusted * price;
                balance.reserve_funds_for_buy(reserved_amount)?;
                Ok((adjusted, reserved_amount))
            }
            OrderSide::Sell => {
                let adjusted = self.validation.validate_sell(balance.balance().base_balance, qty)?;
                balance.reserve_funds_for_sell(adjusted)?;
                Ok((adjusted, adjusted))
            }
        }
    }

    /// §4.6.1: the initial market buy that seeds the base position
    /// before the ladder goes live. Returns `None` when the computed
    /// quantity is zero or negative.
    pub async fn perform_initial_purchase(&self, current_price: f64) -> GridResult<Option<Order>> {
        let total_balance = self.total_balance_in_quote(current_price);
        let (fiat, crypto) = {
            let balance = self.balance.lock().expect("poisoned");
            (balance.balance().quote_balance, balance.balance().base_balance)
        };

        let quote_amount = {
            let grid = self.grid.lock().expect("poisoned");
            self.sizing
                .initial_order_quantity(&grid, fiat, crypto, current_price, total_balance)
        };
        if quote_amount <= 0.0 {
            info!("initial purchase skipped: computed quantity is non-positive");
            return Ok(None);
        }

        let qty = quote_amount / current_price;
        let order = self
            .execution
            .execute_market_order(OrderSide::Buy, &self.symbol, qty, current_price)
            .await?;

        match self.trading_mode {
            TradingMode::Backtest => {
                self.order_book.lock().expect("poisoned").insert(order.clone(), None);
                self.event_bus.publish(Event::OrderFilled(order.clone())).await;
            }
            TradingMode::Live | TradingMode::PaperTrading => {
                self.balance.lock().expect("poisoned").update_after_initial_purchase(
                    order.filled,
                    order.average.unwrap_or(order.price),
                    order.fee,
                );
                self.order_book.lock().expect("poisoned").insert(order.clone(), None);
            }
        }
        Ok(Some(order))
    }

    /// §4.6.2: fill handling. The Balance Tracker always consumes the
    /// fill; pairing only applies when the order is tied to a grid
    /// level (TP/SL/initial orders are not).
    async fn handle_order_filled(&self, order: Order) {
        let already_terminal = self
            .order_book
            .lock()
            .expect("poisoned")
            .get(&order.id)
            .map(|existing| existing.status.is_terminal())
            .unwrap_or(false);
        if already_terminal {
            info!("ignoring repeat fill notification for already-terminal order {}", order.id);
            return;
        }

        let reserved_amount = self.order_book.lock().expect("poisoned").take_reservation(&order.id);
        self.balance.lock().expect("poisoned").apply_fill(
            order.side,
            order.filled,
            order.average.unwrap_or(order.price),
            order.fee,
            reserved_amount,
        );
        self.order_book.lock().expect("poisoned").apply_update(order.clone());

        let level_index = self.order_book.lock().expect("poisoned").level_of(&order.id);
        let Some(index) = level_index else {
            return;
        };

        self.grid.lock().expect("poisoned").transition_on_fill(index, order.side);

        let paired_target = match order.side {
            OrderSide::Buy => self.grid.lock().expect("poisoned").pair_sell_for_filled_buy(index),
            OrderSide::Sell => self.grid.lock().expect("poisoned").pair_buy_for_filled_sell(index),
        };
        let Some(target) = paired_target else {
            warn!("no placeable paired level for fill at level {}", index);
            return;
        };

        let paired_side = order.side.opposite();
        let price = match self.grid.lock().expect("poisoned").level(target) {
            Some(l) => l.price,
            None => {
                error!("paired level {} vanished", target);
                return;
            }
        };

        if let Err(e) = self.place_initial_level_order(target, price, paired_side, order.filled).await {
            error!("failed to place paired {:?} at level {}: {}", paired_side, target, e);
            self.notify_order_failed(target, paired_side, &e).await;
        }
    }

    /// §4.6.3: liquidate and signal the strategy to stop. At most one
    /// of `tp`/`sl` may be set.
    pub async fn execute_take_profit_or_stop_loss_order(
        &self,
        current_price: f64,
        tp: bool,
        sl: bool,
    ) -> GridResult<()> {
        if tp && sl {
            return Err(GridError::ConfigError(
                "take-profit and stop-loss cannot both trigger at once".into(),
            ));
        }
        let base_balance = self.balance.lock().expect("poisoned").balance().base_balance;
        if base_balance > 0.0 {
            let order = self
                .execution
                .execute_market_order(OrderSide::Sell, &self.symbol, base_balance, current_price)
                .await?;
            self.balance.lock().expect("poisoned").apply_fill(
                OrderSide::Sell,
                order.filled,
                order.average.unwrap_or(order.price),
                order.fee,
                0.0,
            );
            self.order_book.lock().expect("poisoned").insert(order, None);
        }
        let reason = if tp { "take_profit" } else { "stop_loss" };
        let mut details = std::collections::HashMap::new();
        details.insert("symbol".to_string(), self.symbol.clone());
        details.insert("price".to_string(), current_price.to_string());
        let notification_type = if tp {
            NotificationType::TakeProfitTriggered
        } else {
            NotificationType::StopLossTriggered
        };
        self.notifier.send(notification_type, details).await;
        self.event_bus.publish(Event::StopBot(reason.to_string())).await;
        Ok(())
    }

    /// §4.6.4: deterministic backtest fill synthesis. Buys are
    /// published before sells within the same bar.
    pub async fn simulate_order_fills(&self, high: f64, low: f64, timestamp: i64) {
        let (buys, sells): (Vec<Order>, Vec<Order>) = {
            let book = self.order_book.lock().expect("poisoned");
            let mut buys = Vec::new();
            let mut sells = Vec::new();
            for o in book.open_limit_orders() {
                if o.price >= low && o.price <= high {
                    match o.side {
                        OrderSide::Buy => buys.push(o.clone()),
                        OrderSide::Sell => sells.push(o.clone()),
                    }
                }
            }
            (buys, sells)
        };

        for mut order in buys.into_iter().chain(sells.into_iter()) {
            order.filled = order.amount;
            order.remaining = 0.0;
            order.status = OrderStatus::Closed;
            order.timestamp = timestamp;
            order.average = Some(order.price);
            order.fee = order.filled_value() * self.trading_fee;
            self.order_book.lock().expect("poisoned").apply_update(order.clone());
            self.event_bus.publish(Event::OrderFilled(order)).await;
        }
    }
}
