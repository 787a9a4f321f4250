//! End-to-end scenario coverage wiring the public modules together,
//! the way a caller embedding the engine would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use grid_trading_engine::balance::BalanceTracker;
use grid_trading_engine::config::{EngineConfig, RiskThreshold, SpacingType, StrategyType, TradingMode};
use grid_trading_engine::error::GridResult;
use grid_trading_engine::event_bus::{Event, EventBus, Topic};
use grid_trading_engine::exchange::{Bar, Exchange, ExchangeBalance};
use grid_trading_engine::execution::BacktestExecutionStrategy;
use grid_trading_engine::grid::Grid;
use grid_trading_engine::order::{OrderSide, OrderType, RawOrder};
use grid_trading_engine::order_book::OrderBook;
use grid_trading_engine::order_manager::{OrderManager, SpotSizingPolicy, SpotValidationPolicy};
use grid_trading_engine::strategy::TradingStrategy;
use grid_trading_engine::validator::ExchangeStepSize;

fn config(take_profit: RiskThreshold) -> EngineConfig {
    config_with_balance(take_profit, 1000.0)
}

fn config_with_balance(take_profit: RiskThreshold, initial_balance: f64) -> EngineConfig {
    EngineConfig {
        trading_mode: TradingMode::Backtest,
        strategy_type: StrategyType::SimpleGrid,
        spacing_type: SpacingType::Arithmetic,
        bottom_range: 100.0,
        top_range: 110.0,
        num_grids: 11,
        base_currency: "BTC".into(),
        quote_currency: "USDT".into(),
        initial_balance,
        initial_crypto_balance: 0.0,
        trading_fee: 0.0,
        timeframe: None,
        start_date: None,
        end_date: None,
        trigger_price: None,
        take_profit,
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

struct BarFeedExchange {
    bars: Vec<Bar>,
}

#[async_trait]
impl Exchange for BarFeedExchange {
    async fn get_balance(&self) -> GridResult<ExchangeBalance> {
        Ok(ExchangeBalance::default())
    }

    async fn place_order(
        &self,
        _symbol: &str,
        _order_type: OrderType,
        _side: OrderSide,
        _qty: f64,
        _price: f64,
    ) -> GridResult<RawOrder> {
        unimplemented!("backtest mode never calls through to the exchange adapter")
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
        Ok(self.bars.clone())
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

fn build_manager(cfg: &EngineConfig) -> (Arc<OrderManager>, Arc<BacktestExecutionStrategy>, EventBus) {
    let _ = env_logger::try_init();
    let grid = Grid::new(cfg).unwrap();
    let execution = Arc::new(BacktestExecutionStrategy::new());
    let event_bus = EventBus::new();
    let order_manager = OrderManager::new(
        "BTC/USDT".into(),
        cfg.trading_mode,
        cfg.trading_fee,
        grid,
        Arc::new(Mutex::new(OrderBook::new())),
        BalanceTracker::from_initial(cfg.initial_balance, cfg.initial_crypto_balance),
        execution.clone(),
        event_bus.clone(),
        Arc::new(SpotSizingPolicy),
        Arc::new(SpotValidationPolicy {
            step: ExchangeStepSize {
                step_decimals: 6,
                min_notional: 1.0,
            },
        }),
        Arc::new(grid_trading_engine::notification::LoggingNotificationHandler),
    );
    order_manager.subscribe();
    (order_manager, execution, event_bus)
}

/// Scenario 3 (simple arm and pair), generalized: arming places buys
/// strictly below and sells strictly above the arming price, and a
/// subsequent bar fill pairs a new order on the opposite side while
/// balances stay conserved.
#[tokio::test]
async fn arm_places_paired_ladder_and_fill_pairs_opposite_order() {
    // A generous balance keeps every one of the eleven level reservations
    // comfortably clear of its rounding/truncation margin, so the ladder
    // places in full instead of this test depending on exact boundary
    // arithmetic.
    let cfg = config_with_balance(RiskThreshold::default(), 1_000_000.0);
    let (manager, execution, _bus) = build_manager(&cfg);

    let arm_price = 105.5;
    execution.set_current_bar_close(arm_price);
    manager.perform_initial_purchase(arm_price).await.unwrap();
    manager.initialize_grid_orders(arm_price).await;

    let before = manager.balance();
    assert!(before.reserved_quote > 0.0 || before.reserved_base > 0.0);

    // A bar whose range covers the 106 level's resting sell.
    manager.simulate_order_fills(107.0, 106.0, 1).await;

    let after = manager.balance();
    // Filling a sell releases reserved_base and credits quote.
    assert!(after.quote_balance > before.quote_balance);
}

/// Scenario 5 (TP triggers stop): once armed, a tick at or above the
/// take-profit threshold liquidates and publishes STOP_BOT exactly
/// once, and the backtest loop terminates.
#[tokio::test]
async fn take_profit_triggers_single_stop_bot_and_ends_loop() {
    let cfg = config(RiskThreshold {
        enabled: true,
        threshold: 120.0,
    });
    let (manager, execution, event_bus) = build_manager(&cfg);

    let stop_count = Arc::new(AtomicUsize::new(0));
    let counter = stop_count.clone();
    event_bus.subscribe(Topic::StopBot, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let bars = vec![
        Bar {
            timestamp: 1,
            open: 104.0,
            high: 104.0,
            low: 104.0,
            close: 104.0,
        },
        Bar {
            timestamp: 2,
            open: 106.0,
            high: 106.0,
            low: 106.0,
            close: 106.0,
        },
        Bar {
            timestamp: 3,
            open: 121.0,
            high: 121.0,
            low: 121.0,
            close: 121.0,
        },
        Bar {
            timestamp: 4,
            open: 121.0,
            high: 121.0,
            low: 121.0,
            close: 121.0,
        },
    ];
    let exchange: Arc<dyn Exchange> = Arc::new(BarFeedExchange { bars });

    let strategy = TradingStrategy::new(
        manager.clone(),
        exchange,
        event_bus,
        cfg,
        "BTC/USDT".into(),
        Some(execution),
    );
    strategy.run().await.unwrap();

    assert_eq!(stop_count.load(Ordering::SeqCst), 1);
    // The fourth bar is never reached: the loop returns as soon as the
    // take-profit check fires on the third.
    assert_eq!(strategy.account_value_series().len(), 3);
}

struct RecordingNotificationHandler {
    sent: Mutex<Vec<grid_trading_engine::notification::NotificationType>>,
}

#[async_trait]
impl grid_trading_engine::notification::NotificationHandler for RecordingNotificationHandler {
    async fn send(
        &self,
        notification_type: grid_trading_engine::notification::NotificationType,
        _details: grid_trading_engine::notification::NotificationDetails,
    ) {
        self.sent.lock().unwrap().push(notification_type);
    }
}

/// When a tick crosses both the take-profit and stop-loss thresholds at
/// once, take-profit wins: exactly one notification fires and it is
/// `TAKE_PROFIT_TRIGGERED`, never `STOP_LOSS_TRIGGERED`.
#[tokio::test]
async fn overlapping_take_profit_and_stop_loss_resolves_to_take_profit() {
    let mut cfg = config(RiskThreshold {
        enabled: true,
        threshold: 103.0,
    });
    cfg.stop_loss = RiskThreshold {
        enabled: true,
        threshold: 107.0,
    };
    let grid = Grid::new(&cfg).unwrap();
    let execution = Arc::new(BacktestExecutionStrategy::new());
    let event_bus = EventBus::new();
    let notifier = Arc::new(RecordingNotificationHandler {
        sent: Mutex::new(Vec::new()),
    });
    let order_manager = OrderManager::new(
        "BTC/USDT".into(),
        cfg.trading_mode,
        cfg.trading_fee,
        grid,
        Arc::new(Mutex::new(OrderBook::new())),
        BalanceTracker::from_initial(cfg.initial_balance, cfg.initial_crypto_balance),
        execution.clone(),
        event_bus.clone(),
        Arc::new(SpotSizingPolicy),
        Arc::new(SpotValidationPolicy {
            step: ExchangeStepSize {
                step_decimals: 6,
                min_notional: 1.0,
            },
        }),
        notifier.clone(),
    );
    order_manager.subscribe();

    let bars = vec![
        Bar {
            timestamp: 1,
            open: 104.0,
            high: 104.0,
            low: 104.0,
            close: 104.0,
        },
        Bar {
            timestamp: 2,
            open: 106.0,
            high: 106.0,
            low: 106.0,
            close: 106.0,
        },
    ];
    let exchange: Arc<dyn Exchange> = Arc::new(BarFeedExchange { bars });

    let strategy = TradingStrategy::new(
        order_manager,
        exchange,
        event_bus,
        cfg,
        "BTC/USDT".into(),
        Some(execution),
    );
    strategy.run().await.unwrap();

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        sent[0],
        grid_trading_engine::notification::NotificationType::TakeProfitTriggered
    ));
}

#[tokio::test]
async fn subscribers_observe_event_bus_publish_order() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    bus.subscribe(Topic::StartBot, move |event| {
        if let Event::StartBot(reason) = event {
            s.lock().unwrap().push(reason);
        }
    });
    bus.publish(Event::StartBot("a".into())).await;
    bus.publish(Event::StartBot("b".into())).await;
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
}
