//! Lifecycle controller: start, stop, restart, health and balance
//! queries (§4.9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::balance::Balance;
use crate::event_bus::{Event, EventBus, Topic};
use crate::exchange::Exchange;
use crate::order_manager::OrderManager;
use crate::strategy::TradingStrategy;

/// Structured health record (supplements §4.9's boolean conjunction
/// with the components that produced it, for reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotHealthStatus {
    pub strategy_running: bool,
    pub exchange_status: String,
    pub healthy: bool,
}

pub struct BotController {
    strategy: Arc<TradingStrategy>,
    order_manager: Arc<OrderManager>,
    exchange: Arc<dyn Exchange>,
    event_bus: EventBus,
    running: AtomicBool,
    run_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl BotController {
    pub fn new(
        strategy: Arc<TradingStrategy>,
        order_manager: Arc<OrderManager>,
        exchange: Arc<dyn Exchange>,
        event_bus: EventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            strategy,
            order_manager,
            exchange,
            event_bus,
            running: AtomicBool::new(false),
            run_handle: StdMutex::new(None),
        })
    }

    /// Subscribe to `START_BOT`/`STOP_BOT`. Must be called once after
    /// construction.
    pub fn subscribe(self: &Arc<Self>) {
        let start_target = self.clone();
        self.event_bus.subscribe_async(Topic::StartBot, move |event| {
            let this = start_target.clone();
            async move {
                if let Event::StartBot(reason) = event {
                    info!("START_BOT received: {}", reason);
                    this.run().await;
                }
            }
        });

        let stop_target = self.clone();
        self.event_bus.subscribe_async(Topic::StopBot, move |event| {
            let this = stop_target.clone();
            async move {
                if let Event::StopBot(reason) = event {
                    info!("STOP_BOT received: {}", reason);
                    this._stop().await;
                }
            }
        });
    }

    /// Idempotent: a second call while already running is a no-op.
    pub async fn run(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("run() called while already running, ignoring");
            return;
        }
        let strategy = self.strategy.clone();
        let running_flag_owner = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = strategy.run().await {
                warn!("strategy loop exited with error: {}", e);
            }
            running_flag_owner.running.store(false, Ordering::SeqCst);
        });
        *self.run_handle.lock().expect("poisoned") = Some(handle);
    }

    /// Idempotent: stopping a non-running bot is a no-op.
    pub async fn _stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            info!("_stop() called while not running, ignoring");
            return;
        }
        self.strategy.request_stop();
        let handle = self.run_handle.lock().expect("poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop-if-running, then start.
    pub async fn restart(self: &Arc<Self>) {
        self._stop().await;
        self.run().await;
    }

    pub async fn get_bot_health_status(&self) -> BotHealthStatus {
        let strategy_running = self.running.load(Ordering::SeqCst) && self.strategy.is_running();
        let exchange_status = match self.exchange.get_exchange_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("health check failed to read exchange status: {}", e);
                "unreachable".to_string()
            }
        };
        let healthy = strategy_running && exchange_status == "ok";
        BotHealthStatus {
            strategy_running,
            exchange_status,
            healthy,
        }
    }

    pub fn get_balances(&self) -> Balance {
        self.order_manager.balance()
    }
}
