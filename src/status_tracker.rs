//! Cooperative polling loop that reconciles resting limit orders with
//! the exchange's view of them (§4.5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use crate::event_bus::{Event, EventBus};
use crate::execution::ExecutionStrategy;
use crate::order::OrderStatus;
use crate::order_book::OrderBook;

/// Polls every open limit order on a fixed interval and republishes
/// terminal transitions onto the event bus. Orders that have already
/// reached a terminal status drop out of [`OrderBook::open_limit_orders`]
/// on their own, so a duplicate CLOSED report from the exchange after
/// the first is simply never polled again — no separate dedup table
/// is needed.
pub struct OrderStatusTracker {
    event_bus: EventBus,
    order_book: Arc<StdMutex<OrderBook>>,
    execution: Arc<dyn ExecutionStrategy>,
    polling_interval: Duration,
    stop_flag: Arc<AtomicBool>,
    monitor_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl OrderStatusTracker {
    pub fn new(
        event_bus: EventBus,
        order_book: Arc<StdMutex<OrderBook>>,
        execution: Arc<dyn ExecutionStrategy>,
        polling_interval: Duration,
    ) -> Self {
        Self {
            event_bus,
            order_book,
            execution,
            polling_interval,
            stop_flag: Arc::new(AtomicBool::new(false)),
            monitor_handle: StdMutex::new(None),
        }
    }

    /// Spawn the monitor loop. A second call while already running is
    /// a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.monitor_handle.lock().expect("poisoned");
        if guard.is_some() {
            return;
        }
        self.stop_flag.store(false, Ordering::SeqCst);
        let this = self.clone();
        *guard = Some(tokio::spawn(async move {
            this.run().await;
        }));
    }

    /// Signal the loop to stop and await its current tick before
    /// returning.
    pub async fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        let handle = self.monitor_handle.lock().expect("poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn run(&self) {
        while !self.stop_flag.load(Ordering::SeqCst) {
            self.poll_once().await;
            tokio::time::sleep(self.polling_interval).await;
        }
    }

    async fn poll_once(&self) {
        let targets: Vec<(String, String)> = {
            let book = self.order_book.lock().expect("poisoned");
            book.open_limit_orders()
                .into_iter()
                .map(|o| (o.id.clone(), o.symbol.clone()))
                .collect()
        };

        let fetches = targets
            .into_iter()
            .map(|(id, symbol)| async move { (id.clone(), self.execution.get_order(&id, &symbol).await) });
        let results = futures_util::future::join_all(fetches).await;

        for (id, result) in results {
            let order = match result {
                Ok(order) => order,
                Err(e) => {
                    error!("status poll failed for order {}: {}", id, e);
                    continue;
                }
            };

            match order.status {
                OrderStatus::Closed => {
                    self.order_book
                        .lock()
                        .expect("poisoned")
                        .apply_update(order.clone());
                    info!("order {} filled", order.id);
                    self.event_bus.publish(Event::OrderFilled(order)).await;
                }
                OrderStatus::Canceled | OrderStatus::Expired => {
                    self.order_book
                        .lock()
                        .expect("poisoned")
                        .apply_update(order.clone());
                    info!("order {} cancelled/expired", order.id);
                    self.event_bus.publish(Event::OrderCancelled(order)).await;
                }
                OrderStatus::Open if order.filled > 0.0 => {
                    debug!(
                        "order {} partially filled: {} of {}",
                        order.id, order.filled, order.amount
                    );
                    self.order_book
                        .lock()
                        .expect("poisoned")
                        .apply_update(order);
                }
                OrderStatus::Open => {}
                OrderStatus::Unknown => {
                    warn!("order {} returned unknown status, not advancing state", order.id);
                }
            }
        }
    }
}
