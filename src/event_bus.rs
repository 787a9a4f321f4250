//! Typed topic pub/sub glueing the engine's components together.
//!
//! Components never read one another's state directly (§5
//! shared-resource policy); the bus is the only cross-component
//! channel. Handlers are either synchronous closures, invoked inline,
//! or asynchronous closures returning a future, which are awaited
//! concurrently by `publish` and fired-and-forgotten by `publish_sync`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use log::error;

use crate::order::Order;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Topics carried by the bus, each paired with its payload type.
#[derive(Debug, Clone)]
pub enum Event {
    /// A resting order was fully filled.
    OrderFilled(Order),
    /// A resting order was cancelled by the exchange or by us.
    OrderCancelled(Order),
    /// Request to (re)start the bot; idempotent.
    StartBot(String),
    /// Request to stop the bot; idempotent.
    StopBot(String),
}

/// Discriminant used for subscription without requiring a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    OrderFilled,
    OrderCancelled,
    StartBot,
    StopBot,
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::OrderFilled(_) => Topic::OrderFilled,
            Event::OrderCancelled(_) => Topic::OrderCancelled,
            Event::StartBot(_) => Topic::StartBot,
            Event::StopBot(_) => Topic::StopBot,
        }
    }
}

enum Handler {
    Sync(Box<dyn Fn(Event) + Send + Sync>),
    Async(Box<dyn Fn(Event) -> BoxFuture + Send + Sync>),
}

/// Typed, in-process event bus.
///
/// Cloning an `EventBus` shares the same subscriber registry — it is a
/// handle, the way `Arc<RwLock<_>>`-backed state is shared elsewhere in
/// the engine.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<HashMap<Topic, Vec<Handler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a synchronous handler to `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .expect("event bus mutex poisoned")
            .entry(topic)
            .or_default()
            .push(Handler::Sync(Box::new(handler)));
    }

    /// Subscribe an asynchronous handler to `topic`.
    pub fn subscribe_async<F, Fut>(&self, topic: Topic, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers
            .lock()
            .expect("event bus mutex poisoned")
            .entry(topic)
            .or_default()
            .push(Handler::Async(Box::new(move |event| Box::pin(handler(event)))));
    }

    /// Publish `event`, invoking synchronous handlers inline and
    /// awaiting all asynchronous handlers concurrently before
    /// returning. Delivery to a given subscriber preserves publish
    /// order; a handler failure (panic) is not caught here — handlers
    /// are expected to report their own errors via notifications and
    /// never panic.
    pub async fn publish(&self, event: Event) {
        let topic = event.topic();
        let mut futures = Vec::new();
        {
            let guard = self.handlers.lock().expect("event bus mutex poisoned");
            if let Some(subs) = guard.get(&topic) {
                for handler in subs {
                    match handler {
                        Handler::Sync(f) => f(event.clone()),
                        Handler::Async(f) => futures.push(f(event.clone())),
                    }
                }
            }
        }
        futures_util::future::join_all(futures).await;
    }

    /// Publish from a non-cooperative call site: synchronous handlers
    /// still run inline, asynchronous handlers are spawned on the
    /// background scheduler and this call returns immediately without
    /// waiting for them.
    pub fn publish_sync(&self, event: Event) {
        let topic = event.topic();
        let guard = self.handlers.lock().expect("event bus mutex poisoned");
        if let Some(subs) = guard.get(&topic) {
            for handler in subs {
                match handler {
                    Handler::Sync(f) => f(event.clone()),
                    Handler::Async(f) => {
                        let fut = f(event.clone());
                        tokio::spawn(async move {
                            fut.await;
                        });
                    }
                }
            }
        } else {
            error!("publish_sync: no subscribers for topic {:?}", topic);
        }
    }
}
