//! Notification handler contract (§6 "Notification handler (consumed)").
//!
//! Transports (email, Slack, SMS, etc.) are an external collaborator;
//! this crate only defines the interface and a logging fallback used
//! when no transport is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    OrderPlaced,
    OrderFailed,
    OrderCancelled,
    TakeProfitTriggered,
    StopLossTriggered,
    HealthCheckAlert,
    ErrorOccurred,
}

/// Free-form key/value detail payload, mirroring the consumed
/// `send(type, **details)` contract.
pub type NotificationDetails = HashMap<String, String>;

#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// No delivery guarantees are consumed from this call; callers
    /// treat it as best-effort and never block on its outcome.
    async fn send(&self, notification_type: NotificationType, details: NotificationDetails);
}

/// Default handler used when no transport is configured: logs at a
/// level proportional to severity.
pub struct LoggingNotificationHandler;

#[async_trait]
impl NotificationHandler for LoggingNotificationHandler {
    async fn send(&self, notification_type: NotificationType, details: NotificationDetails) {
        // A real transport would ship this payload as its request body;
        // here it just gives the log line a stable, greppable shape.
        let payload = serde_json::to_string(&details).unwrap_or_else(|_| "{}".to_string());
        match notification_type {
            NotificationType::OrderFailed
            | NotificationType::ErrorOccurred
            | NotificationType::HealthCheckAlert => {
                warn!("{:?}: {}", notification_type, payload);
            }
            _ => {
                info!("{:?}: {}", notification_type, payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_handler_accepts_every_type() {
        let handler = LoggingNotificationHandler;
        for t in [
            NotificationType::OrderPlaced,
            NotificationType::OrderFailed,
            NotificationType::OrderCancelled,
            NotificationType::TakeProfitTriggered,
            NotificationType::StopLossTriggered,
            NotificationType::HealthCheckAlert,
            NotificationType::ErrorOccurred,
        ] {
            handler.send(t, HashMap::new()).await;
        }
    }
}
