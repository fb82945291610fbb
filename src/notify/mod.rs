//! Notification fan-out: payload construction, the bus-to-queue adapter,
//! and the webhook delivery worker.

pub mod adapter;
pub mod payload;
pub mod webhook;

pub use adapter::NotificationAdapter;
pub use payload::{build_alarm_webhook_payload, NotificationJob};
pub use webhook::{DeliveryOutcome, NotificationWorker, Notifier, WebhookNotifier};
