//! Bus-to-queue notification adapter.
//!
//! Subscribes to the event bus and, for each event, joins it with the
//! counter totals from a store snapshot into a delivery payload, then
//! pushes the payload onto the bounded notification queue. The handler
//! only enqueues; delivery happens in the notification worker, so the
//! publisher is never blocked on I/O.

use std::sync::Arc;
use tracing::warn;

use crate::notify::payload::{build_alarm_webhook_payload, NotificationJob};
use crate::runtime::{BoundedQueue, EventBus};
use crate::store::StateStore;

pub struct NotificationAdapter;

impl NotificationAdapter {
    /// Register the adapter on the bus
    pub fn attach(
        bus: &EventBus,
        store: Arc<StateStore>,
        queue: Arc<BoundedQueue<NotificationJob>>,
    ) {
        bus.subscribe("notification-adapter", move |event| {
            let totals = store.counters();
            let payload = build_alarm_webhook_payload(event, &totals);
            if queue.push(NotificationJob::new(payload)) {
                warn!(
                    "Notification queue full; dropped oldest payload (total dropped: {})",
                    queue.dropped()
                );
            }
        });
    }
}
