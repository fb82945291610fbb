//! Webhook payload construction.

use serde_json::{json, Value};

use crate::domain::AlarmEvent;
use crate::store::Counters;

/// One queued delivery: the rendered payload plus its attempt counter
#[derive(Debug, Clone)]
pub struct NotificationJob {
    /// Rendered webhook body
    pub payload: Value,
    /// Delivery attempts already made
    pub attempt: u32,
}

impl NotificationJob {
    pub fn new(payload: Value) -> Self {
        Self { payload, attempt: 0 }
    }
}

/// Build the webhook payload for an alarm event joined with the store
/// totals captured at adapter time:
///
/// ```json
/// { "type": "alarm_event", "event": { ... }, "totals": { ... } }
/// ```
pub fn build_alarm_webhook_payload(event: &AlarmEvent, totals: &Counters) -> Value {
    json!({
        "type": "alarm_event",
        "event": event,
        "totals": totals,
    })
}
