//! In-process publish/subscribe for alarm events.
//!
//! Handlers are expected to enqueue and return; none may block the
//! publisher on I/O. The subscriber list is guarded only while it is
//! mutated or copied, never during dispatch.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::domain::AlarmEvent;

type Handler = Arc<dyn Fn(&AlarmEvent) + Send + Sync>;

/// Multi-subscriber event publisher
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<(String, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name (names are for logs only)
    pub fn subscribe(&self, name: impl Into<String>, handler: impl Fn(&AlarmEvent) + Send + Sync + 'static) {
        let name = name.into();
        debug!("Bus subscriber registered: {}", name);
        self.subscribers.write().push((name, Arc::new(handler)));
    }

    /// Dispatch an event to every current subscriber.
    ///
    /// The subscriber list is cloned under a short read guard; handlers
    /// run without any bus lock held.
    pub fn publish(&self, event: &AlarmEvent) {
        let subscribers: Vec<Handler> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in subscribers {
            handler(event);
        }
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlarmKey, AlarmSeverity, AlarmTransition, AlarmType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> AlarmEvent {
        AlarmEvent {
            key: AlarmKey::new("Pressure", AlarmType::HighLimit),
            transition: AlarmTransition::Raised,
            severity: AlarmSeverity::Warning,
            timestamp: chrono::Utc::now(),
            message: "test".into(),
            value: None,
            details: None,
        }
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let count = count.clone();
            bus.subscribe(format!("sub-{}", i), move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(bus.subscriber_count(), 3);

        bus.publish(&event());
        bus.publish(&event());
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_publish_with_no_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(&event());
    }

    #[test]
    fn test_subscribe_from_within_handler_does_not_deadlock() {
        let bus = Arc::new(EventBus::new());
        let bus2 = bus.clone();
        bus.subscribe("recursive", move |_| {
            bus2.subscribe("late", |_| {});
        });
        bus.publish(&event());
        assert_eq!(bus.subscriber_count(), 2);
    }
}
