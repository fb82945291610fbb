//! Alarm worker: the single consumer of the readings queue.
//!
//! Each tick pops one reading, applies it to the store, captures a view,
//! runs every registered criterion, feeds the collected decisions to the
//! engine, and publishes the returned events on the bus. After a shutdown
//! signal the worker drains the queue up to a configured limit and exits.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::criteria::{AlarmContext, AlarmCriteria};
use crate::domain::Reading;
use crate::engine::AlarmEngine;
use crate::runtime::{BoundedQueue, EventBus, Shutdown};
use crate::store::StateStore;

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

pub struct AlarmWorker {
    store: Arc<StateStore>,
    engine: AlarmEngine,
    criteria: Vec<Box<dyn AlarmCriteria>>,
    readings: Arc<BoundedQueue<Reading>>,
    bus: Arc<EventBus>,
    shutdown: Shutdown,
    drain_limit: usize,
}

impl AlarmWorker {
    pub fn new(
        store: Arc<StateStore>,
        engine: AlarmEngine,
        criteria: Vec<Box<dyn AlarmCriteria>>,
        readings: Arc<BoundedQueue<Reading>>,
        bus: Arc<EventBus>,
        shutdown: Shutdown,
        drain_limit: usize,
    ) -> Self {
        Self {
            store,
            engine,
            criteria,
            readings,
            bus,
            shutdown,
            drain_limit,
        }
    }

    /// Process one reading through the full pipeline
    pub fn tick(&self, reading: Reading) {
        self.store.apply_reading(&reading);

        let view = self.store.view();
        let ctx = AlarmContext { now: Utc::now() };

        let mut decisions = Vec::new();
        for criterion in &self.criteria {
            decisions.extend(criterion.evaluate(&view, &ctx));
        }

        let events = self.engine.ingest(decisions, ctx.now);
        for event in &events {
            debug!(
                key = %event.key,
                transition = %event.transition,
                severity = %event.severity,
                "Alarm event: {}",
                event.message
            );
            self.bus.publish(event);
        }
    }

    /// Run until shutdown, then drain a bounded number of readings
    pub async fn run(self) {
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            if let Some(reading) = self.readings.pop_timeout(POLL_TIMEOUT).await {
                self.tick(reading);
            }
        }

        let mut drained = 0;
        while drained < self.drain_limit {
            match self.readings.try_pop() {
                Some(reading) => {
                    self.tick(reading);
                    drained += 1;
                }
                None => break,
            }
        }
        info!("Alarm worker stopped ({} reading(s) drained)", drained);
    }
}
