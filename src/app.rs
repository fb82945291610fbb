//! Pipeline wiring.
//!
//! Builds the store, criteria registry, engine, queues, and bus from a
//! validated [`Config`], spawns the long-lived tasks (TCP receiver, alarm
//! worker, notification worker, API server), and coordinates graceful
//! shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api;
use crate::config::Config;
use crate::criteria::build_criteria;
use crate::domain::Reading;
use crate::engine::AlarmEngine;
use crate::error::Result;
use crate::notify::{NotificationAdapter, NotificationJob, NotificationWorker, WebhookNotifier};
use crate::runtime::{AlarmWorker, BoundedQueue, EventBus, Shutdown};
use crate::store::StateStore;
use crate::transport::TcpReceiver;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(2);

/// A running pipeline
pub struct App {
    /// Shared state, for read-only consumers
    pub store: Arc<StateStore>,
    /// Readings queue (exposed for tests and embedders)
    pub readings: Arc<BoundedQueue<Reading>>,
    /// Event bus, for additional subscribers
    pub bus: Arc<EventBus>,
    shutdown: Shutdown,
    handles: Vec<JoinHandle<()>>,
}

impl App {
    /// Wire and start the pipeline. The configuration must already be
    /// validated.
    pub fn start(config: Config) -> Result<App> {
        let shutdown = Shutdown::new();

        let store = Arc::new(StateStore::new(
            config.sensors.scalar_configs.clone(),
            config.sensors.spectral_configs.clone(),
        ));
        let readings: Arc<BoundedQueue<Reading>> =
            Arc::new(BoundedQueue::new(config.queues.readings_capacity));
        let bus = Arc::new(EventBus::new());

        let mut handles = Vec::new();

        // Notification pipeline: adapter on the bus, worker on the queue.
        if config.notifications.webhook.enabled {
            let notification_queue: Arc<BoundedQueue<NotificationJob>> =
                Arc::new(BoundedQueue::new(config.queues.notifications_capacity));
            NotificationAdapter::attach(&bus, store.clone(), notification_queue.clone());

            let notifier = Arc::new(WebhookNotifier::new(config.notifications.webhook.clone())?);
            let worker = NotificationWorker::new(
                notification_queue,
                notifier,
                config.notifications.webhook.clone(),
                shutdown.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        } else {
            info!("Webhook delivery disabled");
        }

        // Alarm worker: the single consumer of the readings queue.
        let criteria = build_criteria(&config.alarms, &config.sensors);
        info!(
            "Registered {} criteria over {} scalar and {} spectral channel(s)",
            criteria.len(),
            config.sensors.scalar_configs.len(),
            config.sensors.spectral_configs.len()
        );
        let engine = AlarmEngine::new(
            store.clone(),
            config.alarms.value_eps,
            config.alarms.stale_timeout_s,
        );
        let worker = AlarmWorker::new(
            store.clone(),
            engine,
            criteria,
            readings.clone(),
            bus.clone(),
            shutdown.clone(),
            config.queues.shutdown_drain_limit,
        );
        handles.push(tokio::spawn(worker.run()));

        // Transport: reconnecting NDJSON receiver.
        let receiver = TcpReceiver::new(
            config.transport.tcp_client.clone(),
            store.spectral_lengths(),
            readings.clone(),
            shutdown.clone(),
        );
        handles.push(tokio::spawn(receiver.run()));

        // Read-only API.
        if config.api.enabled {
            let api_store = store.clone();
            let api_shutdown = shutdown.clone();
            let api_cfg = config.api.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = api::serve(api_cfg, api_store, api_shutdown).await {
                    warn!("API server exited: {}", e);
                }
            }));
        }

        Ok(App {
            store,
            readings,
            bus,
            shutdown,
            handles,
        })
    }

    /// Handle to the process-wide shutdown flag
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Trigger shutdown and wait for every task, bounded by the graceful
    /// shutdown deadline
    pub async fn stop(self) {
        self.shutdown.trigger();
        for handle in self.handles {
            if tokio::time::timeout(SHUTDOWN_DEADLINE, handle).await.is_err() {
                warn!("Task did not stop within {:?}; abandoning", SHUTDOWN_DEADLINE);
            }
        }
        info!("Pipeline stopped");
    }
}
