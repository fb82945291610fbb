//! Webhook delivery.
//!
//! [`WebhookNotifier`] performs the HTTP POST; [`NotificationWorker`]
//! drains the notification queue and applies the retry policy: transport
//! errors and 5xx responses are retryable, 4xx responses are dropped
//! immediately, and retryable failures are re-enqueued at the queue tail
//! after a spawned backoff delay so new dequeues are never blocked.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::WebhookConfig;
use crate::error::{MonSrvError, Result};
use crate::notify::payload::NotificationJob;
use crate::runtime::{BoundedQueue, Shutdown};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 2xx response
    Delivered,
    /// Transport error or 5xx; worth retrying
    Retryable(String),
    /// 4xx; retrying cannot help
    Fatal(String),
}

/// Outbound delivery seam; the worker is generic over it so tests can
/// substitute an in-process notifier
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one payload
    async fn notify(&self, payload: &Value) -> DeliveryOutcome;

    /// Name for logs
    fn name(&self) -> &str;
}

/// HTTP POST notifier
pub struct WebhookNotifier {
    cfg: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(cfg: WebhookConfig) -> Result<Self> {
        if cfg.url.is_empty() {
            return Err(MonSrvError::config("webhook URL is empty"));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs_f64(cfg.connect_timeout_s))
            .timeout(Duration::from_secs_f64(cfg.total_timeout_s))
            .danger_accept_invalid_certs(!cfg.verify_tls)
            .build()
            .map_err(|e| MonSrvError::notification(format!("client build: {}", e)))?;

        Ok(Self { cfg, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &Value) -> DeliveryOutcome {
        let mut request = self.client.post(&self.cfg.url).json(payload);
        if let Some(token) = &self.cfg.bearer_token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return DeliveryOutcome::Retryable(format!("transport: {}", e)),
        };

        let status = response.status();
        if status.is_success() {
            DeliveryOutcome::Delivered
        } else if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            DeliveryOutcome::Fatal(format!("HTTP {}", status))
        } else {
            DeliveryOutcome::Retryable(format!("HTTP {}", status))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Queue-draining delivery worker
pub struct NotificationWorker {
    queue: Arc<BoundedQueue<NotificationJob>>,
    notifier: Arc<dyn Notifier>,
    cfg: WebhookConfig,
    shutdown: Shutdown,
}

impl NotificationWorker {
    pub fn new(
        queue: Arc<BoundedQueue<NotificationJob>>,
        notifier: Arc<dyn Notifier>,
        cfg: WebhookConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            queue,
            notifier,
            cfg,
            shutdown,
        }
    }

    /// Backoff before attempt `attempt + 1`: doubling from the
    /// configured initial delay up to the cap
    fn retry_delay(&self, attempt: u32) -> Duration {
        let backoff = &self.cfg.retry_backoff;
        let ms = backoff
            .init_ms
            .saturating_mul(1u64 << attempt.min(20))
            .min(backoff.cap_ms);
        Duration::from_millis(ms)
    }

    async fn deliver(&self, mut job: NotificationJob) {
        match self.notifier.notify(&job.payload).await {
            DeliveryOutcome::Delivered => {
                debug!("Delivered payload via {}", self.notifier.name());
            }
            DeliveryOutcome::Fatal(reason) => {
                warn!("Dropping payload after non-retryable failure: {}", reason);
            }
            DeliveryOutcome::Retryable(reason) => {
                job.attempt += 1;
                if !self.cfg.retry_failed || job.attempt >= self.cfg.retries {
                    warn!(
                        "Dropping payload after {} attempt(s): {}",
                        job.attempt, reason
                    );
                    return;
                }

                let delay = self.retry_delay(job.attempt - 1);
                debug!(
                    "Delivery failed ({}); requeueing attempt {} in {:?}",
                    reason, job.attempt, delay
                );
                // The requeue waits out the backoff in its own task so the
                // worker can keep draining fresh payloads meanwhile.
                let queue = self.queue.clone();
                let shutdown = self.shutdown.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => { queue.push(job); }
                        _ = shutdown.wait() => {}
                    }
                });
            }
        }
    }

    /// Run until shutdown; delivery is best-effort, so in-flight retries
    /// are abandoned at exit
    pub async fn run(self) {
        while !self.shutdown.is_triggered() {
            if let Some(job) = self.queue.pop_timeout(POLL_TIMEOUT).await {
                self.deliver(job).await;
            }
        }
        info!("Notification worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Notifier that fails a fixed number of times, then succeeds
    struct FlakyNotifier {
        failures_left: Mutex<u32>,
        outcomes: Mutex<Vec<DeliveryOutcome>>,
        failure: DeliveryOutcome,
    }

    impl FlakyNotifier {
        fn new(failures: u32, failure: DeliveryOutcome) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                outcomes: Mutex::new(Vec::new()),
                failure,
            }
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, _payload: &Value) -> DeliveryOutcome {
            let mut left = self.failures_left.lock();
            let outcome = if *left > 0 {
                *left -= 1;
                self.failure.clone()
            } else {
                DeliveryOutcome::Delivered
            };
            self.outcomes.lock().push(outcome.clone());
            outcome
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn test_cfg() -> WebhookConfig {
        WebhookConfig {
            url: "http://127.0.0.1:1/webhook".into(),
            retries: 3,
            retry_backoff: crate::config::BackoffConfig {
                init_ms: 5,
                cap_ms: 20,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retryable_failure_is_requeued_then_delivered() {
        let queue = Arc::new(BoundedQueue::new(8));
        let notifier = Arc::new(FlakyNotifier::new(
            1,
            DeliveryOutcome::Retryable("HTTP 500".into()),
        ));
        let shutdown = Shutdown::new();
        let worker = NotificationWorker::new(
            queue.clone(),
            notifier.clone(),
            test_cfg(),
            shutdown.clone(),
        );

        queue.push(NotificationJob::new(serde_json::json!({"n": 1})));
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.trigger();
        handle.await.unwrap();

        let outcomes = notifier.outcomes.lock();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1], DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_fatal_failure_is_not_retried() {
        let queue = Arc::new(BoundedQueue::new(8));
        let notifier = Arc::new(FlakyNotifier::new(
            5,
            DeliveryOutcome::Fatal("HTTP 400".into()),
        ));
        let shutdown = Shutdown::new();
        let worker = NotificationWorker::new(
            queue.clone(),
            notifier.clone(),
            test_cfg(),
            shutdown.clone(),
        );

        queue.push(NotificationJob::new(serde_json::json!({"n": 1})));
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(notifier.outcomes.lock().len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drops_after_retries_exhausted() {
        let queue = Arc::new(BoundedQueue::new(8));
        // Always failing.
        let notifier = Arc::new(FlakyNotifier::new(
            u32::MAX,
            DeliveryOutcome::Retryable("HTTP 503".into()),
        ));
        let shutdown = Shutdown::new();
        let worker = NotificationWorker::new(
            queue.clone(),
            notifier.clone(),
            test_cfg(),
            shutdown.clone(),
        );

        queue.push(NotificationJob::new(serde_json::json!({"n": 1})));
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.trigger();
        handle.await.unwrap();

        // retries = 3 means three total attempts, then the payload drops.
        assert_eq!(notifier.outcomes.lock().len(), 3);
        assert!(queue.is_empty());
    }
}
