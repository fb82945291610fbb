//! Notification delivery tests against an in-process webhook receiver.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::Value;

use monsrv::config::WebhookConfig;
use monsrv::domain::{AlarmEvent, AlarmKey, AlarmSeverity, AlarmTransition, AlarmType};
use monsrv::notify::{NotificationAdapter, NotificationJob, NotificationWorker, WebhookNotifier};
use monsrv::runtime::{BoundedQueue, EventBus, Shutdown};
use monsrv::store::StateStore;

/// What the fake receiver saw, plus a script of status codes to return
/// (empty script = always 200)
#[derive(Default)]
struct ReceiverState {
    bodies: Mutex<Vec<Value>>,
    auth_headers: Mutex<Vec<Option<String>>>,
    status_script: Mutex<VecDeque<u16>>,
}

async fn webhook_handler(
    State(state): State<Arc<ReceiverState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    state.auth_headers.lock().push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    );
    state.bodies.lock().push(body);
    let code = state.status_script.lock().pop_front().unwrap_or(200);
    StatusCode::from_u16(code).unwrap()
}

/// Start the fake receiver; returns its URL and shared state
async fn start_receiver(script: &[u16]) -> (String, Arc<ReceiverState>) {
    let state = Arc::new(ReceiverState::default());
    state.status_script.lock().extend(script.iter().copied());

    let router = Router::new()
        .route("/webhook", post(webhook_handler))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}/webhook", addr), state)
}

fn webhook_config(url: String) -> WebhookConfig {
    WebhookConfig {
        url,
        bearer_token: Some("sesame".into()),
        retries: 3,
        retry_backoff: monsrv::config::BackoffConfig {
            init_ms: 10,
            cap_ms: 50,
        },
        ..Default::default()
    }
}

fn raised_event(message: &str) -> AlarmEvent {
    AlarmEvent {
        key: AlarmKey::new("Pressure", AlarmType::HighLimit),
        transition: AlarmTransition::Raised,
        severity: AlarmSeverity::Warning,
        timestamp: chrono::Utc::now(),
        message: message.into(),
        value: Some(2.3),
        details: None,
    }
}

async fn wait_until(predicate: impl Fn() -> bool, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    predicate()
}

#[tokio::test]
async fn test_event_reaches_webhook_with_totals_and_auth() {
    let (url, receiver) = start_receiver(&[]).await;

    let store = Arc::new(StateStore::new(vec![], vec![]));
    let bus = EventBus::new();
    let queue: Arc<BoundedQueue<NotificationJob>> = Arc::new(BoundedQueue::new(16));
    NotificationAdapter::attach(&bus, store.clone(), queue.clone());

    let cfg = webhook_config(url);
    let notifier = Arc::new(WebhookNotifier::new(cfg.clone()).unwrap());
    let shutdown = Shutdown::new();
    let worker = NotificationWorker::new(queue, notifier, cfg, shutdown.clone());
    let handle = tokio::spawn(worker.run());

    bus.publish(&raised_event("Pressure HIGH: 2.300 > 2.0 bar"));

    assert!(
        wait_until(|| !receiver.bodies.lock().is_empty(), Duration::from_secs(5)).await,
        "webhook never received the payload"
    );

    {
        let bodies = receiver.bodies.lock();
        assert_eq!(bodies[0]["type"], "alarm_event");
        assert_eq!(bodies[0]["event"]["transition"], "RAISED");
        assert_eq!(bodies[0]["event"]["message"], "Pressure HIGH: 2.300 > 2.0 bar");
        assert!(bodies[0]["totals"].is_object());

        let auth = receiver.auth_headers.lock();
        assert_eq!(auth[0].as_deref(), Some("Bearer sesame"));
    }

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_5xx_is_retried_until_success() {
    let (url, receiver) = start_receiver(&[500, 503]).await;

    let queue: Arc<BoundedQueue<NotificationJob>> = Arc::new(BoundedQueue::new(16));
    let cfg = webhook_config(url);
    let notifier = Arc::new(WebhookNotifier::new(cfg.clone()).unwrap());
    let shutdown = Shutdown::new();
    let worker = NotificationWorker::new(queue.clone(), notifier, cfg, shutdown.clone());
    let handle = tokio::spawn(worker.run());

    queue.push(NotificationJob::new(serde_json::json!({"n": 1})));

    assert!(
        wait_until(|| receiver.bodies.lock().len() == 3, Duration::from_secs(5)).await,
        "expected two failures and one successful delivery"
    );

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_4xx_is_dropped_without_retry() {
    let (url, receiver) = start_receiver(&[400]).await;

    let queue: Arc<BoundedQueue<NotificationJob>> = Arc::new(BoundedQueue::new(16));
    let cfg = webhook_config(url);
    let notifier = Arc::new(WebhookNotifier::new(cfg.clone()).unwrap());
    let shutdown = Shutdown::new();
    let worker = NotificationWorker::new(queue.clone(), notifier, cfg, shutdown.clone());
    let handle = tokio::spawn(worker.run());

    queue.push(NotificationJob::new(serde_json::json!({"n": 1})));

    assert!(wait_until(|| receiver.bodies.lock().len() == 1, Duration::from_secs(5)).await);
    // No second attempt arrives.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(receiver.bodies.lock().len(), 1);
    assert!(queue.is_empty());

    shutdown.trigger();
    handle.await.unwrap();
}
