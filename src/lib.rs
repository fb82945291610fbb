//! Real-time alarm processing core for industrial sensor monitoring.
//!
//! The pipeline ingests a stream of sensor readings over a framed TCP
//! transport, evaluates configurable alarm criteria against shared state,
//! maintains the lifecycle of every alarm with hysteresis, and fans
//! lifecycle events out to a webhook notifier. Delivery never stalls
//! ingestion.
//!
//! ## Architecture
//!
//! ```text
//! TCP/NDJSON → TcpReceiver → readings queue → AlarmWorker
//!                                                │
//!                           StateStore ◄─ criteria + AlarmEngine
//!                                │                │
//!                        snapshot()/API       EventBus
//!                                                │
//!                    NotificationAdapter → queue → NotificationWorker → webhook
//! ```
//!
//! Four long-lived tasks (receiver, alarm worker, notification worker,
//! API server) share only the [`store::StateStore`] and the bounded
//! drop-oldest queues; every blocking point is shutdown-aware.

pub mod api;
pub mod app;
pub mod config;
pub mod criteria;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod runtime;
pub mod store;
pub mod transport;

pub use app::App;
pub use config::Config;
pub use error::{MonSrvError, Result};

/// Service name used in logs and the health endpoint
pub const SERVICE_NAME: &str = "monsrv";

/// Service version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
