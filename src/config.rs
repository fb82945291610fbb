//! Service configuration.
//!
//! Configuration is loaded from a YAML file (first match among a fixed set of
//! candidate paths, or an explicit path via `MONSRV_CONFIG`), then selected
//! fields may be overridden through `MONSRV_*` environment variables.
//! Validation failures are fatal at startup; after that the configuration is
//! immutable for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::{AlarmSeverity, ScalarSensorConfig, SpectralChannelConfig};
use crate::error::{MonSrvError, Result};

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Inbound transport (reading source)
    #[serde(default)]
    pub transport: TransportConfig,
    /// Known sensor channels
    #[serde(default)]
    pub sensors: SensorsConfig,
    /// Alarm rule configuration
    #[serde(default)]
    pub alarms: AlarmsConfig,
    /// Outbound notification configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Internal queue sizing
    #[serde(default)]
    pub queues: QueuesConfig,
    /// Read-only HTTP API
    #[serde(default)]
    pub api: ApiConfig,
}

/// Inbound transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    /// TCP client for the NDJSON reading stream
    #[serde(default)]
    pub tcp_client: TcpClientConfig,
}

/// TCP client configuration for the NDJSON stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpClientConfig {
    /// Remote host of the reading source
    #[serde(default = "default_host")]
    pub host: String,
    /// Remote TCP port
    #[serde(default = "default_source_port")]
    pub port: u16,
    /// Connect and read timeout in seconds
    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,
    /// Frames longer than this are discarded up to the next newline
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Reconnect backoff policy
    #[serde(default)]
    pub reconnect_backoff: BackoffConfig,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_source_port(),
            timeout_s: default_timeout_s(),
            max_line_bytes: default_max_line_bytes(),
            reconnect_backoff: BackoffConfig::default(),
        }
    }
}

impl TcpClientConfig {
    /// Connect/read timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_s)
    }
}

/// Exponential backoff bounds (doubling, ±20% jitter)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay in milliseconds
    #[serde(default = "default_backoff_init_ms")]
    pub init_ms: u64,
    /// Delay cap in milliseconds
    #[serde(default = "default_backoff_cap_ms")]
    pub cap_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            init_ms: default_backoff_init_ms(),
            cap_ms: default_backoff_cap_ms(),
        }
    }
}

/// Sensor channel declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Scalar channels with operating limits
    #[serde(default)]
    pub scalar_configs: Vec<ScalarSensorConfig>,
    /// Spectral channels with declared lengths
    #[serde(default)]
    pub spectral_configs: Vec<SpectralChannelConfig>,
}

/// Alarm rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmsConfig {
    /// Minimum numeric change required to emit an UPDATED event
    #[serde(default = "default_value_eps")]
    pub value_eps: f64,
    /// Enable per-sensor low/high limit rules
    #[serde(default = "default_true")]
    pub enable_scalar_limits: bool,
    /// Paired-sensor differential rule
    #[serde(default)]
    pub temp_diff: Option<TempDiffConfig>,
    /// Spectral peak shift rule
    #[serde(default)]
    pub ftir_peak_shift: Option<PeakShiftConfig>,
    /// Auto-clear active alarms not re-evaluated for this many seconds.
    /// Disabled when absent.
    #[serde(default)]
    pub stale_timeout_s: Option<f64>,
}

impl Default for AlarmsConfig {
    fn default() -> Self {
        Self {
            value_eps: default_value_eps(),
            enable_scalar_limits: true,
            temp_diff: None,
            ftir_peak_shift: None,
            stale_timeout_s: None,
        }
    }
}

/// Paired-sensor differential rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempDiffConfig {
    /// Whether the rule is evaluated
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// The two scalar sensor names to compare
    pub pair: [String; 2],
    /// Maximum allowed absolute difference
    pub delta: f64,
    /// Severity of the resulting alarm
    #[serde(default = "default_severity")]
    pub severity: AlarmSeverity,
}

/// Spectral peak shift rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakShiftConfig {
    /// Whether the rule is evaluated
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Spectral channel name to monitor
    pub channel: String,
    /// Maximum allowed argmax displacement, in bin indices
    pub tolerance_bins: usize,
    /// Severity of the resulting alarm
    #[serde(default = "default_severity")]
    pub severity: AlarmSeverity,
}

/// Outbound notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Webhook delivery target
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Webhook delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Whether delivery is active
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Target URL for POSTs
    #[serde(default)]
    pub url: String,
    /// Optional bearer token for the Authorization header
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Verify TLS certificates
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_s")]
    pub connect_timeout_s: f64,
    /// Total request timeout in seconds
    #[serde(default = "default_total_timeout_s")]
    pub total_timeout_s: f64,
    /// Delivery attempts before a payload is dropped
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Requeue retryable failures to the queue tail; when false, a
    /// failed payload is dropped on first failure
    #[serde(default = "default_true")]
    pub retry_failed: bool,
    /// Backoff between attempts, doubling up to the cap
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: BackoffConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            bearer_token: None,
            verify_tls: true,
            connect_timeout_s: default_connect_timeout_s(),
            total_timeout_s: default_total_timeout_s(),
            retries: default_retries(),
            retry_failed: true,
            retry_backoff: default_retry_backoff(),
        }
    }
}

/// Internal queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuesConfig {
    /// Capacity of the decoded readings queue
    #[serde(default = "default_readings_capacity")]
    pub readings_capacity: usize,
    /// Capacity of the notification payload queue
    #[serde(default = "default_notifications_capacity")]
    pub notifications_capacity: usize,
    /// Readings processed after a shutdown signal before the worker exits
    #[serde(default = "default_drain_limit")]
    pub shutdown_drain_limit: usize,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            readings_capacity: default_readings_capacity(),
            notifications_capacity: default_notifications_capacity(),
            shutdown_drain_limit: default_drain_limit(),
        }
    }
}

/// Read-only HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Whether the API server is started
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_source_port() -> u16 {
    9000
}

fn default_timeout_s() -> f64 {
    5.0
}

fn default_max_line_bytes() -> usize {
    1024 * 1024
}

fn default_backoff_init_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_value_eps() -> f64 {
    0.0
}

fn default_severity() -> AlarmSeverity {
    AlarmSeverity::Warning
}

fn default_connect_timeout_s() -> f64 {
    5.0
}

fn default_total_timeout_s() -> f64 {
    10.0
}

fn default_retries() -> u32 {
    3
}

fn default_retry_backoff() -> BackoffConfig {
    BackoffConfig {
        init_ms: 1_000,
        cap_ms: 30_000,
    }
}

fn default_readings_capacity() -> usize {
    1024
}

fn default_notifications_capacity() -> usize {
    512
}

fn default_drain_limit() -> usize {
    64
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8087
}

impl Config {
    /// Load configuration from the first existing candidate path, then
    /// apply environment overrides and validate.
    pub fn load() -> Result<Self> {
        let candidates = [
            std::env::var("MONSRV_CONFIG").unwrap_or_default(),
            "config/monsrv.yaml".to_string(),
            "monsrv.yaml".to_string(),
        ];

        let mut config = Config::default();
        for path in candidates.iter().filter(|p| !p.is_empty()) {
            if Path::new(path).exists() {
                info!("Loading configuration from {}", path);
                config = Self::from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw)
            .map_err(|e| MonSrvError::config(format!("failed to parse {}: {}", path, e)))
    }

    /// Apply `MONSRV_*` environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MONSRV_SOURCE_HOST") {
            self.transport.tcp_client.host = host;
        }
        if let Ok(port) = std::env::var("MONSRV_SOURCE_PORT") {
            if let Ok(port) = port.parse() {
                self.transport.tcp_client.port = port;
            }
        }
        if let Ok(url) = std::env::var("MONSRV_WEBHOOK_URL") {
            self.notifications.webhook.url = url;
        }
        if let Ok(token) = std::env::var("MONSRV_WEBHOOK_TOKEN") {
            self.notifications.webhook.bearer_token = Some(token);
        }
    }

    /// Validate the configuration. Failures here are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        let tcp = &self.transport.tcp_client;
        if tcp.host.is_empty() {
            return Err(MonSrvError::config("transport.tcp_client.host is empty"));
        }
        if tcp.port == 0 {
            return Err(MonSrvError::config("transport.tcp_client.port is zero"));
        }
        if tcp.timeout_s <= 0.0 {
            return Err(MonSrvError::config(
                "transport.tcp_client.timeout_s must be positive",
            ));
        }
        if tcp.max_line_bytes == 0 {
            return Err(MonSrvError::config(
                "transport.tcp_client.max_line_bytes must be positive",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for cfg in &self.sensors.scalar_configs {
            if cfg.name.is_empty() {
                return Err(MonSrvError::config("scalar sensor with empty name"));
            }
            if !seen.insert(&cfg.name) {
                return Err(MonSrvError::config(format!(
                    "duplicate scalar sensor: {}",
                    cfg.name
                )));
            }
            if cfg.low_limit >= cfg.high_limit {
                return Err(MonSrvError::config(format!(
                    "sensor {}: low_limit {} must be below high_limit {}",
                    cfg.name, cfg.low_limit, cfg.high_limit
                )));
            }
        }
        for cfg in &self.sensors.spectral_configs {
            if cfg.name.is_empty() {
                return Err(MonSrvError::config("spectral channel with empty name"));
            }
            if cfg.length == 0 {
                return Err(MonSrvError::config(format!(
                    "spectral channel {}: length must be positive",
                    cfg.name
                )));
            }
            if let Some(idx) = cfg.reference_peak_index {
                if idx >= cfg.length {
                    return Err(MonSrvError::config(format!(
                        "spectral channel {}: reference_peak_index {} out of range",
                        cfg.name, idx
                    )));
                }
            }
        }

        if self.alarms.value_eps < 0.0 {
            return Err(MonSrvError::config("alarms.value_eps must be non-negative"));
        }
        if let Some(td) = &self.alarms.temp_diff {
            if td.enabled && td.delta <= 0.0 {
                return Err(MonSrvError::config("alarms.temp_diff.delta must be positive"));
            }
        }
        if let Some(ps) = &self.alarms.ftir_peak_shift {
            if ps.enabled && ps.channel.is_empty() {
                return Err(MonSrvError::config("alarms.ftir_peak_shift.channel is empty"));
            }
        }

        let wh = &self.notifications.webhook;
        if wh.enabled && wh.url.is_empty() {
            return Err(MonSrvError::config(
                "notifications.webhook.url is empty (set enabled: false to disable delivery)",
            ));
        }

        if self.queues.readings_capacity == 0 || self.queues.notifications_capacity == 0 {
            return Err(MonSrvError::config("queue capacities must be positive"));
        }

        Ok(())
    }

    /// Render the default configuration as YAML (for `--print-config`)
    pub fn generate_default_config() -> String {
        serde_yaml::to_string(&Config::default())
            .unwrap_or_else(|_| "# Failed to generate config".to_string())
    }
}
