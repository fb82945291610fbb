//! Common error types for the monitoring service.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, MonSrvError>;

/// Unified error type for monsrv components
#[derive(Error, Debug)]
pub enum MonSrvError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network/Communication errors
    #[error("Network error: {0}")]
    Network(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Operation timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),
}

impl MonSrvError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        MonSrvError::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        MonSrvError::Network(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        MonSrvError::Notification(msg.into())
    }
}
