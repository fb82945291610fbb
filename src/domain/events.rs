//! Alarm lifecycle events.
//!
//! An [`AlarmEvent`] captures *what changed* and *when*; it is immutable
//! after construction so it can be logged, queued, or transmitted safely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::types::{AlarmKey, AlarmSeverity};

/// Alarm lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmTransition {
    /// Alarm became active
    Raised,
    /// Alarm remained active but its observable fields changed
    Updated,
    /// Alarm returned to normal
    Cleared,
}

impl fmt::Display for AlarmTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlarmTransition::Raised => "RAISED",
            AlarmTransition::Updated => "UPDATED",
            AlarmTransition::Cleared => "CLEARED",
        };
        f.write_str(s)
    }
}

/// Event emitted when an alarm transitions.
///
/// The timestamp is the evaluation-tick time, not the reading time: an
/// event records when the engine observed the condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// Alarm identity
    pub key: AlarmKey,
    /// Lifecycle transition
    pub transition: AlarmTransition,
    /// Severity at the time of the transition
    pub severity: AlarmSeverity,
    /// When the engine observed the transition
    pub timestamp: DateTime<Utc>,
    /// Human-readable description
    pub message: String,
    /// Numeric value associated with the event
    #[serde(default)]
    pub value: Option<f64>,
    /// Extra context for complex alarms
    #[serde(default)]
    pub details: Option<String>,
}
