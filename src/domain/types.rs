use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational status of a sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorStatus {
    /// The sensor is operating normally
    #[default]
    Ok,
    /// The sensor reported a fault; readings are not trustworthy
    Faulty,
}

/// Category identifying the kind of rule violation behind an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmType {
    /// Scalar reading fell below the configured low limit
    LowLimit,
    /// Scalar reading rose above the configured high limit
    HighLimit,
    /// Differential between two paired sensors exceeded the threshold
    TempDiff,
    /// Spectral peak moved too far from the reference position
    PeakShift,
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlarmType::LowLimit => "LOW_LIMIT",
            AlarmType::HighLimit => "HIGH_LIMIT",
            AlarmType::TempDiff => "TEMP_DIFF",
            AlarmType::PeakShift => "PEAK_SHIFT",
        };
        f.write_str(s)
    }
}

/// Severity level for alarms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmSeverity {
    /// Informational condition
    Info,
    /// Abnormal condition requiring attention
    Warning,
    /// Severe condition requiring immediate intervention
    Critical,
}

impl fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlarmSeverity::Info => "INFO",
            AlarmSeverity::Warning => "WARNING",
            AlarmSeverity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Configuration for a scalar sensor channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarSensorConfig {
    /// Name of the sensor channel (e.g., "Pressure")
    pub name: String,
    /// Measurement units (e.g., "bar")
    #[serde(default)]
    pub units: String,
    /// Lower operating limit
    pub low_limit: f64,
    /// Upper operating limit
    pub high_limit: f64,
}

/// Configuration for a spectral (FTIR) channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralChannelConfig {
    /// Name of the spectral channel
    pub name: String,
    /// Declared spectrum length; incoming spectra must match
    pub length: usize,
    /// Expected peak position (bin index) used when no reference
    /// spectrum has been captured for this channel
    #[serde(default)]
    pub reference_peak_index: Option<usize>,
}

/// Scalar sensor reading (temperature, pressure, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarReading {
    /// Name of the sensor channel
    pub sensor: String,
    /// Measured value
    pub value: f64,
    /// Capture timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Operational status of the reading
    #[serde(default)]
    pub status: SensorStatus,
    /// True when the decoder stamped the record because the wire
    /// timestamp was absent or unparseable
    #[serde(default)]
    pub timestamp_synthesized: bool,
}

/// Fixed-length spectral reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumReading {
    /// Name of the spectral channel
    pub sensor: String,
    /// Spectrum vector (length fixed per channel)
    pub values: Vec<f64>,
    /// Capture timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Operational status of the reading
    #[serde(default)]
    pub status: SensorStatus,
    /// True when the decoder stamped the record itself
    #[serde(default)]
    pub timestamp_synthesized: bool,
}

/// A decoded sensor measurement, scalar or spectral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reading {
    /// Single-valued measurement
    Scalar(ScalarReading),
    /// Spectrum vector measurement
    Spectrum(SpectrumReading),
}

impl Reading {
    /// Sensor channel name of this reading
    pub fn sensor(&self) -> &str {
        match self {
            Reading::Scalar(r) => &r.sensor,
            Reading::Spectrum(r) => &r.sensor,
        }
    }

    /// Capture timestamp of this reading
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Reading::Scalar(r) => r.timestamp,
            Reading::Spectrum(r) => r.timestamp,
        }
    }
}

/// Unique identifier of one alarm across time.
///
/// Two alarms from the same source with different types are distinct,
/// e.g. `("Pressure", LOW_LIMIT)` vs `("Pressure", HIGH_LIMIT)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlarmKey {
    /// Sensor/subsystem that produced the alarm
    pub source: String,
    /// Category of the alarm condition
    pub alarm_type: AlarmType,
}

impl AlarmKey {
    pub fn new(source: impl Into<String>, alarm_type: AlarmType) -> Self {
        Self {
            source: source.into(),
            alarm_type,
        }
    }
}

impl fmt::Display for AlarmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.alarm_type)
    }
}

/// Current state of one alarm.
///
/// `AlarmState` represents what is true now (active/inactive), while
/// [`crate::domain::AlarmEvent`] represents what happened. Cleared
/// states are retained with `active = false` until the next raise so
/// the table doubles as an audit surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmState {
    /// Alarm identity
    pub key: AlarmKey,
    /// Severity at the most recent evaluation
    pub severity: AlarmSeverity,
    /// Whether the alarm is currently active
    pub active: bool,
    /// When the alarm was last raised
    pub first_seen: DateTime<Utc>,
    /// Most recent evaluation touching this alarm
    pub last_seen: DateTime<Utc>,
    /// Latest human-readable message
    pub message: String,
    /// Latest numeric value associated with the alarm
    #[serde(default)]
    pub last_value: Option<f64>,
    /// Extra context (e.g. which rule produced the alarm)
    #[serde(default)]
    pub details: Option<String>,
}
