//! Authoritative in-memory state.
//!
//! The [`StateStore`] exclusively owns the sensor-latest maps, the
//! alarm-state table, the counters, and a bounded ring of recent events.
//! Every operation runs under one guard so snapshots are point-in-time
//! consistent, and counter updates happen in the same critical section as
//! the state-table mutation they describe. The guard is only ever held
//! for in-memory work, never across I/O or an `.await`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::domain::{
    AlarmEvent, AlarmKey, AlarmSeverity, AlarmState, AlarmTransition, AlarmType, Reading,
    ScalarReading, ScalarSensorConfig, SpectralChannelConfig, SpectrumReading,
};

const DEFAULT_EVENT_HISTORY: usize = 1000;

/// Alarm-state counts broken down by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: u64,
    pub warning: u64,
    pub critical: u64,
}

impl SeverityCounts {
    fn bump(&mut self, severity: AlarmSeverity) {
        match severity {
            AlarmSeverity::Info => self.info += 1,
            AlarmSeverity::Warning => self.warning += 1,
            AlarmSeverity::Critical => self.critical += 1,
        }
    }
}

/// Event counts broken down by lifecycle transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCounts {
    pub raised: u64,
    pub updated: u64,
    pub cleared: u64,
}

impl TransitionCounts {
    fn bump(&mut self, transition: AlarmTransition) {
        match transition {
            AlarmTransition::Raised => self.raised += 1,
            AlarmTransition::Updated => self.updated += 1,
            AlarmTransition::Cleared => self.cleared += 1,
        }
    }
}

/// Alarm-state counts broken down by alarm type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub low_limit: u64,
    pub high_limit: u64,
    pub temp_diff: u64,
    pub peak_shift: u64,
}

impl TypeCounts {
    fn bump(&mut self, alarm_type: AlarmType) {
        match alarm_type {
            AlarmType::LowLimit => self.low_limit += 1,
            AlarmType::HighLimit => self.high_limit += 1,
            AlarmType::TempDiff => self.temp_diff += 1,
            AlarmType::PeakShift => self.peak_shift += 1,
        }
    }
}

/// Store counters, mutated atomically with the tables they describe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Alarm keys ever seen (active or retained inactive)
    pub alarm_states_total: u64,
    /// Alarm keys currently active
    pub alarm_states_active: u64,
    /// Lifecycle events ever recorded
    pub alarm_events_total: u64,
    pub state_counts_by_severity: SeverityCounts,
    pub state_counts_by_type: TypeCounts,
    pub event_counts_by_transition: TransitionCounts,
    pub event_counts_by_severity: SeverityCounts,
    pub event_counts_by_type: TypeCounts,
}

/// Point-in-time consistent copy of the alarm table and counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was captured
    pub taken_at: DateTime<Utc>,
    /// Every alarm state, active and retained-inactive
    pub alarm_states: Vec<AlarmState>,
    /// Counters captured in the same acquisition
    pub counters: Counters,
    /// Most recent lifecycle events, oldest first
    pub recent_events: Vec<AlarmEvent>,
}

/// Immutable copy of the latest readings, captured at tick start for
/// criteria evaluation so no lock is held while rules run.
#[derive(Debug, Clone, Default)]
pub struct StoreView {
    pub scalars: HashMap<String, ScalarReading>,
    pub spectra: HashMap<String, SpectrumReading>,
    pub references: HashMap<String, Vec<f64>>,
}

impl StoreView {
    /// Latest scalar reading for a sensor
    pub fn scalar(&self, sensor: &str) -> Option<&ScalarReading> {
        self.scalars.get(sensor)
    }

    /// Latest spectrum for a channel
    pub fn spectrum(&self, sensor: &str) -> Option<&SpectrumReading> {
        self.spectra.get(sensor)
    }

    /// Captured reference spectrum for a channel, if any
    pub fn reference(&self, sensor: &str) -> Option<&[f64]> {
        self.references.get(sensor).map(|v| v.as_slice())
    }
}

#[derive(Default)]
struct StoreInner {
    scalars: HashMap<String, ScalarReading>,
    spectra: HashMap<String, SpectrumReading>,
    references: HashMap<String, Vec<f64>>,
    alarms: BTreeMap<AlarmKey, AlarmState>,
    counters: Counters,
    events: VecDeque<AlarmEvent>,
}

impl StoreInner {
    fn recompute_state_counts(&mut self) {
        let mut by_severity = SeverityCounts::default();
        let mut by_type = TypeCounts::default();
        let mut active = 0;
        for state in self.alarms.values() {
            by_severity.bump(state.severity);
            by_type.bump(state.key.alarm_type);
            if state.active {
                active += 1;
            }
        }
        self.counters.alarm_states_total = self.alarms.len() as u64;
        self.counters.alarm_states_active = active;
        self.counters.state_counts_by_severity = by_severity;
        self.counters.state_counts_by_type = by_type;
    }

    fn record_event(&mut self, event: &AlarmEvent, history_cap: usize) {
        self.counters.alarm_events_total += 1;
        self.counters.event_counts_by_transition.bump(event.transition);
        self.counters.event_counts_by_severity.bump(event.severity);
        self.counters.event_counts_by_type.bump(event.key.alarm_type);
        if self.events.len() >= history_cap {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
    }
}

/// Thread-safe shared state for the whole pipeline
pub struct StateStore {
    inner: Mutex<StoreInner>,
    scalar_configs: Vec<ScalarSensorConfig>,
    spectral_configs: Vec<SpectralChannelConfig>,
    event_history_cap: usize,
}

impl StateStore {
    pub fn new(
        scalar_configs: Vec<ScalarSensorConfig>,
        spectral_configs: Vec<SpectralChannelConfig>,
    ) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            scalar_configs,
            spectral_configs,
            event_history_cap: DEFAULT_EVENT_HISTORY,
        }
    }

    /// Registered scalar sensor configurations
    pub fn scalar_configs(&self) -> &[ScalarSensorConfig] {
        &self.scalar_configs
    }

    /// Registered spectral channel configurations
    pub fn spectral_configs(&self) -> &[SpectralChannelConfig] {
        &self.spectral_configs
    }

    /// Declared spectrum length per configured channel
    pub fn spectral_lengths(&self) -> HashMap<String, usize> {
        self.spectral_configs
            .iter()
            .map(|c| (c.name.clone(), c.length))
            .collect()
    }

    // --- Readings ---

    /// Upsert the latest reading for its sensor
    pub fn apply_reading(&self, reading: &Reading) {
        match reading {
            Reading::Scalar(r) => self.upsert_scalar(r.clone()),
            Reading::Spectrum(r) => self.upsert_spectrum(r.clone()),
        }
    }

    pub fn upsert_scalar(&self, reading: ScalarReading) {
        let mut inner = self.inner.lock();
        inner.scalars.insert(reading.sensor.clone(), reading);
    }

    pub fn upsert_spectrum(&self, reading: SpectrumReading) {
        let mut inner = self.inner.lock();
        inner.spectra.insert(reading.sensor.clone(), reading);
    }

    /// Latest scalar value and timestamp for a sensor
    pub fn get_scalar(&self, sensor: &str) -> Option<(f64, DateTime<Utc>)> {
        let inner = self.inner.lock();
        inner.scalars.get(sensor).map(|r| (r.value, r.timestamp))
    }

    /// Latest spectrum and timestamp for a channel
    pub fn get_spectrum(&self, sensor: &str) -> Option<(Vec<f64>, DateTime<Utc>)> {
        let inner = self.inner.lock();
        inner
            .spectra
            .get(sensor)
            .map(|r| (r.values.clone(), r.timestamp))
    }

    /// Capture a reference spectrum for a channel (used by the peak
    /// shift rule in preference to the configured peak index)
    pub fn set_reference_spectrum(&self, sensor: impl Into<String>, values: Vec<f64>) {
        let mut inner = self.inner.lock();
        inner.references.insert(sensor.into(), values);
    }

    /// Copy of the latest readings for lock-free criteria evaluation
    pub fn view(&self) -> StoreView {
        let inner = self.inner.lock();
        StoreView {
            scalars: inner.scalars.clone(),
            spectra: inner.spectra.clone(),
            references: inner.references.clone(),
        }
    }

    // --- Alarm table (engine-facing) ---

    /// Current state for an alarm key
    pub fn alarm_state(&self, key: &AlarmKey) -> Option<AlarmState> {
        self.inner.lock().alarms.get(key).cloned()
    }

    /// All currently active alarm states
    pub fn active_states(&self) -> Vec<AlarmState> {
        let inner = self.inner.lock();
        inner
            .alarms
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect()
    }

    /// Write an alarm state computed by the engine, recording the
    /// transition event (when one was emitted) in the same critical
    /// section. Returns the prior state.
    pub fn upsert_alarm_state(
        &self,
        state: AlarmState,
        event: Option<&AlarmEvent>,
    ) -> Option<AlarmState> {
        let mut inner = self.inner.lock();
        let prior = inner.alarms.insert(state.key.clone(), state);
        if let Some(event) = event {
            inner.record_event(event, self.event_history_cap);
        }
        inner.recompute_state_counts();
        prior
    }

    /// Mark an alarm inactive, retaining it in the table for audit.
    /// Returns the prior state, or `None` when the key is unknown.
    pub fn clear_alarm(
        &self,
        key: &AlarmKey,
        ts: DateTime<Utc>,
        event: &AlarmEvent,
    ) -> Option<AlarmState> {
        let mut inner = self.inner.lock();
        let prior = inner.alarms.get(key).cloned()?;
        if let Some(state) = inner.alarms.get_mut(key) {
            state.active = false;
            state.last_seen = ts;
            state.message = event.message.clone();
            state.last_value = event.value;
        }
        inner.record_event(event, self.event_history_cap);
        inner.recompute_state_counts();
        Some(prior)
    }

    /// Refresh `last_seen` without emitting an event (hysteresis path,
    /// and inactive decisions for already-inactive alarms)
    pub fn touch_alarm(&self, key: &AlarmKey, ts: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.alarms.get_mut(key) {
            state.last_seen = ts;
        }
    }

    // --- Read-only surfaces ---

    /// Point-in-time consistent snapshot of alarm states, counters, and
    /// recent events (single acquisition)
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        Snapshot {
            taken_at: Utc::now(),
            alarm_states: inner.alarms.values().cloned().collect(),
            counters: inner.counters.clone(),
            recent_events: inner.events.iter().cloned().collect(),
        }
    }

    /// Current counters
    pub fn counters(&self) -> Counters {
        self.inner.lock().counters.clone()
    }

    /// Empty the recent-event ring. States and counters are untouched.
    pub fn clear_alarm_history(&self) {
        self.inner.lock().events.clear();
    }
}
