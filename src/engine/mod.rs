//! Alarm lifecycle engine.
//!
//! Turns stateless [`AlarmDecision`]s into persistent [`AlarmState`]s and
//! discrete [`AlarmEvent`]s (RAISED / UPDATED / CLEARED). The engine is
//! the sole writer of alarm-state transitions; rule logic lives in the
//! criteria, storage in the store.
//!
//! A key that produced an active decision in the past but is absent from
//! the current batch is *not* cleared: auto-clear requires an explicit
//! inactive decision or the optional staleness timeout.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::criteria::AlarmDecision;
use crate::domain::{AlarmEvent, AlarmState, AlarmTransition};
use crate::store::StateStore;

/// Compare two optional values with a tolerance; used to avoid noisy
/// UPDATED events when a value fluctuates within `eps`.
fn value_changed(a: Option<f64>, b: Option<f64>, eps: f64) -> bool {
    match (a, b) {
        (None, None) => false,
        (Some(a), Some(b)) => (a - b).abs() > eps,
        _ => true,
    }
}

/// Stateful alarm lifecycle manager
pub struct AlarmEngine {
    store: Arc<StateStore>,
    value_eps: f64,
    stale_timeout: Option<Duration>,
}

impl AlarmEngine {
    pub fn new(store: Arc<StateStore>, value_eps: f64, stale_timeout_s: Option<f64>) -> Self {
        Self {
            store,
            value_eps,
            stale_timeout: stale_timeout_s.map(|s| Duration::milliseconds((s * 1000.0) as i64)),
        }
    }

    /// Apply one batch of decisions and return the emitted events, in
    /// decision-input order (staleness clears, if any, come last).
    pub fn ingest(&self, decisions: Vec<AlarmDecision>, now: DateTime<Utc>) -> Vec<AlarmEvent> {
        let mut events = Vec::new();

        for d in decisions {
            let prior = self.store.alarm_state(&d.key);
            match (prior, d.should_be_active) {
                // Never seen and not alarming: nothing to create.
                (None, false) => {}

                // Inactive (or unknown) going active: RAISED, first_seen resets.
                (None, true) => self.raise(d, now, &mut events),
                (Some(p), true) if !p.active => self.raise(d, now, &mut events),

                // Active staying active: UPDATED only beyond tolerance.
                (Some(p), true) => {
                    // Messages embed the formatted value, so they are only
                    // compared when neither side carries one; otherwise a
                    // sub-eps fluctuation would still fire UPDATED.
                    let changed = d.severity != p.severity
                        || d.details != p.details
                        || value_changed(p.last_value, d.value, self.value_eps)
                        || (p.last_value.is_none() && d.value.is_none() && d.message != p.message);

                    if changed {
                        let event = AlarmEvent {
                            key: d.key.clone(),
                            transition: AlarmTransition::Updated,
                            severity: d.severity,
                            timestamp: now,
                            message: d.message.clone(),
                            value: d.value,
                            details: d.details.clone(),
                        };
                        let state = AlarmState {
                            key: d.key,
                            severity: d.severity,
                            active: true,
                            first_seen: p.first_seen,
                            last_seen: now,
                            message: d.message,
                            last_value: d.value,
                            details: d.details,
                        };
                        self.store.upsert_alarm_state(state, Some(&event));
                        events.push(event);
                    } else {
                        self.store.touch_alarm(&d.key, now);
                    }
                }

                // Active going inactive: CLEARED, key retained.
                (Some(p), false) if p.active => {
                    let event = AlarmEvent {
                        key: d.key.clone(),
                        transition: AlarmTransition::Cleared,
                        severity: p.severity,
                        timestamp: now,
                        message: d.message,
                        value: d.value,
                        details: d.details,
                    };
                    self.store.clear_alarm(&d.key, now, &event);
                    events.push(event);
                }

                // Inactive staying inactive: refresh only.
                (Some(_), false) => self.store.touch_alarm(&d.key, now),
            }
        }

        if let Some(timeout) = self.stale_timeout {
            self.sweep_stale(now, timeout, &mut events);
        }

        if !events.is_empty() {
            debug!("Engine emitted {} event(s)", events.len());
        }
        events
    }

    fn raise(&self, d: AlarmDecision, now: DateTime<Utc>, events: &mut Vec<AlarmEvent>) {
        let event = AlarmEvent {
            key: d.key.clone(),
            transition: AlarmTransition::Raised,
            severity: d.severity,
            timestamp: now,
            message: d.message.clone(),
            value: d.value,
            details: d.details.clone(),
        };
        let state = AlarmState {
            key: d.key,
            severity: d.severity,
            active: true,
            first_seen: now,
            last_seen: now,
            message: d.message,
            last_value: d.value,
            details: d.details,
        };
        self.store.upsert_alarm_state(state, Some(&event));
        events.push(event);
    }

    /// Clear active alarms whose last evaluation is older than the
    /// staleness timeout (e.g. the backing sensor went silent).
    fn sweep_stale(&self, now: DateTime<Utc>, timeout: Duration, events: &mut Vec<AlarmEvent>) {
        for state in self.store.active_states() {
            if now - state.last_seen > timeout {
                let event = AlarmEvent {
                    key: state.key.clone(),
                    transition: AlarmTransition::Cleared,
                    severity: state.severity,
                    timestamp: now,
                    message: format!(
                        "{} cleared: no evaluation for {}s",
                        state.key,
                        (now - state.last_seen).num_seconds()
                    ),
                    value: state.last_value,
                    details: Some("rule=stale_timeout".into()),
                };
                self.store.clear_alarm(&state.key, now, &event);
                events.push(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlarmKey, AlarmSeverity, AlarmType};

    fn decision(key: &AlarmKey, active: bool, value: f64) -> AlarmDecision {
        AlarmDecision {
            key: key.clone(),
            should_be_active: active,
            severity: AlarmSeverity::Warning,
            message: format!("Pressure at {:.3}", value),
            value: Some(value),
            details: Some("rule=scalar_high_limit".into()),
        }
    }

    fn engine(eps: f64) -> (AlarmEngine, Arc<StateStore>) {
        let store = Arc::new(StateStore::new(vec![], vec![]));
        (AlarmEngine::new(store.clone(), eps, None), store)
    }

    #[test]
    fn test_raise_update_clear_with_zero_eps() {
        let (engine, store) = engine(0.0);
        let key = AlarmKey::new("Pressure", AlarmType::HighLimit);
        let now = Utc::now();

        // 1.5: in range, never raised, no event.
        let events = engine.ingest(vec![decision(&key, false, 1.5)], now);
        assert!(events.is_empty());
        assert!(store.alarm_state(&key).is_none());

        // 2.3: RAISED.
        let events = engine.ingest(vec![decision(&key, true, 2.3)], now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, AlarmTransition::Raised);

        // 2.4: UPDATED (eps = 0).
        let events = engine.ingest(vec![decision(&key, true, 2.4)], now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, AlarmTransition::Updated);
        assert_eq!(events[0].value, Some(2.4));

        // 1.8: CLEARED; key retained inactive.
        let events = engine.ingest(vec![decision(&key, false, 1.8)], now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, AlarmTransition::Cleared);
        let state = store.alarm_state(&key).unwrap();
        assert!(!state.active);
    }

    #[test]
    fn test_eps_suppresses_updates() {
        let (engine, _store) = engine(0.2);
        let key = AlarmKey::new("Pressure", AlarmType::HighLimit);
        let now = Utc::now();

        let events = engine.ingest(vec![decision(&key, true, 2.3)], now);
        assert_eq!(events[0].transition, AlarmTransition::Raised);

        // 2.4 differs by 0.1 < eps: no event.
        let events = engine.ingest(vec![decision(&key, true, 2.4)], now);
        assert!(events.is_empty());

        let events = engine.ingest(vec![decision(&key, false, 1.8)], now);
        assert_eq!(events[0].transition, AlarmTransition::Cleared);
    }

    #[test]
    fn test_hysteresis_anchors_on_raise_value() {
        let (engine, _store) = engine(0.1);
        let key = AlarmKey::new("Pressure", AlarmType::HighLimit);
        let now = Utc::now();

        let events = engine.ingest(vec![decision(&key, true, 2.3)], now);
        assert_eq!(events.len(), 1);

        // All fluctuations stay within eps of the raise value 2.3.
        for v in [2.31, 2.29, 2.32] {
            let events = engine.ingest(vec![decision(&key, true, v)], now);
            assert!(events.is_empty(), "unexpected event for value {}", v);
        }
    }

    #[test]
    fn test_severity_change_alone_fires_updated() {
        let (engine, _store) = engine(0.5);
        let key = AlarmKey::new("Pressure", AlarmType::HighLimit);
        let now = Utc::now();

        engine.ingest(vec![decision(&key, true, 2.3)], now);

        let mut escalated = decision(&key, true, 2.3);
        escalated.severity = AlarmSeverity::Critical;
        let events = engine.ingest(vec![escalated], now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, AlarmTransition::Updated);
        assert_eq!(events[0].severity, AlarmSeverity::Critical);
    }

    #[test]
    fn test_inactive_decision_without_state_is_silent() {
        let (engine, store) = engine(0.0);
        let key = AlarmKey::new("Pressure", AlarmType::LowLimit);
        let events = engine.ingest(vec![decision(&key, false, 1.5)], Utc::now());
        assert!(events.is_empty());
        assert_eq!(store.counters().alarm_events_total, 0);
    }

    #[test]
    fn test_reraise_resets_first_seen() {
        let (engine, store) = engine(0.0);
        let key = AlarmKey::new("Pressure", AlarmType::HighLimit);
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let t2 = t0 + Duration::seconds(20);

        engine.ingest(vec![decision(&key, true, 2.3)], t0);
        engine.ingest(vec![decision(&key, false, 1.5)], t1);
        engine.ingest(vec![decision(&key, true, 2.5)], t2);

        let state = store.alarm_state(&key).unwrap();
        assert!(state.active);
        assert_eq!(state.first_seen, t2);
    }

    #[test]
    fn test_missing_decision_does_not_clear() {
        let (engine, store) = engine(0.0);
        let key = AlarmKey::new("Pressure", AlarmType::HighLimit);
        let now = Utc::now();

        engine.ingest(vec![decision(&key, true, 2.3)], now);
        // Next tick has no decision for the key at all.
        let events = engine.ingest(vec![], now);
        assert!(events.is_empty());
        assert!(store.alarm_state(&key).unwrap().active);
    }

    #[test]
    fn test_stale_timeout_clears() {
        let store = Arc::new(StateStore::new(vec![], vec![]));
        let engine = AlarmEngine::new(store.clone(), 0.0, Some(30.0));
        let key = AlarmKey::new("Pressure", AlarmType::HighLimit);
        let t0 = Utc::now();

        engine.ingest(vec![decision(&key, true, 2.3)], t0);

        // Within the timeout: still active.
        let events = engine.ingest(vec![], t0 + Duration::seconds(10));
        assert!(events.is_empty());

        // Past the timeout: auto-cleared with a real event.
        let events = engine.ingest(vec![], t0 + Duration::seconds(45));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, AlarmTransition::Cleared);
        assert!(!store.alarm_state(&key).unwrap().active);
    }

    #[test]
    fn test_events_in_decision_order() {
        let (engine, _store) = engine(0.0);
        let k1 = AlarmKey::new("A", AlarmType::HighLimit);
        let k2 = AlarmKey::new("B", AlarmType::LowLimit);
        let now = Utc::now();

        let events = engine.ingest(
            vec![decision(&k1, true, 9.0), decision(&k2, true, -1.0)],
            now,
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, k1);
        assert_eq!(events[1].key, k2);
    }
}
