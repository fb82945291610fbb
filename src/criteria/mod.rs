//! Alarm criteria: stateless rule evaluators.
//!
//! A criterion reads the captured [`StoreView`] and returns zero or more
//! [`AlarmDecision`]s. Criteria are pure: no global mutation, no I/O. The
//! lifecycle state machine lives in [`crate::engine`]; criteria only say
//! what *should* be true right now.
//!
//! When a required sensor has no usable reading (missing, faulty, or a
//! non-finite value), a criterion produces no decision for the affected
//! keys, so the engine neither raises nor clears them.

pub mod peak_shift;
pub mod scalar_limit;
pub mod temp_diff;

use chrono::{DateTime, Utc};

use crate::config::{AlarmsConfig, SensorsConfig};
use crate::domain::{AlarmKey, AlarmSeverity};
use crate::store::StoreView;

pub use peak_shift::PeakShiftCriteria;
pub use scalar_limit::ScalarLimitCriteria;
pub use temp_diff::TempDiffCriteria;

/// Context passed into one evaluation cycle.
///
/// Provides a single source of truth for "now" so every decision in a
/// tick shares a timestamp.
#[derive(Debug, Clone, Copy)]
pub struct AlarmContext {
    /// Evaluation timestamp for the current tick
    pub now: DateTime<Utc>,
}

/// Result of evaluating a single alarm condition.
///
/// `should_be_active` reflects whether the condition is true at this
/// tick; the engine turns sequences of decisions into lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmDecision {
    /// Identity of the alarm this decision is about
    pub key: AlarmKey,
    /// Whether the condition currently holds
    pub should_be_active: bool,
    /// Severity to apply while active
    pub severity: AlarmSeverity,
    /// Human-readable description of the condition
    pub message: String,
    /// Numeric value behind the decision
    pub value: Option<f64>,
    /// Extra context (e.g. which rule produced the decision)
    pub details: Option<String>,
}

/// A stateless alarm rule
pub trait AlarmCriteria: Send + Sync {
    /// Rule name, for logs
    fn name(&self) -> &str;

    /// Evaluate the current state and return decisions
    fn evaluate(&self, view: &StoreView, ctx: &AlarmContext) -> Vec<AlarmDecision>;
}

/// Whether a reading value is usable for rule evaluation.
/// NaN/Inf are treated the same as "no reading".
pub(crate) fn usable(value: f64) -> bool {
    value.is_finite()
}

/// Build the criteria registry in configuration-declared order
pub fn build_criteria(
    alarms: &AlarmsConfig,
    sensors: &SensorsConfig,
) -> Vec<Box<dyn AlarmCriteria>> {
    let mut criteria: Vec<Box<dyn AlarmCriteria>> = Vec::new();

    if alarms.enable_scalar_limits {
        criteria.push(Box::new(ScalarLimitCriteria::new(
            sensors.scalar_configs.clone(),
        )));
    }

    if let Some(td) = &alarms.temp_diff {
        if td.enabled {
            criteria.push(Box::new(TempDiffCriteria::new(
                td.pair.clone(),
                td.delta,
                td.severity,
            )));
        }
    }

    if let Some(ps) = &alarms.ftir_peak_shift {
        if ps.enabled {
            let reference_peak_index = sensors
                .spectral_configs
                .iter()
                .find(|c| c.name == ps.channel)
                .and_then(|c| c.reference_peak_index);
            criteria.push(Box::new(PeakShiftCriteria::new(
                ps.channel.clone(),
                ps.tolerance_bins,
                ps.severity,
                reference_peak_index,
            )));
        }
    }

    criteria
}
