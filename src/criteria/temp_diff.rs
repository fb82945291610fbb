//! Paired-sensor differential rule.
//!
//! Compares the latest readings of two scalar sensors and alarms when
//! the absolute difference exceeds the configured threshold. If either
//! reading is missing, faulty, or non-finite, no decision is emitted.

use crate::criteria::{usable, AlarmContext, AlarmCriteria, AlarmDecision};
use crate::domain::{AlarmKey, AlarmSeverity, AlarmType, SensorStatus};
use crate::store::StoreView;

pub struct TempDiffCriteria {
    pair: [String; 2],
    pair_name: String,
    delta: f64,
    severity: AlarmSeverity,
}

impl TempDiffCriteria {
    pub fn new(pair: [String; 2], delta: f64, severity: AlarmSeverity) -> Self {
        let pair_name = format!("{}|{}", pair[0], pair[1]);
        Self {
            pair,
            pair_name,
            delta,
            severity,
        }
    }
}

impl AlarmCriteria for TempDiffCriteria {
    fn name(&self) -> &str {
        "temp_diff"
    }

    fn evaluate(&self, view: &StoreView, _ctx: &AlarmContext) -> Vec<AlarmDecision> {
        let a = match view.scalar(&self.pair[0]) {
            Some(r) => r,
            None => return Vec::new(),
        };
        let b = match view.scalar(&self.pair[1]) {
            Some(r) => r,
            None => return Vec::new(),
        };
        if a.status == SensorStatus::Faulty || b.status == SensorStatus::Faulty {
            return Vec::new();
        }
        if !usable(a.value) || !usable(b.value) {
            return Vec::new();
        }

        let diff = (a.value - b.value).abs();
        let active = diff > self.delta;

        vec![AlarmDecision {
            key: AlarmKey::new(&self.pair_name, AlarmType::TempDiff),
            should_be_active: active,
            severity: self.severity,
            message: if active {
                format!(
                    "{} diff {:.3} exceeds {:.3}",
                    self.pair_name, diff, self.delta
                )
            } else {
                format!("{} diff back within {:.3}", self.pair_name, self.delta)
            },
            value: Some(diff),
            details: Some("rule=temp_diff".into()),
        }]
    }
}
