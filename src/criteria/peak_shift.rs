//! Spectral peak shift rule.
//!
//! Locates the argmax of the channel's latest spectrum and compares it
//! with the reference argmax; the alarm is active when the displacement
//! exceeds the tolerance (in bin indices). A reference spectrum captured
//! in the store wins over the channel's configured peak index. With no
//! latest spectrum or no reference, the rule emits nothing.

use crate::criteria::{AlarmContext, AlarmCriteria, AlarmDecision};
use crate::domain::{AlarmKey, AlarmSeverity, AlarmType, SensorStatus};
use crate::store::StoreView;

pub struct PeakShiftCriteria {
    channel: String,
    tolerance_bins: usize,
    severity: AlarmSeverity,
    reference_peak_index: Option<usize>,
}

impl PeakShiftCriteria {
    pub fn new(
        channel: String,
        tolerance_bins: usize,
        severity: AlarmSeverity,
        reference_peak_index: Option<usize>,
    ) -> Self {
        Self {
            channel,
            tolerance_bins,
            severity,
            reference_peak_index,
        }
    }
}

/// Index of the largest finite value, or `None` when no bin is finite
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, bv)) if v <= bv => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

impl AlarmCriteria for PeakShiftCriteria {
    fn name(&self) -> &str {
        "peak_shift"
    }

    fn evaluate(&self, view: &StoreView, _ctx: &AlarmContext) -> Vec<AlarmDecision> {
        let reading = match view.spectrum(&self.channel) {
            Some(r) => r,
            None => return Vec::new(),
        };
        if reading.status == SensorStatus::Faulty {
            return Vec::new();
        }

        let latest_peak = match argmax(&reading.values) {
            Some(i) => i,
            None => return Vec::new(),
        };
        let reference_peak = match view
            .reference(&self.channel)
            .and_then(argmax)
            .or(self.reference_peak_index)
        {
            Some(i) => i,
            None => return Vec::new(),
        };

        let shift = latest_peak.abs_diff(reference_peak);
        let active = shift > self.tolerance_bins;

        vec![AlarmDecision {
            key: AlarmKey::new(&self.channel, AlarmType::PeakShift),
            should_be_active: active,
            severity: self.severity,
            message: if active {
                format!(
                    "{} peak at bin {} shifted {} bins from reference {} (tolerance {})",
                    self.channel, latest_peak, shift, reference_peak, self.tolerance_bins
                )
            } else {
                format!("{} peak within tolerance", self.channel)
            },
            value: Some(shift as f64),
            details: Some("rule=peak_shift".into()),
        }]
    }
}
