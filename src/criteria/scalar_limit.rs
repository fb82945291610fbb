//! Low/high limit rules for scalar sensors.
//!
//! Each configured sensor yields two independent alarm keys, LOW_LIMIT
//! and HIGH_LIMIT. Comparison is strict: a value exactly on a limit is
//! not alarming.

use crate::criteria::{usable, AlarmContext, AlarmCriteria, AlarmDecision};
use crate::domain::{AlarmKey, AlarmSeverity, AlarmType, ScalarSensorConfig, SensorStatus};
use crate::store::StoreView;

pub struct ScalarLimitCriteria {
    configs: Vec<ScalarSensorConfig>,
    severity: AlarmSeverity,
}

impl ScalarLimitCriteria {
    pub fn new(configs: Vec<ScalarSensorConfig>) -> Self {
        Self {
            configs,
            severity: AlarmSeverity::Warning,
        }
    }

    /// Override the default WARNING severity
    pub fn with_severity(mut self, severity: AlarmSeverity) -> Self {
        self.severity = severity;
        self
    }
}

impl AlarmCriteria for ScalarLimitCriteria {
    fn name(&self) -> &str {
        "scalar_limit"
    }

    fn evaluate(&self, view: &StoreView, _ctx: &AlarmContext) -> Vec<AlarmDecision> {
        let mut decisions = Vec::new();

        for cfg in &self.configs {
            let reading = match view.scalar(&cfg.name) {
                Some(r) => r,
                None => continue,
            };
            if reading.status == SensorStatus::Faulty || !usable(reading.value) {
                continue;
            }
            let v = reading.value;

            let low_active = v < cfg.low_limit;
            decisions.push(AlarmDecision {
                key: AlarmKey::new(&cfg.name, AlarmType::LowLimit),
                should_be_active: low_active,
                severity: self.severity,
                message: if low_active {
                    format!("{} LOW: {:.3} < {} {}", cfg.name, v, cfg.low_limit, cfg.units)
                        .trim()
                        .to_string()
                } else {
                    format!("{} back above low limit", cfg.name)
                },
                value: Some(v),
                details: Some("rule=scalar_low_limit".into()),
            });

            let high_active = v > cfg.high_limit;
            decisions.push(AlarmDecision {
                key: AlarmKey::new(&cfg.name, AlarmType::HighLimit),
                should_be_active: high_active,
                severity: self.severity,
                message: if high_active {
                    format!("{} HIGH: {:.3} > {} {}", cfg.name, v, cfg.high_limit, cfg.units)
                        .trim()
                        .to_string()
                } else {
                    format!("{} back below high limit", cfg.name)
                },
                value: Some(v),
                details: Some("rule=scalar_high_limit".into()),
            });
        }

        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScalarReading;
    use chrono::Utc;

    fn view_with(sensor: &str, value: f64) -> StoreView {
        let mut view = StoreView::default();
        view.scalars.insert(
            sensor.to_string(),
            ScalarReading {
                sensor: sensor.to_string(),
                value,
                timestamp: Utc::now(),
                status: SensorStatus::Ok,
                timestamp_synthesized: false,
            },
        );
        view
    }

    fn pressure_criteria() -> ScalarLimitCriteria {
        ScalarLimitCriteria::new(vec![ScalarSensorConfig {
            name: "Pressure".into(),
            units: "bar".into(),
            low_limit: 1.0,
            high_limit: 2.0,
        }])
    }

    fn ctx() -> AlarmContext {
        AlarmContext { now: Utc::now() }
    }

    #[test]
    fn test_in_range_produces_inactive_decisions() {
        let decisions = pressure_criteria().evaluate(&view_with("Pressure", 1.5), &ctx());
        assert_eq!(decisions.len(), 2);
        assert!(decisions.iter().all(|d| !d.should_be_active));
    }

    #[test]
    fn test_high_limit_violation() {
        let decisions = pressure_criteria().evaluate(&view_with("Pressure", 2.3), &ctx());
        let high = decisions
            .iter()
            .find(|d| d.key.alarm_type == AlarmType::HighLimit)
            .unwrap();
        assert!(high.should_be_active);
        assert_eq!(high.value, Some(2.3));
        assert!(high.message.contains("HIGH"));

        let low = decisions
            .iter()
            .find(|d| d.key.alarm_type == AlarmType::LowLimit)
            .unwrap();
        assert!(!low.should_be_active);
    }

    #[test]
    fn test_exact_limit_is_not_alarming() {
        let decisions = pressure_criteria().evaluate(&view_with("Pressure", 2.0), &ctx());
        assert!(decisions.iter().all(|d| !d.should_be_active));

        let decisions = pressure_criteria().evaluate(&view_with("Pressure", 1.0), &ctx());
        assert!(decisions.iter().all(|d| !d.should_be_active));
    }

    #[test]
    fn test_missing_sensor_produces_no_decision() {
        let decisions = pressure_criteria().evaluate(&StoreView::default(), &ctx());
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_non_finite_treated_as_no_reading() {
        let decisions = pressure_criteria().evaluate(&view_with("Pressure", f64::NAN), &ctx());
        assert!(decisions.is_empty());

        let decisions = pressure_criteria().evaluate(&view_with("Pressure", f64::INFINITY), &ctx());
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_faulty_sensor_produces_no_decision() {
        let mut view = view_with("Pressure", 2.5);
        view.scalars.get_mut("Pressure").unwrap().status = SensorStatus::Faulty;
        assert!(pressure_criteria().evaluate(&view, &ctx()).is_empty());
    }
}
