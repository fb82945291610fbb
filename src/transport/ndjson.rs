//! NDJSON record decoding.
//!
//! Each wire frame is one JSON object. A `type` field selects the shape:
//! `"sensor_reading"` for scalars, `"ftir_spectrum"` for spectra. Unknown
//! types and schema violations are reported as distinct error kinds so the
//! receiver can count them separately; none of them are fatal to the stream.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::{Reading, ScalarReading, SensorStatus, SpectrumReading};

/// Reason a frame could not be decoded
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Not valid JSON
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Valid JSON but an unrecognized `type` value
    #[error("unknown record type: {0}")]
    UnknownType(String),

    /// Valid JSON of a known type with an invalid shape
    #[error("schema violation: {0}")]
    Schema(String),
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sensor: String,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    values: Option<Vec<f64>>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    status: Option<SensorStatus>,
}

/// Parse an ISO-8601 timestamp, accepting both offset-qualified and
/// naive forms (naive is taken as UTC).
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = s.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    None
}

/// Render a [`Reading`] as one NDJSON wire line (no trailing newline).
///
/// The inverse of [`decode_line`] modulo timestamp normalization; used
/// by tests and embedded producers.
pub fn encode_reading(reading: &Reading) -> String {
    match reading {
        Reading::Scalar(r) => serde_json::json!({
            "type": "sensor_reading",
            "sensor": r.sensor,
            "value": r.value,
            "timestamp": r.timestamp.to_rfc3339(),
            "status": r.status,
        })
        .to_string(),
        Reading::Spectrum(r) => serde_json::json!({
            "type": "ftir_spectrum",
            "sensor": r.sensor,
            "values": r.values,
            "timestamp": r.timestamp.to_rfc3339(),
            "status": r.status,
        })
        .to_string(),
    }
}

/// Decode one NDJSON line into a [`Reading`].
///
/// `spectral_lengths` maps configured spectral channel names to their
/// declared lengths; spectra for configured channels must match. Missing
/// or unparseable timestamps are replaced with `now` and flagged.
pub fn decode_line(
    line: &str,
    spectral_lengths: &HashMap<String, usize>,
    now: DateTime<Utc>,
) -> Result<Reading, DecodeError> {
    let record: WireRecord = serde_json::from_str(line)?;

    if record.sensor.is_empty() {
        return Err(DecodeError::Schema("missing or empty sensor name".into()));
    }

    let (timestamp, synthesized) = match record.timestamp.as_deref().and_then(parse_timestamp) {
        Some(ts) => (ts, false),
        None => (now, true),
    };
    let status = record.status.unwrap_or_default();

    match record.kind.as_str() {
        "sensor_reading" => {
            let value = record
                .value
                .ok_or_else(|| DecodeError::Schema("sensor_reading without value".into()))?;
            Ok(Reading::Scalar(ScalarReading {
                sensor: record.sensor,
                value,
                timestamp,
                status,
                timestamp_synthesized: synthesized,
            }))
        }
        "ftir_spectrum" => {
            let values = record
                .values
                .ok_or_else(|| DecodeError::Schema("ftir_spectrum without values".into()))?;
            if values.is_empty() {
                return Err(DecodeError::Schema("ftir_spectrum with empty values".into()));
            }
            if let Some(&expected) = spectral_lengths.get(&record.sensor) {
                if values.len() != expected {
                    return Err(DecodeError::Schema(format!(
                        "spectrum length {} for {} does not match declared length {}",
                        values.len(),
                        record.sensor,
                        expected
                    )));
                }
            }
            Ok(Reading::Spectrum(SpectrumReading {
                sensor: record.sensor,
                values,
                timestamp,
                status,
                timestamp_synthesized: synthesized,
            }))
        }
        other => Err(DecodeError::UnknownType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_spectra() -> HashMap<String, usize> {
        HashMap::new()
    }

    #[test]
    fn test_decode_scalar() {
        let line = r#"{"type":"sensor_reading","sensor":"Pressure","value":1.5,"timestamp":"2026-01-01T10:00:00Z"}"#;
        let reading = decode_line(line, &no_spectra(), Utc::now()).unwrap();
        match reading {
            Reading::Scalar(r) => {
                assert_eq!(r.sensor, "Pressure");
                assert_eq!(r.value, 1.5);
                assert!(!r.timestamp_synthesized);
            }
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn test_decode_naive_timestamp() {
        let line = r#"{"type":"sensor_reading","sensor":"Pressure","value":1.5,"timestamp":"2026-01-01T10:00:00"}"#;
        let reading = decode_line(line, &no_spectra(), Utc::now()).unwrap();
        assert!(!matches!(reading, Reading::Scalar(ref r) if r.timestamp_synthesized));
    }

    #[test]
    fn test_missing_timestamp_is_synthesized() {
        let now = Utc::now();
        let line = r#"{"type":"sensor_reading","sensor":"Pressure","value":1.5}"#;
        match decode_line(line, &no_spectra(), now).unwrap() {
            Reading::Scalar(r) => {
                assert!(r.timestamp_synthesized);
                assert_eq!(r.timestamp, now);
            }
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn test_unknown_type() {
        let line = r#"{"type":"heartbeat","sensor":"x"}"#;
        assert!(matches!(
            decode_line(line, &no_spectra(), Utc::now()),
            Err(DecodeError::UnknownType(_))
        ));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let line = r#"{"type":"sensor_reading","sensor":"P","value":1.0,"firmware":"v2","seq":42}"#;
        assert!(decode_line(line, &no_spectra(), Utc::now()).is_ok());
    }

    #[test]
    fn test_spectrum_length_mismatch_rejected() {
        let mut lengths = HashMap::new();
        lengths.insert("FTIR-A".to_string(), 4);
        let line = r#"{"type":"ftir_spectrum","sensor":"FTIR-A","values":[1.0,2.0,3.0]}"#;
        assert!(matches!(
            decode_line(line, &lengths, Utc::now()),
            Err(DecodeError::Schema(_))
        ));

        let ok = r#"{"type":"ftir_spectrum","sensor":"FTIR-A","values":[1.0,2.0,3.0,4.0]}"#;
        assert!(decode_line(ok, &lengths, Utc::now()).is_ok());
    }

    #[test]
    fn test_unconfigured_spectrum_accepted() {
        let line = r#"{"type":"ftir_spectrum","sensor":"FTIR-B","values":[1.0,2.0]}"#;
        assert!(decode_line(line, &no_spectra(), Utc::now()).is_ok());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let reading = Reading::Spectrum(SpectrumReading {
            sensor: "FTIR-A".into(),
            values: vec![0.1, 0.5, 0.2],
            timestamp: "2026-01-01T10:00:00Z".parse().unwrap(),
            status: SensorStatus::Ok,
            timestamp_synthesized: false,
        });

        let line = encode_reading(&reading);
        let back = decode_line(&line, &no_spectra(), Utc::now()).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            decode_line("{not json", &no_spectra(), Utc::now()),
            Err(DecodeError::Parse(_))
        ));
    }
}
