//! Motion recording input format
//!
//! Recorded accelerometer traces are newline-delimited JSON, one sample per
//! line: `{"x": 0.0, "y": 0.0, "z": 1.0, "t": "2024-01-15T14:00:00Z"}`.
//! The timestamp is optional; samples without one are stamped when read.

use crate::error::SosError;
use crate::types::MotionSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a motion recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, rename = "t", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MotionRecord {
    pub fn validate(&self) -> Result<(), SosError> {
        if [self.x, self.y, self.z].iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(SosError::ParseError(
                "motion sample components must be finite".to_string(),
            ))
        }
    }

    pub fn into_sample(self, fallback: DateTime<Utc>) -> MotionSample {
        MotionSample::new(self.x, self.y, self.z, self.timestamp.unwrap_or(fallback))
    }
}

impl From<&MotionSample> for MotionRecord {
    fn from(sample: &MotionSample) -> Self {
        Self {
            x: sample.x,
            y: sample.y,
            z: sample.z,
            timestamp: Some(sample.timestamp),
        }
    }
}

/// Parse an NDJSON motion recording, skipping blank lines
pub fn parse_motion_ndjson(ndjson: &str) -> Result<Vec<MotionRecord>, SosError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: MotionRecord = serde_json::from_str(trimmed).map_err(|e| {
            SosError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        record
            .validate()
            .map_err(|e| SosError::ParseError(format!("Line {}: {}", line_num + 1, e)))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson_with_and_without_timestamps() {
        let input = r#"
{"x": 0.0, "y": 0.0, "z": 1.0, "t": "2024-01-15T14:00:00Z"}

{"x": 4.0, "y": 0.0, "z": 1.0}
"#;
        let records = parse_motion_ndjson(input).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].timestamp.is_some());
        assert!(records[1].timestamp.is_none());

        let now = Utc::now();
        let sample = records[1].clone().into_sample(now);
        assert_eq!(sample.timestamp, now);
        assert_eq!(sample.x, 4.0);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let input = "{\"x\": 0.0, \"y\": 0.0, \"z\": 1.0}\nnot json\n";
        let err = parse_motion_ndjson(input).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
