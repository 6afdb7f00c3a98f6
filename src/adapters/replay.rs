//! Offline collaborators
//!
//! A sensor that replays a recorded trace, a fixed location source and a
//! recorder without a microphone. Used by the CLI and for dry runs.

use super::{AudioRecorder, LocationProvider, MotionSensor};
use crate::error::SosError;
use crate::schema::MotionRecord;
use crate::types::{AudioRecording, Location, MotionSample};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Replays a recorded motion trace at the subscribed cadence
#[derive(Debug, Clone)]
pub struct ReplaySensor {
    records: Arc<Vec<MotionRecord>>,
}

impl ReplaySensor {
    pub fn new(records: Vec<MotionRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MotionSensor for ReplaySensor {
    fn subscribe(&self, interval: Duration) -> Result<mpsc::Receiver<MotionSample>, SosError> {
        if interval.is_zero() {
            return Err(SosError::Sensor("update interval must be non-zero".to_string()));
        }
        let (tx, rx) = mpsc::channel(1);
        let records = Arc::clone(&self.records);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for record in records.iter() {
                ticker.tick().await;
                let sample = record.clone().into_sample(Utc::now());
                if tx.send(sample).await.is_err() {
                    tracing::debug!("replay subscription released");
                    return;
                }
            }
            tracing::debug!(samples = records.len(), "replay finished");
        });

        Ok(rx)
    }
}

/// Location source with a preset position
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    location: Option<Location>,
}

impl FixedLocation {
    pub fn new(location: Location) -> Self {
        Self {
            location: Some(location),
        }
    }

    /// A source that never produces a fix
    pub fn unavailable() -> Self {
        Self { location: None }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Location, SosError> {
        self.location
            .ok_or_else(|| SosError::Location("position unavailable".to_string()))
    }
}

/// Recorder for hosts without a microphone; every start fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

#[async_trait]
impl AudioRecorder for NullRecorder {
    async fn start(&self) -> Result<(), SosError> {
        Err(SosError::Audio("no audio input available".to_string()))
    }

    async fn stop(&self) -> Result<Option<AudioRecording>, SosError> {
        Ok(None)
    }
}
