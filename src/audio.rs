//! Audio capture for an SOS
//!
//! Wraps an [`AudioRecorder`] so that only one capture can be open at a
//! time, and so that a capture is always fully stopped before the caller
//! continues. Failures never propagate: a capture that cannot start or stop
//! yields no recording and the SOS proceeds without audio.

use crate::adapters::AudioRecorder;
use crate::error::SosError;
use crate::types::AudioRecording;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct AudioCapture {
    recorder: Arc<dyn AudioRecorder>,
    active: AtomicBool,
}

impl AudioCapture {
    pub fn new(recorder: Arc<dyn AudioRecorder>) -> Self {
        Self {
            recorder,
            active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a capture; rejected while another one is open
    pub async fn start(&self) -> Result<(), SosError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SosError::Audio("recording already in progress".to_string()));
        }

        match self.recorder.start().await {
            Ok(()) => {
                tracing::info!("recording started");
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Stop the open capture. The handle is released even if stopping fails.
    pub async fn stop(&self) -> Option<AudioRecording> {
        if !self.is_active() {
            tracing::debug!("no active recording to stop");
            return None;
        }

        let result = self.recorder.stop().await;
        self.active.store(false, Ordering::Release);

        match result {
            Ok(Some(recording)) => {
                tracing::info!(uri = %recording.uri, "recording stopped");
                Some(recording)
            }
            Ok(None) => {
                tracing::warn!("recorder stopped without producing a file");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to stop recording");
                None
            }
        }
    }

    /// Record for exactly `hold`, then stop.
    ///
    /// Returns `None` when the capture could not start or did not produce a
    /// file; the caller continues without audio either way.
    pub async fn capture_for(&self, hold: Duration) -> Option<AudioRecording> {
        if let Err(e) = self.start().await {
            tracing::warn!(error = %e, "recording could not be started, continuing without audio");
            return None;
        }

        tokio::time::sleep(hold).await;
        self.stop().await
    }
}

/// Keep a recording only if its file can be opened
pub async fn readable(recording: AudioRecording) -> Option<AudioRecording> {
    match tokio::fs::File::open(recording.path()).await {
        Ok(_) => Some(recording),
        Err(e) => {
            tracing::warn!(
                uri = %recording.uri,
                error = %e,
                "recording file unreadable, continuing without audio"
            );
            None
        }
    }
}
