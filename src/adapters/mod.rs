//! Collaborator ports and their implementations
//!
//! The pipeline talks to the device and the backend only through the traits
//! in this module, so each stage can be swapped for a test double.

mod http;
mod replay;

pub use http::HttpBackend;
pub use replay::{FixedLocation, NullRecorder, ReplaySensor};

use crate::error::{SosError, SubmitError};
use crate::schema::TestEmailRequest;
use crate::types::{AudioRecording, Location, MotionSample, SosRequest, SosResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Periodic accelerometer feed.
///
/// Dropping the returned receiver releases the subscription.
pub trait MotionSensor: Send + Sync {
    fn subscribe(&self, interval: Duration) -> Result<mpsc::Receiver<MotionSample>, SosError>;
}

/// Device microphone
#[async_trait]
pub trait AudioRecorder: Send + Sync {
    /// Begin capturing; fails on denied permission or a busy device
    async fn start(&self) -> Result<(), SosError>;

    /// Finish capturing and return the recording, if one was produced
    async fn stop(&self) -> Result<Option<AudioRecording>, SosError>;
}

/// Device position service
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Location, SosError>;
}

/// Remote alert backend
#[async_trait]
pub trait SosBackend: Send + Sync {
    /// `POST /sos`
    async fn submit(&self, request: &SosRequest) -> Result<SosResult, SubmitError>;

    /// `POST /test-email`
    async fn send_test_email(&self, request: &TestEmailRequest) -> Result<(), SubmitError>;
}
