//! Core types for the Guardian SOS pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: motion samples, drop events, the session inputs (user, location,
//! contacts) and the assembled SOS request and backend result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of SOS alert, as sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Manual,
    Drop,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Manual => "manual",
            AlertType::Drop => "drop",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single accelerometer reading in g-equivalent units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: DateTime<Utc>,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: DateTime<Utc>) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Sample stamped with the current time
    pub fn now(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, Utc::now())
    }

    /// Instantaneous acceleration magnitude, sqrt(x² + y² + z²)
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A threshold crossing between two consecutive samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    pub id: Uuid,
    /// Absolute magnitude change that triggered the event
    pub delta: f64,
    pub detected_at: DateTime<Utc>,
}

impl DropEvent {
    pub fn new(delta: f64, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            delta,
            detected_at,
        }
    }
}

/// An emergency contact from the user's local list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Optional; decides whether the contact can receive e-mail notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl EmergencyContact {
    pub fn new(id: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A single current-position snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// The signed-in user, as stored after login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UserProfile {
    /// Display name sent with alerts; the backend expects a non-empty value
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "User",
        }
    }

    pub fn email_or_empty(&self) -> &str {
        self.email.as_deref().unwrap_or("")
    }
}

/// Reference to a finished audio capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRecording {
    pub uri: String,
}

impl AudioRecording {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Filesystem path behind the URI (strips a `file://` scheme)
    pub fn path(&self) -> &str {
        self.uri.strip_prefix("file://").unwrap_or(&self.uri)
    }
}

/// The assembled SOS payload.
///
/// Built once per dispatch from a session snapshot and never mutated
/// afterwards; fields are exposed read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct SosRequest {
    user_id: u64,
    user_email: String,
    user_name: String,
    location: Location,
    contacts: Vec<EmergencyContact>,
    alert_type: AlertType,
    audio: Option<AudioRecording>,
}

impl SosRequest {
    pub(crate) fn new(
        user: &UserProfile,
        location: Location,
        contacts: Vec<EmergencyContact>,
        alert_type: AlertType,
        audio: Option<AudioRecording>,
    ) -> Self {
        Self {
            user_id: user.id,
            user_email: user.email_or_empty().to_string(),
            user_name: user.display_name().to_string(),
            location,
            contacts,
            alert_type,
            audio,
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn contacts(&self) -> &[EmergencyContact] {
        &self.contacts
    }

    pub fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    pub fn audio(&self) -> Option<&AudioRecording> {
        self.audio.as_ref()
    }

    /// A recording cannot travel as plain JSON, so its presence forces multipart
    pub fn requires_multipart(&self) -> bool {
        self.audio.is_some()
    }
}

/// Backend response to `POST /sos`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SosResult {
    pub success: bool,
    #[serde(rename = "emailsSent", default, skip_serializing_if = "Option::is_none")]
    pub emails_sent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// What a successful dispatch reports back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub dispatch_id: Uuid,
    pub alert_type: AlertType,
    pub total_contacts: usize,
    pub emails_sent: u32,
    pub with_audio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_message: Option<String>,
}

/// Why a dispatch ended without contacting the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The user declined the manual SOS confirmation
    NotConfirmed,
    /// The user declined to continue when no contact has an e-mail address
    NoEmailDeclined,
}

/// Terminal result of a dispatch that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered(DeliveryReport),
    Cancelled { reason: CancelReason },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered(_))
    }
}
