//! Backend wire payloads
//!
//! JSON bodies and multipart form fields exchanged with the alert backend.

use crate::types::{AlertType, EmergencyContact, Location, SosRequest, UserProfile};
use serde::{Deserialize, Serialize};

/// Multipart part name carrying the recording
pub const AUDIO_FIELD: &str = "audio_recording";
pub const AUDIO_MIME: &str = "audio/m4a";
pub const AUDIO_FILE_NAME: &str = "sos_recording.m4a";

pub const TEST_EMAIL_SUBJECT: &str = "Personal Security App - Test Email";
pub const TEST_EMAIL_MESSAGE: &str = "This is a test email from your Personal Security App \
     to verify email delivery is working correctly.";

/// Contact as the backend expects it; a missing e-mail is sent as ""
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl From<&EmergencyContact> for ContactPayload {
    fn from(contact: &EmergencyContact) -> Self {
        Self {
            name: contact.name.clone(),
            phone: contact.phone.clone(),
            email: contact.email.clone().unwrap_or_default(),
        }
    }
}

/// JSON body of `POST /sos`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosPayload {
    pub user_id: u64,
    pub user_email: String,
    pub user_name: String,
    pub location: Location,
    pub emergency_contacts: Vec<ContactPayload>,
    pub alert_type: AlertType,
    pub send_email: bool,
}

impl From<&SosRequest> for SosPayload {
    fn from(request: &SosRequest) -> Self {
        Self {
            user_id: request.user_id(),
            user_email: request.user_email().to_string(),
            user_name: request.user_name().to_string(),
            location: request.location(),
            emergency_contacts: request.contacts().iter().map(ContactPayload::from).collect(),
            alert_type: request.alert_type(),
            send_email: true,
        }
    }
}

impl SosPayload {
    /// Text fields of the multipart variant.
    ///
    /// The location is flattened into `latitude`/`longitude` and the contact
    /// list travels as a JSON string.
    pub fn form_fields(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        Ok(vec![
            ("user_id", self.user_id.to_string()),
            ("user_email", self.user_email.clone()),
            ("user_name", self.user_name.clone()),
            ("latitude", self.location.latitude.to_string()),
            ("longitude", self.location.longitude.to_string()),
            (
                "emergency_contacts",
                serde_json::to_string(&self.emergency_contacts)?,
            ),
            ("alert_type", self.alert_type.as_str().to_string()),
            ("send_email", self.send_email.to_string()),
        ])
    }
}

/// Body of `POST /test-email`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEmailRequest {
    pub user_id: u64,
    pub email: String,
    pub name: String,
    pub subject: String,
    pub message: String,
}

impl TestEmailRequest {
    pub fn for_user(user: &UserProfile, email: &str) -> Self {
        Self {
            user_id: user.id,
            email: email.to_string(),
            name: user.display_name().to_string(),
            subject: TEST_EMAIL_SUBJECT.to_string(),
            message: TEST_EMAIL_MESSAGE.to_string(),
        }
    }
}

/// Generic `{success, message}` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiReply {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// A registered app user, as listed by `GET /users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl AppUser {
    /// Turn a directory entry into an emergency contact
    pub fn to_contact(&self) -> EmergencyContact {
        EmergencyContact {
            id: self.id.to_string(),
            name: self.name.clone(),
            phone: self.phone.clone().unwrap_or_default(),
            email: self.email.clone().filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersResponse {
    pub success: bool,
    #[serde(default)]
    pub users: Vec<AppUser>,
    #[serde(default)]
    pub message: Option<String>,
}
