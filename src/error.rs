//! Error types for Guardian SOS

use thiserror::Error;

/// Errors that can occur anywhere in the SOS pipeline
#[derive(Debug, Error)]
pub enum SosError {
    #[error("User information not available")]
    MissingUser,

    #[error("Location information not available")]
    MissingLocation,

    #[error("No emergency contacts configured")]
    NoContacts,

    #[error("An SOS dispatch is already in progress")]
    DispatchInFlight,

    #[error("SOS submission failed: {0}")]
    Submission(#[from] SubmitError),

    #[error("Audio capture error: {0}")]
    Audio(String),

    #[error("Motion sensor error: {0}")]
    Sensor(String),

    #[error("Location service error: {0}")]
    Location(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),
}

/// Classification of a failed backend submission.
///
/// The three kinds drive three distinct user-facing messages. None of them
/// is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The backend answered, but refused the request.
    #[error("server rejected request (status {status:?}): {message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    /// No response reached the client.
    #[error("no response from server: {0}")]
    Connectivity(String),

    #[error("unexpected submission failure: {0}")]
    Unexpected(String),
}

impl SubmitError {
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        SubmitError::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SubmitError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            SubmitError::Connectivity(e.to_string())
        } else if let Some(status) = e.status() {
            SubmitError::rejected(Some(status.as_u16()), e.to_string())
        } else {
            SubmitError::Unexpected(e.to_string())
        }
    }
}
