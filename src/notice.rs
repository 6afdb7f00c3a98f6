//! User-facing notices and the presentation port
//!
//! The pipeline never renders anything itself. Every message it wants the
//! user to see is a [`Notice`], handed to a [`Presenter`] supplied by the
//! host (a mobile UI, the CLI, or a test double).

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Every message the pipeline can surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    MissingUser,
    MissingLocation,
    NoContacts,
    DropDetected {
        window_secs: u64,
    },
    DropCancelled,
    SosSent {
        total_contacts: usize,
        emails_sent: u32,
        with_audio: bool,
    },
    /// The backend refused the request
    ServerError {
        status: Option<u16>,
        message: Option<String>,
    },
    /// No response reached the client
    NetworkError,
    /// Anything that is neither a server nor a network failure
    SendFailed,
    EmailCoverageWarning,
    InvalidUserEmail,
    TestEmailSent,
    AlertResolved,
}

impl Notice {
    pub fn drop_detected(window: Duration) -> Self {
        Notice::DropDetected {
            window_secs: window.as_secs(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notice::MissingUser | Notice::MissingLocation | Notice::SendFailed => "Error",
            Notice::NoContacts => "No Emergency Contacts",
            Notice::DropDetected { .. } => "Drop Detected",
            Notice::DropCancelled => "SOS Cancelled",
            Notice::SosSent { .. } => "SOS Sent",
            Notice::ServerError { .. } => "Server Error",
            Notice::NetworkError => "Network Error",
            Notice::EmailCoverageWarning => "Email Alert Warning",
            Notice::InvalidUserEmail => "Invalid Email",
            Notice::TestEmailSent => "Test Email Sent",
            Notice::AlertResolved => "Success",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::MissingUser => {
                "User information not available. Please log in again.".to_string()
            }
            Notice::MissingLocation => {
                "Location information not available. Please wait or try again.".to_string()
            }
            Notice::NoContacts => "Please add emergency contacts before using SOS.".to_string(),
            Notice::DropDetected { window_secs } => format!(
                "SOS will be triggered in {} seconds. Tap Cancel if this was a false alarm.",
                window_secs
            ),
            Notice::DropCancelled => "SOS cancelled. No alert was sent.".to_string(),
            Notice::SosSent {
                total_contacts,
                emails_sent,
                with_audio,
            } => format!(
                "Your emergency alert has been sent to {} contacts.\n\
                 {} email notifications were sent{}.",
                total_contacts,
                emails_sent,
                if *with_audio { " with audio recording" } else { "" }
            ),
            Notice::ServerError { status, message } => {
                let detail = message.as_deref().unwrap_or("Please try again.");
                match status {
                    Some(code) => format!("Error code: {}. {}", code, detail),
                    None => detail.to_string(),
                }
            }
            Notice::NetworkError => {
                "No response from server. Check your internet connection and server status."
                    .to_string()
            }
            Notice::SendFailed => "Failed to send SOS alert. Please try again.".to_string(),
            Notice::EmailCoverageWarning => {
                "None of your emergency contacts have valid email addresses. \
                 They will not receive email alerts during an emergency."
                    .to_string()
            }
            Notice::InvalidUserEmail => {
                "Your account does not have a valid email address".to_string()
            }
            Notice::TestEmailSent => {
                "A test email has been sent. Please check your inbox and spam folders.".to_string()
            }
            Notice::AlertResolved => "Alert has been resolved".to_string(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title(), self.message())
    }
}

/// Host-side presentation of notices and prompts
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Show a message; must not block the pipeline
    fn notify(&self, notice: Notice);

    /// "Are you sure you want to send an emergency alert to all your contacts?"
    async fn confirm_sos(&self) -> bool;

    /// Continue even though no contact will receive an e-mail?
    async fn confirm_without_email(&self) -> bool;

    /// Confirm sending a test e-mail to the given address
    async fn confirm_test_email(&self, email: &str) -> bool;

    /// Send the user to contact management
    fn open_contacts(&self);
}

/// Presenter that only logs; prompts resolve to `false`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

#[async_trait]
impl Presenter for LogPresenter {
    fn notify(&self, notice: Notice) {
        tracing::info!(title = notice.title(), "{}", notice.message());
    }

    async fn confirm_sos(&self) -> bool {
        false
    }

    async fn confirm_without_email(&self) -> bool {
        false
    }

    async fn confirm_test_email(&self, _email: &str) -> bool {
        false
    }

    fn open_contacts(&self) {
        tracing::info!("redirecting to contact management");
    }
}
