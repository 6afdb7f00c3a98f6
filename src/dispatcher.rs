//! SOS dispatch
//!
//! One dispatch runs these stages in order, stopping at the first that ends it:
//!
//! 1. claim the in-flight flag (a second dispatch is rejected while one runs)
//! 2. snapshot the session and check user, location, contacts
//! 3. ask for confirmation (manual triggers only)
//! 4. record audio for the alert type's hold duration
//! 5. check e-mail coverage of the contacts
//! 6. assemble and submit the request, then report the outcome
//!
//! The flag is released when the dispatch ends, whichever way it ends.

use crate::adapters::{AudioRecorder, SosBackend};
use crate::audio::{self, AudioCapture};
use crate::config::SosConfig;
use crate::contacts::{partition_contacts, EmailPolicy};
use crate::context::SessionContext;
use crate::error::{SosError, SubmitError};
use crate::notice::{Notice, Presenter};
use crate::schema::TestEmailRequest;
use crate::types::{AlertType, CancelReason, DeliveryReport, DispatchOutcome, SosRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

const DEFAULT_FAILURE_MESSAGE: &str = "Failed to send SOS alert.";

/// Held for the lifetime of one dispatch; clears the flag on drop
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    fn claim(flag: &'a AtomicBool) -> Result<Self, SosError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SosError::DispatchInFlight)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Turns a trigger into a delivered (or explained) SOS
pub struct AlertDispatcher {
    config: SosConfig,
    context: SessionContext,
    audio: AudioCapture,
    backend: Arc<dyn SosBackend>,
    presenter: Arc<dyn Presenter>,
    in_flight: AtomicBool,
}

impl AlertDispatcher {
    pub fn new(
        config: SosConfig,
        context: SessionContext,
        recorder: Arc<dyn AudioRecorder>,
        backend: Arc<dyn SosBackend>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            config,
            context,
            audio: AudioCapture::new(recorder),
            backend,
            presenter,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SosConfig {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }

    /// True while a dispatch (or test e-mail) is running
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one SOS dispatch.
    ///
    /// `triggered_manually` enables the confirmation prompts and the success
    /// notice. Failures are reported to the presenter and also returned.
    pub async fn dispatch(
        &self,
        alert_type: AlertType,
        triggered_manually: bool,
    ) -> Result<DispatchOutcome, SosError> {
        let _in_flight = InFlight::claim(&self.in_flight).map_err(|e| {
            tracing::warn!(%alert_type, "SOS rejected, another dispatch is in progress");
            e
        })?;

        let dispatch_id = Uuid::new_v4();
        let span =
            tracing::info_span!("sos_dispatch", %dispatch_id, %alert_type, triggered_manually);
        self.run(dispatch_id, alert_type, triggered_manually)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        dispatch_id: Uuid,
        alert_type: AlertType,
        triggered_manually: bool,
    ) -> Result<DispatchOutcome, SosError> {
        // Stage 1: preconditions against a snapshot
        let session = match self.context.snapshot().require_ready() {
            Ok(session) => session,
            Err(e) => {
                self.report_precondition(&e);
                return Err(e);
            }
        };

        // Stage 2: confirmation
        if triggered_manually && !self.presenter.confirm_sos().await {
            tracing::info!("SOS not confirmed");
            return Ok(DispatchOutcome::Cancelled {
                reason: CancelReason::NotConfirmed,
            });
        }

        // Stage 3: audio
        let audio = match self
            .audio
            .capture_for(self.config.recording_hold(alert_type))
            .await
        {
            Some(recording) => audio::readable(recording).await,
            None => None,
        };

        // Stage 4: e-mail coverage
        let partition = partition_contacts(&session.contacts, self.config.dispatch_email_policy);
        if partition.none_emailable() {
            if triggered_manually {
                if !self.presenter.confirm_without_email().await {
                    tracing::info!("SOS abandoned, no contact can receive e-mail");
                    return Ok(DispatchOutcome::Cancelled {
                        reason: CancelReason::NoEmailDeclined,
                    });
                }
            } else {
                tracing::warn!(
                    contacts = partition.total(),
                    "no contact has an e-mail address, sending anyway"
                );
            }
        }

        // Stage 5: submit
        let request = SosRequest::new(
            &session.user,
            session.location,
            session.contacts,
            alert_type,
            audio,
        );
        let total_contacts = request.contacts().len();
        let with_audio = request.audio().is_some();
        tracing::info!(
            contacts = total_contacts,
            emailable = partition.email_count(),
            with_audio,
            "submitting SOS"
        );

        let result = match self.backend.submit(&request).await {
            Ok(result) if result.success => result,
            Ok(result) => {
                let err = SubmitError::rejected(
                    None,
                    result
                        .message
                        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
                );
                self.report_failure(&err);
                return Err(err.into());
            }
            Err(err) => {
                self.report_failure(&err);
                return Err(err.into());
            }
        };

        let report = DeliveryReport {
            dispatch_id,
            alert_type,
            total_contacts,
            emails_sent: result.emails_sent.unwrap_or(0),
            with_audio,
            server_message: result.message,
        };
        tracing::info!(emails_sent = report.emails_sent, "SOS delivered");

        if triggered_manually {
            self.presenter.notify(Notice::SosSent {
                total_contacts: report.total_contacts,
                emails_sent: report.emails_sent,
                with_audio: report.with_audio,
            });
        }

        Ok(DispatchOutcome::Delivered(report))
    }

    /// Send a test e-mail to the signed-in user's own address.
    ///
    /// Shares the in-flight flag with [`AlertDispatcher::dispatch`]. Returns
    /// `Ok(false)` when nothing was sent because the user declined or the
    /// account address is unusable.
    pub async fn send_test_email(&self) -> Result<bool, SosError> {
        let _in_flight = InFlight::claim(&self.in_flight)?;

        let user = match self.context.user() {
            Some(user) => user,
            None => {
                self.report_precondition(&SosError::MissingUser);
                return Err(SosError::MissingUser);
            }
        };

        let email = user.email_or_empty().to_string();
        if !EmailPolicy::ContainsAt.accepts(&email) {
            self.presenter.notify(Notice::InvalidUserEmail);
            return Ok(false);
        }

        if !self.presenter.confirm_test_email(&email).await {
            return Ok(false);
        }

        let request = TestEmailRequest::for_user(&user, &email);
        match self.backend.send_test_email(&request).await {
            Ok(()) => {
                tracing::info!(user_id = user.id, "test e-mail sent");
                self.presenter.notify(Notice::TestEmailSent);
                Ok(true)
            }
            Err(err) => {
                self.report_failure(&err);
                Err(err.into())
            }
        }
    }

    fn report_precondition(&self, error: &SosError) {
        tracing::warn!(error = %error, "SOS preconditions not met");
        match error {
            SosError::MissingUser => self.presenter.notify(Notice::MissingUser),
            SosError::MissingLocation => self.presenter.notify(Notice::MissingLocation),
            SosError::NoContacts => {
                self.presenter.notify(Notice::NoContacts);
                self.presenter.open_contacts();
            }
            _ => {}
        }
    }

    fn report_failure(&self, error: &SubmitError) {
        tracing::error!(error = %error, "SOS submission failed");
        let notice = match error {
            SubmitError::Rejected { status, message } => Notice::ServerError {
                status: *status,
                message: Some(message.clone()),
            },
            SubmitError::Connectivity(_) => Notice::NetworkError,
            SubmitError::Unexpected(_) => Notice::SendFailed,
        };
        self.presenter.notify(notice);
    }
}
