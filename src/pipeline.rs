//! Pipeline orchestration
//!
//! This module provides the public API for Guardian SOS. It wires the
//! stages together:
//!
//! 1. MotionSampler - accelerometer feed while drop detection is on
//! 2. DropDetector - magnitude-delta threshold with debounce
//! 3. ConfirmationTimer - cancellable countdown after a detection
//! 4. AlertDispatcher - preconditions, audio, submission, reporting
//!
//! [`DropWatch`] runs stages 1-3 and hands expired detections to the
//! dispatcher. [`SafetyMonitor`] is the facade a host application drives.

use crate::adapters::{AudioRecorder, LocationProvider, MotionSensor, SosBackend};
use crate::config::SosConfig;
use crate::confirmation::ConfirmationTimer;
use crate::contacts::{verify_contact_emails, EmailCoverage};
use crate::context::SessionContext;
use crate::detector::{DetectorState, DropDetector};
use crate::dispatcher::AlertDispatcher;
use crate::error::SosError;
use crate::notice::{Notice, Presenter};
use crate::sampler::MotionSampler;
use crate::settings::Settings;
use crate::types::{AlertType, DispatchOutcome, MotionSample};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Detector plus the countdown for its pending event.
///
/// Kept under one lock so that a cancel and a fire can never both succeed.
struct WatchState {
    detector: DropDetector,
    timer: Option<ConfirmationTimer>,
}

/// Automatic drop detection: sampler → detector → countdown → dispatch
pub struct DropWatch {
    sampler: MotionSampler,
    state: Arc<Mutex<WatchState>>,
    dispatcher: Arc<AlertDispatcher>,
    window: Duration,
}

impl DropWatch {
    pub fn new(
        sensor: Arc<dyn MotionSensor>,
        dispatcher: Arc<AlertDispatcher>,
        config: &SosConfig,
    ) -> Self {
        Self {
            sampler: MotionSampler::new(sensor, config.sample_interval()),
            state: Arc::new(Mutex::new(WatchState {
                detector: DropDetector::new(config.drop_threshold),
                timer: None,
            })),
            dispatcher,
            window: config.confirmation_window(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sampler.is_enabled()
    }

    pub fn state(&self) -> DetectorState {
        self.state.lock().detector.state()
    }

    /// Start sampling. Returns `Ok(false)` if already running.
    pub fn enable(&self) -> Result<bool, SosError> {
        let state = Arc::clone(&self.state);
        let dispatcher = Arc::clone(&self.dispatcher);
        let window = self.window;
        self.sampler
            .enable(move |sample| observe_sample(&state, &dispatcher, window, sample))
    }

    /// Stop sampling and drop any pending detection without firing it.
    ///
    /// A drop SOS that is already being dispatched runs to completion.
    pub fn disable(&self) -> bool {
        let was_enabled = self.sampler.disable();
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            tracing::info!(
                event_id = %timer.event_id(),
                "pending drop discarded, detection disabled"
            );
            timer.cancel();
        }
        if matches!(state.detector.state(), DetectorState::Dispatching(_)) {
            // Keep the debounce until the in-progress dispatch finishes
            state.detector.forget_reference();
            return was_enabled;
        }
        state.detector.reset();
        was_enabled
    }

    /// The user's "this was a false alarm". Returns false if there was
    /// nothing left to cancel (no detection, or it already fired).
    pub fn cancel_pending(&self) -> bool {
        let mut state = self.state.lock();
        let Some(event) = state.detector.pending() else {
            return false;
        };
        if !state.detector.cancel(event.id) {
            return false;
        }
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        drop(state);

        tracing::info!(event_id = %event.id, "drop cancelled by user");
        self.dispatcher.presenter().notify(Notice::DropCancelled);
        true
    }
}

impl Drop for DropWatch {
    fn drop(&mut self) {
        if let Some(timer) = self.state.lock().timer.take() {
            timer.cancel();
        }
    }
}

fn observe_sample(
    state: &Arc<Mutex<WatchState>>,
    dispatcher: &Arc<AlertDispatcher>,
    window: Duration,
    sample: MotionSample,
) {
    let mut guard = state.lock();
    let Some(event) = guard.detector.observe(sample) else {
        return;
    };

    let on_expire = {
        let state = Arc::clone(state);
        let dispatcher = Arc::clone(dispatcher);
        move |event_id| fire_pending(state, dispatcher, event_id)
    };
    guard.timer = Some(ConfirmationTimer::arm(event.id, window, on_expire));
    drop(guard);

    dispatcher.presenter().notify(Notice::drop_detected(window));
}

async fn fire_pending(
    state: Arc<Mutex<WatchState>>,
    dispatcher: Arc<AlertDispatcher>,
    event_id: Uuid,
) {
    let fired = {
        let mut guard = state.lock();
        let fired = guard.detector.fire(event_id);
        if fired.is_some() {
            // From here on the countdown task is the dispatch; nobody may abort it
            if let Some(timer) = guard.timer.take() {
                timer.detach();
            }
        }
        fired
    };
    let Some(event) = fired else {
        tracing::debug!(%event_id, "countdown expired after cancellation");
        return;
    };

    tracing::warn!(
        event_id = %event.id,
        delta = event.delta,
        "no cancellation received, sending drop SOS"
    );
    match dispatcher.dispatch(AlertType::Drop, false).await {
        Ok(outcome) => tracing::info!(
            event_id = %event.id,
            delivered = outcome.is_delivered(),
            "drop SOS finished"
        ),
        Err(e) => tracing::error!(event_id = %event.id, error = %e, "drop SOS failed"),
    }

    state.lock().detector.finish(event.id);
}

/// Host-supplied device and backend collaborators
pub struct Collaborators {
    pub sensor: Arc<dyn MotionSensor>,
    pub recorder: Arc<dyn AudioRecorder>,
    pub location: Arc<dyn LocationProvider>,
    pub backend: Arc<dyn SosBackend>,
    pub presenter: Arc<dyn Presenter>,
}

/// Entry point for a host application.
///
/// Owns the dispatcher and the drop watch, and keeps the persisted
/// drop-detection preference in sync with what is actually running.
pub struct SafetyMonitor {
    config: SosConfig,
    context: SessionContext,
    dispatcher: Arc<AlertDispatcher>,
    drop_watch: DropWatch,
    location: Arc<dyn LocationProvider>,
    settings: Mutex<Settings>,
    settings_path: Option<PathBuf>,
}

impl SafetyMonitor {
    pub fn new(config: SosConfig, context: SessionContext, collaborators: Collaborators) -> Self {
        let dispatcher = Arc::new(AlertDispatcher::new(
            config.clone(),
            context.clone(),
            collaborators.recorder,
            collaborators.backend,
            collaborators.presenter,
        ));
        let drop_watch = DropWatch::new(collaborators.sensor, Arc::clone(&dispatcher), &config);
        Self {
            config,
            context,
            dispatcher,
            drop_watch,
            location: collaborators.location,
            settings: Mutex::new(Settings::default()),
            settings_path: None,
        }
    }

    /// Persist the drop-detection preference at `path`
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &SosConfig {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    pub fn settings(&self) -> Settings {
        *self.settings.lock()
    }

    pub fn drop_state(&self) -> DetectorState {
        self.drop_watch.state()
    }

    pub fn drop_detection_active(&self) -> bool {
        self.drop_watch.is_enabled()
    }

    /// Load saved settings, take a first location fix and resume drop
    /// detection if it was left on.
    pub async fn start(&self) -> Result<Settings, SosError> {
        let settings = match &self.settings_path {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        *self.settings.lock() = settings;

        if let Err(e) = self.context.refresh_location(self.location.as_ref()).await {
            tracing::warn!(error = %e, "starting without a location fix");
        }

        if settings.drop_detection_enabled {
            self.drop_watch.enable()?;
        }
        Ok(settings)
    }

    /// The SOS button
    pub async fn trigger_manual_sos(&self) -> Result<DispatchOutcome, SosError> {
        self.dispatcher.dispatch(AlertType::Manual, true).await
    }

    /// Turn drop detection on or off and remember the choice
    ///
    /// The preference is saved first; nothing changes if saving fails. If
    /// sampling cannot start, the saved preference is restored.
    pub fn set_drop_detection(&self, enabled: bool) -> Result<(), SosError> {
        let mut settings = self.settings.lock();
        let previous = *settings;
        let next = Settings {
            drop_detection_enabled: enabled,
        };
        if let Some(path) = &self.settings_path {
            next.save(path)?;
        }

        if enabled {
            if let Err(e) = self.drop_watch.enable() {
                if let Some(path) = &self.settings_path {
                    if let Err(restore) = previous.save(path) {
                        tracing::error!(
                            error = %restore,
                            "failed to restore drop detection preference"
                        );
                    }
                }
                return Err(e);
            }
        } else {
            self.drop_watch.disable();
        }

        *settings = next;
        tracing::info!(enabled, "drop detection preference updated");
        Ok(())
    }

    /// Cancel a pending drop detection
    pub fn cancel_drop(&self) -> bool {
        self.drop_watch.cancel_pending()
    }

    /// The app returned to the foreground: refresh the location fix and
    /// warn if no contact could receive an e-mail.
    pub async fn on_foreground(&self) -> EmailCoverage {
        if let Err(e) = self.context.refresh_location(self.location.as_ref()).await {
            tracing::warn!(error = %e, "keeping previous location fix");
        }

        let coverage = verify_contact_emails(
            &self.context.contacts().snapshot(),
            self.config.verification_email_policy,
        );
        if coverage.needs_warning() {
            tracing::warn!(contacts = coverage.total, "no contact has a valid e-mail address");
            self.dispatcher.presenter().notify(Notice::EmailCoverageWarning);
        }
        coverage
    }

    pub async fn send_test_email(&self) -> Result<bool, SosError> {
        self.dispatcher.send_test_email().await
    }

    /// Stop background work without touching the saved preference
    pub fn shutdown(&self) {
        self.drop_watch.disable();
    }
}
