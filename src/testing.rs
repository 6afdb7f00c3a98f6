//! Test doubles for the collaborator ports

use crate::adapters::{AudioRecorder, MotionSensor, SosBackend};
use crate::error::{SosError, SubmitError};
use crate::notice::{Notice, Presenter};
use crate::schema::TestEmailRequest;
use crate::types::{AudioRecording, MotionSample, SosRequest, SosResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Recorder with a scripted behaviour
pub struct FakeRecorder {
    start_ok: bool,
    stop_result: Result<Option<String>, String>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeRecorder {
    pub fn working(uri: &str) -> Self {
        Self::scripted(true, Ok(Some(uri.to_string())))
    }

    /// Microphone permission denied
    pub fn denied() -> Self {
        Self::scripted(false, Ok(None))
    }

    pub fn failing_stop() -> Self {
        Self::scripted(true, Err("device busy".to_string()))
    }

    fn scripted(start_ok: bool, stop_result: Result<Option<String>, String>) -> Self {
        Self {
            start_ok,
            stop_result,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioRecorder for FakeRecorder {
    async fn start(&self) -> Result<(), SosError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.start_ok {
            Ok(())
        } else {
            Err(SosError::Audio("microphone permission denied".to_string()))
        }
    }

    async fn stop(&self) -> Result<Option<AudioRecording>, SosError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        match &self.stop_result {
            Ok(uri) => Ok(uri.as_deref().map(AudioRecording::new)),
            Err(e) => Err(SosError::Audio(e.clone())),
        }
    }
}

/// Backend that records every request and replays scripted replies
#[derive(Default)]
pub struct FakeBackend {
    replies: Mutex<VecDeque<Result<SosResult, SubmitError>>>,
    requests: Mutex<Vec<SosRequest>>,
    test_emails: Mutex<Vec<TestEmailRequest>>,
    latency: Option<Duration>,
}

impl FakeBackend {
    /// Every submission succeeds with the given e-mail count
    pub fn succeeding(emails_sent: u32) -> Self {
        let backend = Self::default();
        backend.push_reply(Ok(SosResult {
            success: true,
            emails_sent: Some(emails_sent),
            message: None,
        }));
        backend
    }

    pub fn failing(error: SubmitError) -> Self {
        let backend = Self::default();
        backend.push_reply(Err(error));
        backend
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_reply(&self, reply: Result<SosResult, SubmitError>) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<SosRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn test_emails(&self) -> Vec<TestEmailRequest> {
        self.test_emails.lock().clone()
    }
}

#[async_trait]
impl SosBackend for FakeBackend {
    async fn submit(&self, request: &SosRequest) -> Result<SosResult, SubmitError> {
        self.requests.lock().push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut replies = self.replies.lock();
        // The last scripted reply repeats
        if replies.len() > 1 {
            replies.pop_front().unwrap_or_else(|| Err(SubmitError::Unexpected("no reply".into())))
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Err(SubmitError::Unexpected("no reply scripted".into())))
        }
    }

    async fn send_test_email(&self, request: &TestEmailRequest) -> Result<(), SubmitError> {
        self.test_emails.lock().push(request.clone());
        Ok(())
    }
}

/// Presenter with scripted answers that keeps every notice
pub struct FakePresenter {
    confirm_sos: bool,
    confirm_without_email: bool,
    notices: Mutex<Vec<Notice>>,
    sos_prompts: AtomicUsize,
    email_prompts: AtomicUsize,
    redirects: AtomicUsize,
}

impl FakePresenter {
    pub fn new(confirm_sos: bool, confirm_without_email: bool) -> Self {
        Self {
            confirm_sos,
            confirm_without_email,
            notices: Mutex::new(Vec::new()),
            sos_prompts: AtomicUsize::new(0),
            email_prompts: AtomicUsize::new(0),
            redirects: AtomicUsize::new(0),
        }
    }

    /// Says yes to everything
    pub fn agreeing() -> Self {
        Self::new(true, true)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    pub fn sos_prompts(&self) -> usize {
        self.sos_prompts.load(Ordering::SeqCst)
    }

    pub fn email_prompts(&self) -> usize {
        self.email_prompts.load(Ordering::SeqCst)
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Presenter for FakePresenter {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }

    async fn confirm_sos(&self) -> bool {
        self.sos_prompts.fetch_add(1, Ordering::SeqCst);
        self.confirm_sos
    }

    async fn confirm_without_email(&self) -> bool {
        self.email_prompts.fetch_add(1, Ordering::SeqCst);
        self.confirm_without_email
    }

    async fn confirm_test_email(&self, _email: &str) -> bool {
        self.confirm_sos
    }

    fn open_contacts(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sensor fed by the test through [`ChannelSensor::push`]
#[derive(Default)]
pub struct ChannelSensor {
    sender: Mutex<Option<mpsc::Sender<MotionSample>>>,
    subscriptions: AtomicUsize,
}

impl ChannelSensor {
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Whether a live subscriber is holding the feed
    pub fn is_subscribed(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver a sample; returns false if nobody is subscribed
    pub async fn push(&self, x: f64, y: f64, z: f64) -> bool {
        let sender = self.sender.lock().clone();
        match sender {
            Some(tx) => tx.send(MotionSample::now(x, y, z)).await.is_ok(),
            None => false,
        }
    }
}

impl MotionSensor for ChannelSensor {
    fn subscribe(&self, _interval: Duration) -> Result<mpsc::Receiver<MotionSample>, SosError> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock() = Some(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }
}
