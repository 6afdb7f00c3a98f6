//! Confirmation countdown
//!
//! After a drop is detected the user gets a fixed window to cancel. The
//! countdown is a delayed task: cancelling aborts it, expiry runs the
//! supplied continuation. Whether the continuation may still fire is decided
//! by the detector state it checks, so a cancel that loses the race has no
//! effect and a fire that loses the race does nothing.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// A running countdown for one drop event
#[derive(Debug)]
pub struct ConfirmationTimer {
    event_id: Uuid,
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl ConfirmationTimer {
    /// Start a countdown; `on_expire` runs once the window elapses uncancelled
    pub fn arm<F, Fut>(event_id: Uuid, window: Duration, on_expire: F) -> Self
    where
        F: FnOnce(Uuid) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expire(event_id).await;
        });
        tracing::debug!(
            event_id = %event_id,
            window_ms = window.as_millis() as u64,
            "confirmation window opened"
        );
        Self {
            event_id,
            deadline,
            handle,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Stop the countdown. Has no effect once the continuation is running
    /// and has detached itself.
    pub fn cancel(self) {
        tracing::debug!(event_id = %self.event_id, "confirmation window closed");
        self.handle.abort();
    }

    /// Let the countdown keep running without holding its handle
    pub fn detach(self) {
        drop(self.handle);
    }
}
