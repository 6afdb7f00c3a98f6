//! Drop detection
//!
//! Compares the acceleration magnitude of consecutive samples and raises a
//! [`DropEvent`] when the change exceeds the threshold. At most one event is
//! live at a time: while a detection is pending confirmation, or its SOS is
//! being dispatched, further crossings are ignored.
//!
//! ```text
//! Idle --crossing--> PendingConfirmation --cancel--> Idle
//!                            |
//!                          fire
//!                            v
//!                       Dispatching --finish--> Idle
//! ```

use crate::config::DEFAULT_DROP_THRESHOLD;
use crate::types::{DropEvent, MotionSample};
use uuid::Uuid;

/// Absolute change in magnitude between two samples
pub fn magnitude_delta(previous: &MotionSample, current: &MotionSample) -> f64 {
    (current.magnitude() - previous.magnitude()).abs()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorState {
    Idle,
    PendingConfirmation(DropEvent),
    Dispatching(DropEvent),
}

#[derive(Debug, Clone)]
pub struct DropDetector {
    threshold: f64,
    last_sample: Option<MotionSample>,
    state: DetectorState,
}

impl Default for DropDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DROP_THRESHOLD)
    }
}

impl DropDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_sample: None,
            state: DetectorState::Idle,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DetectorState::Idle
    }

    /// The event awaiting confirmation, if any
    pub fn pending(&self) -> Option<DropEvent> {
        match self.state {
            DetectorState::PendingConfirmation(event) => Some(event),
            _ => None,
        }
    }

    /// Feed the next sample.
    ///
    /// The first sample after a reset only seeds the comparison. The sample
    /// always becomes the new reference, even while a detection is live.
    /// A sample with a non-finite component is discarded and does not
    /// replace the reference.
    pub fn observe(&mut self, sample: MotionSample) -> Option<DropEvent> {
        if !sample.magnitude().is_finite() {
            tracing::warn!(
                x = sample.x,
                y = sample.y,
                z = sample.z,
                "non-finite motion sample dropped"
            );
            return None;
        }

        let previous = self.last_sample.replace(sample)?;
        let delta = magnitude_delta(&previous, &sample);

        if delta.is_nan() || delta <= self.threshold {
            return None;
        }

        if !self.is_idle() {
            tracing::trace!(delta, "crossing ignored while a drop is being handled");
            return None;
        }

        let event = DropEvent::new(delta, sample.timestamp);
        tracing::info!(event_id = %event.id, delta, "drop detected");
        self.state = DetectorState::PendingConfirmation(event);
        Some(event)
    }

    /// Discard a pending event. Returns false once it has fired or been cleared.
    pub fn cancel(&mut self, event_id: Uuid) -> bool {
        match self.state {
            DetectorState::PendingConfirmation(event) if event.id == event_id => {
                self.state = DetectorState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Move a pending event to dispatching. Returns false if it was cancelled.
    pub fn fire(&mut self, event_id: Uuid) -> Option<DropEvent> {
        match self.state {
            DetectorState::PendingConfirmation(event) if event.id == event_id => {
                self.state = DetectorState::Dispatching(event);
                Some(event)
            }
            _ => None,
        }
    }

    /// Return to idle once the dispatch for this event has ended
    pub fn finish(&mut self, event_id: Uuid) -> bool {
        match self.state {
            DetectorState::Dispatching(event) if event.id == event_id => {
                self.state = DetectorState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop the reference sample but keep the current state, so the next
    /// sample only seeds the comparison
    pub fn forget_reference(&mut self) {
        self.last_sample = None;
    }

    /// Forget everything, as when the sensor feed stops
    pub fn reset(&mut self) {
        self.last_sample = None;
        self.state = DetectorState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(x: f64, y: f64, z: f64) -> MotionSample {
        MotionSample::new(x, y, z, Utc::now())
    }

    #[test]
    fn test_identical_samples_no_event() {
        let mut detector = DropDetector::default();
        assert_eq!(detector.observe(sample(1.0, 0.0, 0.0)), None);
        assert_eq!(detector.observe(sample(1.0, 0.0, 0.0)), None);
        assert!(detector.is_idle());
    }

    #[test]
    fn test_large_jerk_raises_event() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 1.0));
        let event = detector.observe(sample(4.0, 0.0, 1.0)).unwrap();
        assert!((event.delta - (17.0f64.sqrt() - 1.0)).abs() < 1e-9);
        assert!(event.delta > 3.1 && event.delta < 3.2);
        assert_eq!(detector.pending(), Some(event));
    }

    #[test]
    fn test_first_sample_only_seeds() {
        let mut detector = DropDetector::default();
        assert_eq!(detector.observe(sample(9.0, 9.0, 9.0)), None);
    }

    #[test]
    fn test_delta_at_threshold_is_not_a_crossing() {
        let mut detector = DropDetector::new(2.5);
        detector.observe(sample(0.0, 0.0, 1.0));
        assert_eq!(detector.observe(sample(0.0, 0.0, 3.5)), None);
        assert!(detector.observe(sample(0.0, 0.0, 6.01)).is_some());
    }

    #[test]
    fn test_falling_magnitude_also_counts() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 4.0));
        assert!(detector.observe(sample(0.0, 0.0, 0.5)).is_some());
    }

    #[test]
    fn test_debounce_until_resolved() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 1.0));
        let first = detector.observe(sample(5.0, 0.0, 0.0)).unwrap();

        // Crossings while pending are ignored
        assert_eq!(detector.observe(sample(0.0, 0.0, 0.0)), None);
        assert_eq!(detector.observe(sample(6.0, 0.0, 0.0)), None);

        // Still ignored while dispatching
        assert_eq!(detector.fire(first.id), Some(first));
        assert_eq!(detector.observe(sample(0.0, 0.0, 0.0)), None);

        assert!(detector.finish(first.id));
        assert!(detector.observe(sample(6.0, 0.0, 0.0)).is_some());
    }

    #[test]
    fn test_cancel_and_fire_are_exclusive() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 1.0));
        let event = detector.observe(sample(5.0, 0.0, 0.0)).unwrap();

        assert!(detector.cancel(event.id));
        assert_eq!(detector.fire(event.id), None);
        assert!(detector.is_idle());

        // Back to idle: the drop from 5g to 1g is a fresh crossing
        let second = detector.observe(sample(0.0, 0.0, 1.0)).unwrap();
        assert!(detector.fire(second.id).is_some());
        assert!(!detector.cancel(second.id));
    }

    #[test]
    fn test_stale_ids_do_not_touch_new_event() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 1.0));
        let old = detector.observe(sample(5.0, 0.0, 0.0)).unwrap();
        detector.reset();

        detector.observe(sample(0.0, 0.0, 1.0));
        let new = detector.observe(sample(5.0, 0.0, 0.0)).unwrap();
        assert!(!detector.finish(old.id));
        assert!(!detector.cancel(old.id));
        assert_eq!(detector.pending(), Some(new));
    }

    #[test]
    fn test_reset_clears_reference_sample() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 1.0));
        detector.reset();
        assert_eq!(detector.observe(sample(9.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_non_finite_sample_ignored() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 1.0));
        assert_eq!(detector.observe(sample(f64::NAN, 0.0, 1.0)), None);
        assert_eq!(detector.observe(sample(f64::INFINITY, 0.0, 1.0)), None);
        assert!(detector.is_idle());

        // The reference is still the last finite sample
        assert!(detector.observe(sample(5.0, 0.0, 1.0)).is_some());
    }

    #[test]
    fn test_non_finite_first_sample_does_not_seed() {
        let mut detector = DropDetector::default();
        assert_eq!(detector.observe(sample(f64::INFINITY, 0.0, 0.0)), None);
        assert_eq!(detector.observe(sample(f64::INFINITY, 0.0, 0.0)), None);
        // First finite sample seeds
        assert_eq!(detector.observe(sample(0.0, 0.0, 9.0)), None);
        assert!(detector.is_idle());
    }

    #[test]
    fn test_forget_reference_keeps_state() {
        let mut detector = DropDetector::default();
        detector.observe(sample(0.0, 0.0, 1.0));
        let event = detector.observe(sample(5.0, 0.0, 1.0)).unwrap();
        detector.fire(event.id);

        detector.forget_reference();
        assert_eq!(detector.state(), DetectorState::Dispatching(event));
        assert!(detector.finish(event.id));

        // Next sample only seeds, even though it differs sharply from the old one
        assert_eq!(detector.observe(sample(0.0, 0.0, 9.0)), None);
        assert!(detector.is_idle());
    }
}
