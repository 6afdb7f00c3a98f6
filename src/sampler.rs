//! Motion sampling
//!
//! Owns the accelerometer subscription while drop detection is enabled and
//! forwards each sample to a callback. Disabling aborts the forwarding task,
//! which drops the receiver and releases the sensor.

use crate::adapters::MotionSensor;
use crate::error::SosError;
use crate::types::MotionSample;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct MotionSampler {
    sensor: Arc<dyn MotionSensor>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MotionSampler {
    pub fn new(sensor: Arc<dyn MotionSensor>, interval: Duration) -> Self {
        Self {
            sensor,
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Subscribe and start forwarding samples.
    ///
    /// Returns `Ok(false)` if sampling was already running; the existing
    /// subscription is kept and `on_sample` is dropped.
    pub fn enable<F>(&self, mut on_sample: F) -> Result<bool, SosError>
    where
        F: FnMut(MotionSample) + Send + 'static,
    {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(false);
        }

        let mut samples = self.sensor.subscribe(self.interval)?;
        *task = Some(tokio::spawn(async move {
            while let Some(sample) = samples.recv().await {
                on_sample(sample);
            }
            tracing::debug!("motion feed ended");
        }));
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "motion sampling enabled");
        Ok(true)
    }

    /// Stop forwarding and release the subscription. Returns false if
    /// sampling was not running.
    pub fn disable(&self) -> bool {
        match self.task.lock().take() {
            Some(task) => {
                task.abort();
                tracing::info!("motion sampling disabled");
                true
            }
            None => false,
        }
    }
}

impl Drop for MotionSampler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ChannelSensor;

    #[tokio::test(start_paused = true)]
    async fn test_samples_forwarded_in_order() {
        let sensor = Arc::new(ChannelSensor::default());
        let sampler = MotionSampler::new(sensor.clone(), Duration::from_millis(500));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        assert!(sampler.enable(move |s| {
            let _ = tx.send(s.x);
        })
        .unwrap());

        assert!(sensor.push(1.0, 0.0, 0.0).await);
        assert!(sensor.push(2.0, 0.0, 0.0).await);
        assert_eq!(rx.recv().await, Some(1.0));
        assert_eq!(rx.recv().await, Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_is_idempotent() {
        let sensor = Arc::new(ChannelSensor::default());
        let sampler = MotionSampler::new(sensor.clone(), Duration::from_millis(500));

        assert!(sampler.enable(|_| {}).unwrap());
        assert!(!sampler.enable(|_| {}).unwrap());
        assert_eq!(sensor.subscriptions(), 1);
        assert!(sampler.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_releases_subscription() {
        let sensor = Arc::new(ChannelSensor::default());
        let sampler = MotionSampler::new(sensor.clone(), Duration::from_millis(500));

        sampler.enable(|_| {}).unwrap();
        assert!(sensor.is_subscribed());

        assert!(sampler.disable());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!sensor.is_subscribed());
        assert!(!sampler.is_enabled());
        assert!(!sampler.disable());

        // Re-enabling subscribes again
        assert!(sampler.enable(|_| {}).unwrap());
        assert_eq!(sensor.subscriptions(), 2);
    }
}
