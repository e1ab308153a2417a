//! Microphone level metering
//!
//! A `LevelMonitor` polls an `AudioTap` on a fixed interval and publishes the
//! average energy of the samples gathered since the previous tick. It runs on
//! its own task and only ever reads from the tap, so metering can never stall
//! or fail stream composition.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default metering interval
pub const LEVEL_INTERVAL: Duration = Duration::from_millis(100);

/// Source of raw microphone samples for metering
pub trait AudioTap: Send + Sync {
    /// Take every sample captured since the last call
    fn drain(&self) -> Vec<f32>;
}

/// Bounded sample buffer filled by a capture callback
///
/// Oldest samples are dropped once `capacity` is reached, so a stalled
/// monitor never grows memory.
pub struct SampleBuffer {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, data: &[f32]) {
        let mut samples = self.samples.lock();
        for &sample in data {
            if samples.len() == self.capacity {
                samples.pop_front();
            }
            samples.push_back(sample);
        }
    }
}

impl AudioTap for SampleBuffer {
    fn drain(&self) -> Vec<f32> {
        self.samples.lock().drain(..).collect()
    }
}

/// Mean of squared samples
pub fn average_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32
}

/// Level on a 0-100 scale (RMS of the window)
pub fn level_percent(samples: &[f32]) -> f32 {
    (average_energy(samples).sqrt() * 100.0).clamp(0.0, 100.0)
}

/// Background level meter for one microphone stream
pub struct LevelMonitor {
    level: watch::Receiver<f32>,
    task: JoinHandle<()>,
}

impl LevelMonitor {
    /// Start polling `tap` every `interval`. Must be called inside a tokio runtime.
    pub fn start(tap: Arc<dyn AudioTap>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(0.0_f32);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let samples = tap.drain();
                if tx.send(level_percent(&samples)).is_err() {
                    break;
                }
            }
        });

        Self { level: rx, task }
    }

    /// Most recent level (0-100)
    pub fn level(&self) -> f32 {
        *self.level.borrow()
    }

    /// Receiver for UI bindings that want every update
    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.level.clone()
    }
}

impl Drop for LevelMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
