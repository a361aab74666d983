//! Synthetic capture feed for running the tuner without a microphone.
//!
//! The signal is a sine whose frequency sweeps from 50 Hz to 400 Hz over
//! 100 frames, with a small sinusoidal ripple on top.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::audio::{CaptureFeed, FrameSender};
use crate::error::{Result, TunerError};

const TEST_LOWEST: f32 = 50.0;
const TEST_HIGHEST: f32 = 400.0;

/// Frequency of the test signal at frame `step`.
pub fn test_frequency(step: u64) -> f32 {
    let progress = (step % 100) as f32 / 100.0;
    let center_freq = TEST_LOWEST + (TEST_HIGHEST - TEST_LOWEST) * progress;
    let amp_freq = (TEST_HIGHEST - TEST_LOWEST) / 200.0;
    center_freq + amp_freq * (2.0 * std::f32::consts::PI * step as f32 / 10.0).sin()
}

/// One frame of the test signal.
pub fn test_signal(step: u64, sample_rate: f32, len: usize) -> Vec<f32> {
    sine(test_frequency(step), sample_rate, len)
}

pub fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * i as f32 * frequency / sample_rate).sin())
        .collect()
}

/// Emits the test signal in real time from a background thread.
#[derive(Debug)]
pub struct SyntheticCapture {
    sample_rate: f32,
    frames_per_second: u32,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticCapture {
    pub fn new(sample_rate: f32, frames_per_second: u32) -> Self {
        Self {
            sample_rate,
            frames_per_second: frames_per_second.max(1),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }
}

impl CaptureFeed for SyntheticCapture {
    fn start(&mut self, mut frames: FrameSender) -> Result<()> {
        if self.sample_rate <= 0.0 {
            return Err(TunerError::CaptureStopped);
        }

        let sample_rate = self.sample_rate;
        let frame_size = (sample_rate / self.frames_per_second as f32) as usize;
        let period = Duration::from_secs_f32(1.0 / self.frames_per_second as f32);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        info!("Starting synthetic capture @{}Hz, {} samples per frame", sample_rate, frame_size);

        let handle = thread::Builder::new()
            .name("tuneo-synthetic".into())
            .spawn(move || {
                let mut step = 0;
                while running.load(Ordering::SeqCst) {
                    frames.send(test_signal(step, sample_rate, frame_size));
                    step += 1;
                    thread::sleep(period);
                }
            })
            .map_err(TunerError::Spawn)?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            info!("Synthetic capture stopped");
        }
    }

    fn sample_rate(&self) -> Option<f32> {
        self.thread_handle.as_ref().map(|_| self.sample_rate)
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
