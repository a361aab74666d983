//! # Audio Capture Module
//!
//! This module handles real-time audio capture and the hand-off of frames
//! to the pipeline worker.
//!
//! ## Features
//! - [`CaptureFeed`] trait for any frame source (microphone, test signal)
//! - Bounded frame channel with an explicit drop policy
//! - Fault path for device errors raised after capture has started
//! - CPAL microphone capture with mono down-mix and frame chunking

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info};

use crate::config::DropPolicy;
use crate::error::{Result, TunerError};
use crate::history::FrameId;

/// A block of mono samples in [-1, 1] delivered by a capture feed.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub id: FrameId,
    pub samples: Vec<f32>,
}

/// Root-mean-square amplitude of a block of samples, 0 for empty input.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// A source of audio frames.
///
/// Implementations push frames into the [`FrameSender`] handed to
/// [`CaptureFeed::start`] from whatever thread they run on. Errors after a
/// successful start are reported through [`FrameSender::fault_reporter`]
/// and end the session.
pub trait CaptureFeed {
    fn start(&mut self, frames: FrameSender) -> Result<()>;
    fn stop(&mut self);
    /// Hardware sample rate in Hz, valid once started.
    fn sample_rate(&self) -> Option<f32>;
}

/// Creates the bounded channel between a capture feed and the pipeline.
pub fn frame_channel(depth: usize, policy: DropPolicy) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
    // Only the first fault matters; the session ends on it.
    let (fault_tx, fault_rx) = crossbeam_channel::bounded(1);
    let sender = FrameSender {
        tx,
        overflow: rx.clone(),
        faults: FaultReporter { tx: fault_tx },
        policy,
        next_id: 1,
        dropped: 0,
    };
    (sender, FrameReceiver { frames: rx, faults: fault_rx })
}

/// Pipeline side of the frame channel.
#[derive(Debug)]
pub struct FrameReceiver {
    pub frames: Receiver<AudioFrame>,
    pub faults: Receiver<TunerError>,
}

/// Reports a fatal capture error from any thread.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    tx: Sender<TunerError>,
}

impl FaultReporter {
    pub fn report(&self, err: impl Into<TunerError>) {
        if let Err(TrySendError::Full(err)) = self.tx.try_send(err.into()) {
            debug!("Capture fault already pending, ignoring: {}", err);
        }
    }
}

/// Capture side of the frame channel.
///
/// Assigns increasing frame ids and never blocks: when the queue is full a
/// frame is dropped according to the [`DropPolicy`].
#[derive(Debug)]
pub struct FrameSender {
    tx: Sender<AudioFrame>,
    // Used to evict the oldest queued frame under `DropOldest`.
    overflow: Receiver<AudioFrame>,
    faults: FaultReporter,
    policy: DropPolicy,
    next_id: FrameId,
    dropped: u64,
}

impl FrameSender {
    /// Sends samples as the next frame. Returns false if it was dropped.
    pub fn send(&mut self, samples: Vec<f32>) -> bool {
        let id = self.next_id;
        self.next_id += 1;
        self.send_frame(AudioFrame { id, samples })
    }

    /// Sends a frame with a caller-chosen id.
    pub fn send_frame(&mut self, frame: AudioFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                self.dropped += 1;
                match self.policy {
                    DropPolicy::DropNewest => {
                        debug!("Frame queue full, dropping frame {}", frame.id);
                        false
                    }
                    DropPolicy::DropOldest => {
                        if let Ok(old) = self.overflow.try_recv() {
                            debug!("Frame queue full, dropping frame {}", old.id);
                        }
                        self.tx.try_send(frame).is_ok()
                    }
                }
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Handle for reporting device errors outside the frame callback.
    pub fn fault_reporter(&self) -> FaultReporter {
        self.faults.clone()
    }

    /// Number of frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Microphone capture through the default CPAL input device.
pub struct CpalCapture {
    frames_per_second: u32,
    stream: Option<cpal::Stream>,
    sample_rate: Option<u32>,
}

impl CpalCapture {
    pub fn new(frames_per_second: u32) -> Self {
        Self {
            frames_per_second: frames_per_second.max(1),
            stream: None,
            sample_rate: None,
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        frame_size: usize,
        mut frames: FrameSender,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = config.channels.max(1) as usize;
        let faults = frames.fault_reporter();
        let err_fn = move |err: cpal::StreamError| {
            error!("An error occurred on the audio stream: {}", err);
            faults.report(err);
        };

        // This buffer will accumulate audio data from the callback.
        let mut audio_buffer: Vec<f32> = Vec::with_capacity(frame_size * 2);

        let stream = device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // First channel only.
                audio_buffer.extend(data.iter().step_by(channels).map(|&s| f32::from_sample(s)));

                while audio_buffer.len() >= frame_size {
                    let frame: Vec<f32> = audio_buffer.drain(..frame_size).collect();
                    frames.send(frame);
                }
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }
}

impl CaptureFeed for CpalCapture {
    /// Starts audio capture from the default input device.
    ///
    /// Frames hold `sample_rate / frames_per_second` samples of the first
    /// input channel.
    fn start(&mut self, frames: FrameSender) -> Result<()> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(TunerError::NoInputDevice)?;

        info!("Using audio input device: {}", device.name()?);

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let frame_size = (sample_rate / self.frames_per_second).max(1) as usize;

        info!(
            "Selected sample rate: {} Hz, {} channel(s), {} samples per frame",
            sample_rate, config.channels, frame_size
        );

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, frame_size, frames)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, frame_size, frames)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, frame_size, frames)?,
            format => return Err(TunerError::UnsupportedFormat(format!("{:?}", format))),
        };

        stream.play()?;

        self.stream = Some(stream);
        self.sample_rate = Some(sample_rate);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                error!("Error pausing stream: {}", e);
            }
            info!("Audio capture stopped");
        }
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate.map(|rate| rate as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);

        let sine: Vec<f32> = (0..1000)
            .map(|i| (2.0 * std::f32::consts::PI * i as f32 / 100.0).sin())
            .collect();
        assert!((rms(&sine) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_sender_assigns_increasing_ids() {
        let (mut sender, rx) = frame_channel(4, DropPolicy::DropNewest);
        sender.send(vec![0.1]);
        sender.send(vec![0.2]);
        assert_eq!(rx.frames.try_recv().unwrap().id, 1);
        assert_eq!(rx.frames.try_recv().unwrap().id, 2);
    }

    #[test]
    fn test_drop_newest_keeps_queued_frames() {
        let (mut sender, rx) = frame_channel(2, DropPolicy::DropNewest);
        assert!(sender.send(vec![1.0]));
        assert!(sender.send(vec![2.0]));
        assert!(!sender.send(vec![3.0]));
        assert_eq!(sender.dropped(), 1);

        let ids: Vec<_> = rx.frames.try_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_drop_oldest_keeps_latest_frames() {
        let (mut sender, rx) = frame_channel(2, DropPolicy::DropOldest);
        for i in 0..5 {
            assert!(sender.send(vec![i as f32]));
        }
        assert_eq!(sender.dropped(), 3);

        let ids: Vec<_> = rx.frames.try_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_first_fault_is_kept() {
        let (sender, rx) = frame_channel(2, DropPolicy::DropOldest);
        let reporter = sender.fault_reporter();
        reporter.report(cpal::StreamError::DeviceNotAvailable);
        reporter.report(TunerError::CaptureStopped);

        let fault = rx.faults.try_recv().unwrap();
        assert!(matches!(fault, TunerError::Stream(cpal::StreamError::DeviceNotAvailable)));
        assert!(rx.faults.try_recv().is_err());
    }
}
