//! # Configuration Module
//!
//! Two layers of configuration feed the pipeline:
//! - [`PipelineConfig`]: fixed tuning parameters of the pitch tracker, chosen
//!   once per session (buffer size, search range, thresholds, queueing).
//! - [`TunerConfig`]: the user's selection (instrument, reference pitch,
//!   guitar tuning, manual string). It may change between frames.
//!
//! Both are plain serde types so a front-end can store them however it likes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};
use crate::instrument::{GuitarTuning, Instrument, InstrumentKind};
use crate::tuning::TuningReference;

/// What the capture side does when the frame queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Discard the incoming frame.
    DropNewest,
    /// Discard the oldest queued frame to make room.
    DropOldest,
}

/// Parameters of the adaptive pitch tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples kept in the ring buffer and handed to the estimator.
    pub buffer_size: usize,
    /// Preferred number of frames delivered per second by the capture.
    pub frames_per_second: u32,
    /// Depth of the pitch/RMS/id and string histories.
    pub history_depth: usize,
    pub min_freq: f32,
    pub max_freq: f32,
    /// Maximum relative pitch change still considered stable.
    pub max_pitch_dev: f32,
    pub threshold_default: f32,
    pub threshold_noisy: f32,
    /// Allowed RMS growth factor before a frame counts as a new onset.
    pub rms_gap: f32,
    pub enable_filter: bool,
    /// Run estimation on every n-th accepted frame only.
    pub processing_throttle: u32,
    /// Maximum number of frames waiting between capture and driver.
    pub queue_depth: usize,
    pub drop_policy: DropPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 9000,
            frames_per_second: 15,
            history_depth: 8,
            min_freq: 30.0,
            max_freq: 500.0,
            max_pitch_dev: 0.2,
            threshold_default: 0.15,
            threshold_noisy: 0.6,
            rms_gap: 1.1,
            enable_filter: true,
            processing_throttle: 1,
            queue_depth: 4,
            drop_policy: DropPolicy::DropOldest,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(TunerError::InvalidConfig(msg.to_string()));

        if self.buffer_size == 0 {
            return invalid("buffer_size must be non-zero");
        }
        if self.frames_per_second == 0 {
            return invalid("frames_per_second must be non-zero");
        }
        if self.processing_throttle == 0 {
            return invalid("processing_throttle must be non-zero");
        }
        if self.queue_depth == 0 {
            return invalid("queue_depth must be non-zero");
        }
        if !(self.min_freq > 0.0 && self.min_freq < self.max_freq) {
            return invalid("search range must satisfy 0 < min_freq < max_freq");
        }
        if !(0.0..1.0).contains(&self.max_pitch_dev) {
            return invalid("max_pitch_dev must lie in [0, 1)");
        }
        if self.threshold_default <= 0.0 || self.threshold_noisy <= 0.0 {
            return invalid("thresholds must be positive");
        }
        Ok(())
    }

    pub fn with_performance_mode(mut self, mode: PerformanceMode) -> Self {
        mode.apply(&mut self);
        self
    }
}

/// Presets trading responsiveness for CPU time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    HighPerformance,
    Balanced,
    HighQuality,
}

impl PerformanceMode {
    pub fn apply(self, config: &mut PipelineConfig) {
        config.buffer_size = 4500;
        let (frames_per_second, throttle) = match self {
            PerformanceMode::HighPerformance => (8, 3),
            PerformanceMode::Balanced => (10, 2),
            PerformanceMode::HighQuality => (15, 1),
        };
        config.frames_per_second = frames_per_second;
        config.processing_throttle = throttle;
    }
}

/// The user's tuner selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub instrument: InstrumentKind,
    pub reference: TuningReference,
    pub guitar_tuning: GuitarTuning,
    /// Index of the user-selected string, `None` for automatic detection.
    pub manual: Option<usize>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            instrument: InstrumentKind::Guitar,
            reference: TuningReference::Ref440,
            guitar_tuning: GuitarTuning::Standard,
            manual: None,
        }
    }
}

impl TunerConfig {
    /// Builds the note table for this selection.
    pub fn instrument(&self) -> Instrument {
        Instrument::new(self.instrument, self.reference, self.guitar_tuning)
    }

    /// Forces manual mode off when the instrument has no such string.
    pub fn normalized(mut self) -> Self {
        let instrument = self.instrument();
        if let Some(index) = self.manual {
            if !instrument.has_strings() || index >= instrument.strings().len() {
                tracing::info!("Manual string {} unavailable, switching to automatic mode", index);
                self.manual = None;
            }
        }
        self
    }

    pub fn is_manual(&self) -> bool {
        self.manual.is_some()
    }
}
