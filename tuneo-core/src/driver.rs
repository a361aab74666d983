//! # Pipeline Driver Module
//!
//! Runs one audio frame at a time through the tracker:
//! ring buffer and RMS → search range → pitch estimate → history →
//! note resolution → deviation → published [`PipelineState`].
//!
//! All mutable tracking state lives in [`SessionState`], owned by the
//! driver and lent to each stage in turn. Frames must be fed serially.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::{self, AudioFrame};
use crate::config::{PipelineConfig, TunerConfig};
use crate::deviation::Deviation;
use crate::error::Result;
use crate::history::{FrameId, HistoryEntry, HistoryTracks};
use crate::instrument::{Instrument, StringCandidate};
use crate::pitch::{NO_PITCH, PitchEstimator};
use crate::range::{AdaptiveRangeController, SearchParameters};
use crate::resolver::NoteResolver;
use crate::ring_buffer::RingBuffer;

/// Published once per processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub frame_id: FrameId,
    /// Detected pitch in Hz, non-positive when there was none.
    pub pitch: f32,
    pub rms: f32,
    /// Search window used for this frame.
    pub search: SearchParameters,
    pub current_string: Option<StringCandidate>,
    /// Normalized gauge value in (-1, 1), `None` without pitch or lock.
    pub gauge_deviation: Option<f32>,
    pub cents: Option<f32>,
}

impl PipelineState {
    pub fn has_pitch(&self) -> bool {
        self.pitch > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No session; frames are ignored.
    Idle,
    /// Session active, processing frames.
    Listening,
}

/// Everything a session accumulates. Cleared when the session ends.
#[derive(Debug)]
pub struct SessionState {
    pub ring: RingBuffer,
    pub history: HistoryTracks,
    pub resolver: NoteResolver,
    /// Latched from the capture on the first frame.
    pub sample_rate: Option<f32>,
    last_frame_id: Option<FrameId>,
    /// RMS of the previous accepted frame, throttled frames included.
    previous_rms: Option<f32>,
    accepted: u64,
    snapshot: Vec<f32>,
}

impl SessionState {
    fn new(config: &PipelineConfig) -> Self {
        Self {
            ring: RingBuffer::new(config.buffer_size),
            history: HistoryTracks::new(config.history_depth),
            resolver: NoteResolver::new(config.history_depth),
            sample_rate: None,
            last_frame_id: None,
            previous_rms: None,
            accepted: 0,
            snapshot: Vec::with_capacity(config.buffer_size),
        }
    }

    fn clear(&mut self) {
        self.ring.clear();
        self.history.clear();
        self.resolver.clear();
        self.sample_rate = None;
        self.last_frame_id = None;
        self.previous_rms = None;
        self.accepted = 0;
    }

    /// Only the last accepted id is compared.
    fn is_duplicate(&self, id: FrameId) -> bool {
        self.last_frame_id == Some(id)
    }
}

pub struct PipelineDriver<E> {
    config: PipelineConfig,
    tuner: TunerConfig,
    instrument: Instrument,
    controller: AdaptiveRangeController,
    estimator: E,
    session: SessionState,
    state: DriverState,
}

impl<E: PitchEstimator> PipelineDriver<E> {
    pub fn new(config: PipelineConfig, tuner: TunerConfig, estimator: E) -> Result<Self> {
        config.validate()?;
        let tuner = tuner.normalized();
        let mut driver = Self {
            instrument: tuner.instrument(),
            controller: AdaptiveRangeController::new(&config),
            session: SessionState::new(&config),
            state: DriverState::Idle,
            config,
            tuner,
            estimator,
        };
        driver.sync_manual_string();
        Ok(driver)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tuner_config(&self) -> &TunerConfig {
        &self.tuner
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn current_string(&self) -> Option<StringCandidate> {
        self.session.resolver.current_string()
    }

    /// Enters `Listening` with a clean session.
    pub fn begin(&mut self) {
        self.session.clear();
        self.sync_manual_string();
        self.state = DriverState::Listening;
        info!("Pipeline listening");
    }

    /// Returns to `Idle` and discards all session state.
    pub fn end(&mut self) {
        self.session.clear();
        self.state = DriverState::Idle;
        info!("Pipeline idle");
    }

    /// Applies a new user selection without resetting history.
    pub fn apply_config(&mut self, tuner: TunerConfig) {
        let tuner = tuner.normalized();
        if tuner == self.tuner {
            return;
        }
        info!(
            "Tuner config changed: {:?} @ {} Hz, manual {:?}",
            tuner.instrument,
            tuner.reference.frequency(),
            tuner.manual
        );
        self.instrument = tuner.instrument();
        self.tuner = tuner;
        self.sync_manual_string();
    }

    fn sync_manual_string(&mut self) {
        let manual = self
            .tuner
            .manual
            .and_then(|index| self.instrument.strings().get(index).copied());
        self.session.resolver.set_manual(manual);
    }

    /// Processes one frame.
    ///
    /// `sample_rate` is queried once, on the first frame of the session.
    /// Returns `None` for frames that are skipped (idle driver, duplicate id,
    /// throttled frame).
    pub fn process_frame<F>(&mut self, frame: AudioFrame, sample_rate: F) -> Option<PipelineState>
    where
        F: FnOnce() -> Option<f32>,
    {
        if self.state != DriverState::Listening {
            debug!("Ignoring frame {} while idle", frame.id);
            return None;
        }

        let session = &mut self.session;
        if session.is_duplicate(frame.id) {
            debug!("Skipping already processed frame {}", frame.id);
            return None;
        }
        session.last_frame_id = Some(frame.id);

        session.ring.push(&frame.samples);
        let rms = audio::rms(&frame.samples);
        let previous_rms = session.previous_rms.replace(rms);

        session.accepted += 1;
        if session.accepted % self.config.processing_throttle as u64 != 0 {
            return None;
        }

        if session.sample_rate.is_none() {
            session.sample_rate = sample_rate().filter(|&rate| rate > 0.0);
            match session.sample_rate {
                Some(rate) => info!("Setting sample rate to {}Hz", rate),
                None => warn!("Capture has not reported a sample rate yet"),
            }
        }

        let search = self.controller.parameters(&session.history, rms, previous_rms);
        session.ring.snapshot_into(&mut session.snapshot);

        let pitch = match session.sample_rate {
            Some(rate) => estimate_contained(&mut self.estimator, &session.snapshot, rate, &search),
            None => NO_PITCH,
        };
        debug!(
            "Frame {}: pitch {:.1}Hz [{:.1}Hz-{:.1}Hz, threshold {}]",
            frame.id, pitch, search.min_freq, search.max_freq, search.threshold
        );

        session.history.push(HistoryEntry {
            pitch,
            rms,
            frame_id: frame.id,
        });

        let current_string = session.resolver.observe(pitch, &self.instrument);
        let deviation = Deviation::compute(pitch, current_string.as_ref());

        Some(PipelineState {
            frame_id: frame.id,
            pitch,
            rms,
            search,
            current_string,
            gauge_deviation: deviation.map(|d| d.gauge),
            cents: deviation.map(|d| d.cents),
        })
    }
}

/// Runs the estimator, turning errors, panics and NaN into [`NO_PITCH`].
fn estimate_contained<E: PitchEstimator>(
    estimator: &mut E,
    samples: &[f32],
    sample_rate: f32,
    search: &SearchParameters,
) -> f32 {
    let result = panic::catch_unwind(AssertUnwindSafe(|| estimator.estimate(samples, sample_rate, search)));
    match result {
        Ok(Ok(pitch)) if pitch.is_finite() => pitch,
        Ok(Ok(_)) => NO_PITCH,
        Ok(Err(e)) => {
            warn!("{}", e);
            NO_PITCH
        }
        Err(_) => {
            warn!("Pitch estimator panicked, treating frame as no pitch");
            NO_PITCH
        }
    }
}
