//! # Adaptive Range Module
//!
//! Chooses the frequency window and detection threshold for the next pitch
//! estimate. Once a pitch has been stable and the signal energy is not
//! rising, the search narrows around the last pitch with a stricter
//! threshold, which rejects octave jumps and transient noise. Anything else
//! falls back to the wide default search.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::history::HistoryTracks;

/// Search window handed to the pitch estimator for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub min_freq: f32,
    pub max_freq: f32,
    pub threshold: f32,
}

/// The last two pitches and RMS levels the controller decides on.
///
/// `rms_1` is the energy of the frame about to be estimated, `rms_2` the
/// energy of the frame accepted just before it, estimated or not.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeInputs {
    pub pitch_1: Option<f32>,
    pub pitch_2: Option<f32>,
    pub rms_1: Option<f32>,
    pub rms_2: Option<f32>,
}

impl RangeInputs {
    /// Reads the previous two pitches from `history`.
    pub fn from_history(history: &HistoryTracks, current_rms: f32, previous_rms: Option<f32>) -> Self {
        Self {
            pitch_1: history.pitch(0),
            pitch_2: history.pitch(1),
            rms_1: Some(current_rms),
            rms_2: previous_rms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveRangeController {
    enable_filter: bool,
    min_freq: f32,
    max_freq: f32,
    max_pitch_dev: f32,
    threshold_default: f32,
    threshold_noisy: f32,
    rms_gap: f32,
}

impl AdaptiveRangeController {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            enable_filter: config.enable_filter,
            min_freq: config.min_freq,
            max_freq: config.max_freq,
            max_pitch_dev: config.max_pitch_dev,
            threshold_default: config.threshold_default,
            threshold_noisy: config.threshold_noisy,
            rms_gap: config.rms_gap,
        }
    }

    /// The wide search used whenever narrowing is not justified.
    pub fn wide(&self) -> SearchParameters {
        SearchParameters {
            min_freq: self.min_freq,
            max_freq: self.max_freq,
            threshold: self.threshold_default,
        }
    }

    /// Computes the parameters for the frame whose RMS is `current_rms`.
    ///
    /// `previous_rms` belongs to the previous accepted frame, which may
    /// have been throttled and so be missing from `history`.
    pub fn parameters(
        &self,
        history: &HistoryTracks,
        current_rms: f32,
        previous_rms: Option<f32>,
    ) -> SearchParameters {
        self.decide(RangeInputs::from_history(history, current_rms, previous_rms))
    }

    pub fn decide(&self, inputs: RangeInputs) -> SearchParameters {
        match self.restrict_around(inputs) {
            Some(pitch) => SearchParameters {
                min_freq: pitch * (1.0 - self.max_pitch_dev),
                max_freq: pitch * (1.0 + self.max_pitch_dev),
                threshold: self.threshold_noisy,
            },
            None => self.wide(),
        }
    }

    /// Returns the pitch to narrow around when every condition holds.
    fn restrict_around(&self, inputs: RangeInputs) -> Option<f32> {
        if !self.enable_filter {
            return None;
        }

        // A previous lock exists.
        let pitch_1 = inputs.pitch_1.filter(|&p| p > 0.0)?;
        let pitch_2 = inputs.pitch_2?;

        // Energy is flat or decaying, not a new onset.
        let (rms_1, rms_2) = (inputs.rms_1?, inputs.rms_2?);
        if !(rms_1 < rms_2 * self.rms_gap) {
            return None;
        }

        // Pitch has been stable.
        if !(relative_diff(pitch_1, pitch_2) <= self.max_pitch_dev) {
            return None;
        }

        Some(pitch_1)
    }
}

/// `|a - b| / max(a, b)`, zero when both are zero.
pub fn relative_diff(a: f32, b: f32) -> f32 {
    let max = a.max(b);
    if max == 0.0 {
        return 0.0;
    }
    (a - b).abs() / max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryEntry;

    fn controller() -> AdaptiveRangeController {
        AdaptiveRangeController::new(&PipelineConfig::default())
    }

    fn inputs(pitch_1: f32, pitch_2: f32, rms_1: f32, rms_2: f32) -> RangeInputs {
        RangeInputs {
            pitch_1: Some(pitch_1),
            pitch_2: Some(pitch_2),
            rms_1: Some(rms_1),
            rms_2: Some(rms_2),
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_stable_decaying_signal_narrows() {
        let params = controller().decide(inputs(100.0, 101.0, 0.5, 0.6));
        assert!(approx(params.min_freq, 80.0));
        assert!(approx(params.max_freq, 120.0));
        assert_eq!(params.threshold, 0.6);
    }

    #[test]
    fn test_louder_onset_uses_wide_search() {
        let params = controller().decide(inputs(100.0, 101.0, 0.8, 0.6));
        assert_eq!(params, controller().wide());
        assert_eq!(params.min_freq, 30.0);
        assert_eq!(params.max_freq, 500.0);
        assert_eq!(params.threshold, 0.15);
    }

    #[test]
    fn test_small_energy_increase_within_gap_still_narrows() {
        let params = controller().decide(inputs(100.0, 101.0, 0.65, 0.6));
        assert_eq!(params.threshold, 0.6);
    }

    #[test]
    fn test_unstable_pitch_uses_wide_search() {
        let params = controller().decide(inputs(100.0, 150.0, 0.5, 0.6));
        assert_eq!(params, controller().wide());
    }

    #[test]
    fn test_no_previous_pitch_uses_wide_search() {
        let params = controller().decide(inputs(-1.0, -1.0, 0.5, 0.6));
        assert_eq!(params, controller().wide());

        let params = controller().decide(RangeInputs {
            pitch_1: Some(100.0),
            rms_1: Some(0.5),
            rms_2: Some(0.6),
            ..Default::default()
        });
        assert_eq!(params, controller().wide());
    }

    #[test]
    fn test_disabled_filter_always_wide() {
        let config = PipelineConfig { enable_filter: false, ..Default::default() };
        let controller = AdaptiveRangeController::new(&config);
        assert_eq!(controller.decide(inputs(100.0, 101.0, 0.5, 0.6)), controller.wide());
    }

    #[test]
    fn test_parameters_from_history() {
        let mut history = HistoryTracks::new(4);
        history.push(HistoryEntry { pitch: 101.0, rms: 0.7, frame_id: 1 });
        history.push(HistoryEntry { pitch: 100.0, rms: 0.6, frame_id: 2 });

        let params = controller().parameters(&history, 0.5, history.rms(0));
        assert!(approx(params.min_freq, 80.0));

        let params = controller().parameters(&history, 0.8, history.rms(0));
        assert_eq!(params, controller().wide());

        // The previous frame's energy wins over the last estimated one.
        let params = controller().parameters(&history, 0.5, Some(0.2));
        assert_eq!(params, controller().wide());

        let params = controller().parameters(&history, 0.5, None);
        assert_eq!(params, controller().wide());
    }

    #[test]
    fn test_relative_diff() {
        assert_eq!(relative_diff(0.0, 0.0), 0.0);
        assert!(approx(relative_diff(100.0, 101.0), 1.0 / 101.0));
        assert!(approx(relative_diff(101.0, 100.0), 1.0 / 101.0));
        assert!(relative_diff(100.0, -1.0) > 0.2);
    }
}
