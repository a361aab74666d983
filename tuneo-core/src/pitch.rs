//! # Pitch Detection Module
//!
//! The pipeline treats pitch estimation as a pluggable collaborator behind
//! the [`PitchEstimator`] trait. [`YinEstimator`] is the default
//! implementation.
//!
//! ## Features
//! - YIN pitch detection bounded to the requested frequency window
//! - Absolute CMND threshold chosen per frame by the range controller
//! - Amplitude gating to filter out silence
//! - Parabolic interpolation for sub-sample accuracy
//! - Optional spectrum refinement for improved precision

use rustfft::FftPlanner;

use crate::error::{Result, TunerError};
use crate::fft;
use crate::range::SearchParameters;

/// Returned when no confident pitch was found.
pub const NO_PITCH: f32 = -1.0;

/// Estimates the fundamental frequency of a block of samples.
pub trait PitchEstimator {
    /// Returns the frequency in Hz, or a non-positive value for "no pitch".
    ///
    /// `Err` is reserved for failures of the estimator itself (invalid input,
    /// internal errors). The driver treats both the same way.
    fn estimate(&mut self, samples: &[f32], sample_rate: f32, params: &SearchParameters) -> Result<f32>;
}

impl<E: PitchEstimator + ?Sized> PitchEstimator for Box<E> {
    fn estimate(&mut self, samples: &[f32], sample_rate: f32, params: &SearchParameters) -> Result<f32> {
        (**self).estimate(samples, sample_rate, params)
    }
}

/// YIN pitch detector restricted to a frequency window.
pub struct YinEstimator {
    /// Minimum RMS for pitch detection; quieter input is treated as silence.
    amplitude_threshold: f32,
    refine: bool,
    planner: FftPlanner<f32>,
    yin_buffer: Vec<f32>,
}

impl std::fmt::Debug for YinEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YinEstimator")
            .field("amplitude_threshold", &self.amplitude_threshold)
            .field("refine", &self.refine)
            .finish()
    }
}

impl Default for YinEstimator {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl YinEstimator {
    pub fn new(amplitude_threshold: f32) -> Self {
        Self {
            amplitude_threshold,
            refine: false,
            planner: FftPlanner::new(),
            yin_buffer: Vec::new(),
        }
    }

    /// Enables FFT peak refinement of the YIN estimate.
    pub fn with_refinement(mut self, refine: bool) -> Self {
        self.refine = refine;
        self
    }

    fn detect(&mut self, signal: &[f32], sample_rate: f32, params: &SearchParameters) -> f32 {
        let frame_size = signal.len();

        // --- Noise Gate: Calculate RMS to filter out silence/noise ---
        if crate::audio::rms(signal) < self.amplitude_threshold {
            return NO_PITCH;
        }

        // --- Lag bounds from the frequency window ---
        let tau_min = ((sample_rate / params.max_freq).floor() as usize).max(2);
        let tau_max = ((sample_rate / params.min_freq).ceil() as usize).min(frame_size / 2 - 1);
        if tau_min + 1 >= tau_max {
            return NO_PITCH;
        }
        let window = (frame_size - tau_max).min(frame_size / 2);

        // --- Step 1 & 2: Difference function ---
        let yin_buffer = &mut self.yin_buffer;
        yin_buffer.clear();
        yin_buffer.resize(tau_max + 1, 0.0);
        for tau in 1..=tau_max {
            let mut diff = 0.0;
            for i in 0..window {
                let delta = signal[i] - signal[i + tau];
                diff += delta * delta;
            }
            yin_buffer[tau] = diff;
        }

        // --- Step 3: Cumulative mean normalized difference ---
        let mut running_sum = 0.0;
        yin_buffer[0] = 1.0;
        for tau in 1..=tau_max {
            running_sum += yin_buffer[tau];
            if running_sum != 0.0 {
                yin_buffer[tau] *= tau as f32 / running_sum;
            } else {
                yin_buffer[tau] = 1.0;
            }
        }

        // --- Step 4: First dip below the absolute threshold, then its minimum ---
        let Some(mut period) = (tau_min..=tau_max).find(|&tau| yin_buffer[tau] < params.threshold) else {
            return NO_PITCH;
        };
        while period < tau_max && yin_buffer[period + 1] < yin_buffer[period] {
            period += 1;
        }

        // --- Step 5: Parabolic interpolation for better precision ---
        let period_float = if period > 1 && period < tau_max {
            let y1 = yin_buffer[period - 1];
            let y2 = yin_buffer[period];
            let y3 = yin_buffer[period + 1];
            let denominator = y1 - 2.0 * y2 + y3;
            if denominator != 0.0 {
                period as f32 + (y1 - y3) / (2.0 * denominator)
            } else {
                period as f32
            }
        } else {
            period as f32
        };

        let mut frequency = sample_rate / period_float;

        if self.refine && frequency.is_finite() {
            let magnitudes = fft::spectrum_to_magnitudes(&fft::perform_fft(&mut self.planner, signal));
            if let Some(refined) = fft::refine_from_spectrum(&magnitudes, frame_size, frequency, sample_rate) {
                frequency = refined;
            }
        }

        if frequency.is_finite() && frequency > 0.0 {
            frequency
        } else {
            NO_PITCH
        }
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&mut self, samples: &[f32], sample_rate: f32, params: &SearchParameters) -> Result<f32> {
        if samples.len() < 8
            || sample_rate <= 0.0
            || params.min_freq <= 0.0
            || params.max_freq <= params.min_freq
            || params.threshold <= 0.0
        {
            return Err(TunerError::Estimator(format!(
                "invalid input: {} samples @ {} Hz, {:?}",
                samples.len(),
                sample_rate,
                params
            )));
        }
        Ok(self.detect(samples, sample_rate, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn sine(freq: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn wide() -> SearchParameters {
        SearchParameters { min_freq: 30.0, max_freq: 500.0, threshold: 0.15 }
    }

    #[test]
    fn test_detects_sine_in_wide_window() {
        let mut yin = YinEstimator::default();
        let pitch = yin.estimate(&sine(110.0, 9000, 0.5), SAMPLE_RATE, &wide()).unwrap();
        assert!((pitch - 110.0).abs() < 0.5, "pitch = {}", pitch);

        let pitch = yin.estimate(&sine(329.63, 9000, 0.5), SAMPLE_RATE, &wide()).unwrap();
        assert!((pitch - 329.63).abs() < 1.0, "pitch = {}", pitch);
    }

    #[test]
    fn test_detects_sine_in_narrow_window() {
        let mut yin = YinEstimator::default();
        let params = SearchParameters { min_freq: 80.0, max_freq: 120.0, threshold: 0.6 };
        let pitch = yin.estimate(&sine(100.0, 9000, 0.5), SAMPLE_RATE, &params).unwrap();
        assert!((pitch - 100.0).abs() < 0.5, "pitch = {}", pitch);
    }

    #[test]
    fn test_silence_has_no_pitch() {
        let mut yin = YinEstimator::default();
        let pitch = yin.estimate(&vec![0.0; 9000], SAMPLE_RATE, &wide()).unwrap();
        assert_eq!(pitch, NO_PITCH);

        let pitch = yin.estimate(&sine(110.0, 9000, 0.001), SAMPLE_RATE, &wide()).unwrap();
        assert_eq!(pitch, NO_PITCH);
    }

    #[test]
    fn test_refinement_stays_close() {
        let mut yin = YinEstimator::default().with_refinement(true);
        let pitch = yin.estimate(&sine(196.0, 9000, 0.5), SAMPLE_RATE, &wide()).unwrap();
        assert!((pitch - 196.0).abs() < 2.0, "pitch = {}", pitch);
    }

    #[test]
    fn test_invalid_input_is_an_error() {
        let mut yin = YinEstimator::default();
        assert!(yin.estimate(&[], SAMPLE_RATE, &wide()).is_err());
        assert!(yin.estimate(&sine(110.0, 9000, 0.5), 0.0, &wide()).is_err());

        let bad = SearchParameters { threshold: 0.0, ..wide() };
        assert!(yin.estimate(&sine(110.0, 9000, 0.5), SAMPLE_RATE, &bad).is_err());
    }
}
