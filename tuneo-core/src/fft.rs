//! # Spectrum Module
//!
//! Spectrum helpers used to refine a time-domain pitch estimate.
//!
//! ## Features
//! - Forward FFT of any length through RustFFT; plans live in the caller's planner
//! - DC removal and a Hann window before every transform
//! - Quadratic peak interpolation around a rough estimate

use rustfft::{FftPlanner, num_complex::Complex};

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Performs a forward FFT on a signal of any length.
///
/// The signal goes through DC offset removal and a Hann window first.
/// `planner` caches plans, so repeated calls with the same length are cheap.
pub fn perform_fft(planner: &mut FftPlanner<f32>, signal: &[f32]) -> Vec<Complex<f32>> {
    let mut windowed = signal.to_vec();
    remove_dc_offset(&mut windowed);
    apply_hann_window(&mut windowed);

    let mut spectrum: Vec<Complex<f32>> = windowed.into_iter().map(|s| Complex::new(s, 0.0)).collect();
    planner.plan_fft_forward(spectrum.len()).process(&mut spectrum);
    spectrum
}

/// Magnitudes of the bins up to the Nyquist frequency.
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>]) -> Vec<f32> {
    spectrum
        .iter()
        .take(spectrum.len() / 2)
        .map(|c| c.norm())
        .collect()
}

/// Bins searched on each side of the rough estimate.
const SEARCH_BINS: usize = 2;

/// Refines a frequency estimate using a magnitude spectrum.
///
/// Takes the strongest bin near `rough_freq` and moves to the vertex of a
/// parabola fitted through the log magnitudes of that bin and its
/// neighbours. Falls back to `rough_freq` when no usable peak is found.
/// Returns `None` only for a non-positive `rough_freq`.
pub fn refine_from_spectrum(
    magnitudes: &[f32],
    fft_len: usize,
    rough_freq: f32,
    sample_rate: f32,
) -> Option<f32> {
    if rough_freq <= 0.0 {
        return None;
    }

    let bin_width = sample_rate / fft_len as f32;
    let refined = strongest_bin_near(magnitudes, rough_freq / bin_width)
        .and_then(|peak| log_parabolic_offset(magnitudes, peak).map(|offset| (peak as f32 + offset) * bin_width))
        .filter(|freq| freq.is_finite() && *freq > 0.0);

    Some(refined.unwrap_or(rough_freq))
}

/// Strongest bin within [`SEARCH_BINS`] of `target` that has two neighbours.
fn strongest_bin_near(magnitudes: &[f32], target: f32) -> Option<usize> {
    let center = target.round();
    if !center.is_finite() || center < 0.0 {
        return None;
    }
    let center = center as usize;
    let lo = center.saturating_sub(SEARCH_BINS).max(1);
    let hi = (center + SEARCH_BINS).min(magnitudes.len().checked_sub(2)?);
    (lo..=hi).max_by(|&a, &b| magnitudes[a].total_cmp(&magnitudes[b]))
}

/// Offset in bins from `peak` to the vertex of the log-magnitude parabola.
fn log_parabolic_offset(magnitudes: &[f32], peak: usize) -> Option<f32> {
    let [left, center, right] = [peak - 1, peak, peak + 1].map(|i| magnitudes[i].ln());
    if !(left.is_finite() && center.is_finite() && right.is_finite()) {
        return None;
    }
    let curvature = 2.0 * center - left - right;
    if curvature.abs() < 1e-6 {
        return None;
    }
    Some((right - left) / (2.0 * curvature))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_peak_bin_matches_tone() {
        let sample_rate = 8000.0;
        let len = 1000;
        let mut planner = FftPlanner::new();
        let spectrum = perform_fft(&mut planner, &sine(400.0, sample_rate, len));
        let magnitudes = spectrum_to_magnitudes(&spectrum);
        assert_eq!(magnitudes.len(), len / 2);

        let (peak, _) = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        // 400 Hz lands exactly on bin 50 with 8 Hz bins.
        assert_eq!(peak, 50);
    }

    #[test]
    fn test_refine_pulls_towards_true_frequency() {
        let sample_rate = 8000.0;
        let len = 1000;
        let mut planner = FftPlanner::new();
        let magnitudes = spectrum_to_magnitudes(&perform_fft(&mut planner, &sine(403.0, sample_rate, len)));

        let refined = refine_from_spectrum(&magnitudes, len, 410.0, sample_rate).unwrap();
        assert!((refined - 403.0).abs() < (410.0_f32 - 403.0).abs());
    }

    #[test]
    fn test_refine_rejects_sentinel() {
        assert_eq!(refine_from_spectrum(&[1.0, 2.0, 3.0], 6, -1.0, 8000.0), None);
    }

    #[test]
    fn test_refine_keeps_estimate_without_peak() {
        // Too short to interpolate, and a flat spectrum has no vertex.
        assert_eq!(refine_from_spectrum(&[1.0, 2.0], 4, 100.0, 8000.0), Some(100.0));
        assert_eq!(refine_from_spectrum(&[1.0; 64], 128, 500.0, 8000.0), Some(500.0));
    }
}
