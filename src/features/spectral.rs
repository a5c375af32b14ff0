//! High-frequency spectral energy via a discrete Fourier transform
//!
//! Sums squared magnitude above a frequency cutoff, the way bearing-defect
//! energy concentrates above the rotational band. Uses `rustfft` on a
//! mean-removed window; only the one-sided (≤ Nyquist) half of the
//! spectrum is considered.

use num_complex::Complex;
use rustfft::FftPlanner;

use super::mean;

/// Default cutoff for "high frequency" energy (Hz).
pub const DEFAULT_HF_MIN_FREQ: f64 = 2000.0;

/// Minimum window length for a meaningful spectrum.
const MIN_WINDOW: usize = 4;

/// Spectral energy at and above `f_min`, normalized by the window length.
///
/// Returns 0 when the window is shorter than four samples or when
/// `sample_rate < 2 × f_min` — the cutoff band would sit beyond Nyquist,
/// so no energy there is observable.
pub fn hf_energy(values: &[f64], sample_rate: f64, f_min: f64) -> f64 {
    let n = values.len();
    if n < MIN_WINDOW || sample_rate <= 0.0 || sample_rate < 2.0 * f_min {
        return 0.0;
    }

    // Remove the DC component so bin 0 does not dominate.
    let m = mean(values);
    let mut buffer: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v - m, 0.0)).collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    // One-sided spectrum: bins 0..=n/2, bin k at k·sample_rate/n Hz.
    let freq_resolution = sample_rate / n as f64;
    let n_positive = n / 2 + 1;

    let energy: f64 = buffer
        .iter()
        .take(n_positive)
        .enumerate()
        .filter(|(k, _)| *k as f64 * freq_resolution >= f_min)
        .map(|(_, c)| c.norm_sqr())
        .sum();

    energy / n as f64
}
