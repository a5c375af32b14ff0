//! Feature extraction over sample windows
//!
//! Pure, total functions: degenerate input (empty windows, zero variance,
//! infeasible Nyquist) yields a defined zero result instead of an error.
//! Time-domain metrics live here; the high-frequency spectral energy DFT
//! is in [`spectral`].

mod spectral;

pub use spectral::{hf_energy, DEFAULT_HF_MIN_FREQ};

use crate::types::{Axis, Sample};

/// Extract one axis as a plain value series, in window order.
pub fn axis_values(samples: &[Sample], axis: Axis) -> Vec<f64> {
    samples.iter().map(|s| s.axis_value(axis)).collect()
}

/// Root mean square: `sqrt(mean(v²))`.
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = values.iter().map(|v| v * v).sum();
    (sum_squares / values.len() as f64).sqrt()
}

/// Largest absolute value in the window.
pub fn peak(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Population variance: `mean((v - mean)²)`.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Smallest value in the window (0 for an empty window).
pub fn min(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Largest value in the window (0 for an empty window).
pub fn max(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Peak / RMS ratio; 0 when RMS is 0 (no division by zero).
pub fn crest_factor(values: &[f64]) -> f64 {
    let r = rms(values);
    if r > 0.0 {
        peak(values) / r
    } else {
        0.0
    }
}

/// Fourth standardized moment: `mean((v - mean)⁴) / variance²`.
///
/// Quantifies impulsiveness; 0 when the variance is 0.
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = variance(values);
    if var == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let fourth = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / values.len() as f64;
    fourth / (var * var)
}

/// Peak-to-peak amplitude / 2; 0 with fewer than two values.
pub fn amplitude(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    (max(values) - min(values)) / 2.0
}

/// Effective sample rate of a window, `(n − 1) / (t_last − t_first)`.
///
/// Returns 0 for windows of ≤ 1 sample or non-positive time span.
pub fn estimate_sample_rate(samples: &[Sample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let span = samples[samples.len() - 1].timestamp - samples[0].timestamp;
    if span <= 0.0 {
        return 0.0;
    }
    (samples.len() - 1) as f64 / span
}
