//! Threshold derivation from an accepted baseline profile
//!
//! Oscillatory axes (velocity, displacement, acceleration) scale the
//! baseline's RMS/peak/crest features by configured factors; slowly varying
//! axes (temperature) use mean + k·σ bands. The per-axis method is a tagged
//! enum so evaluation is exhaustively matched — there is no string-keyed
//! dispatch anywhere in the hot path.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use tracing::info;

use crate::baseline::{AxisFeatures, BaselineProfile};
use crate::config::ThresholdConfig;
use crate::features;
use crate::types::{Axis, Sample};

/// Kurtosis thresholds sit close to the baseline: impulsiveness grows
/// slowly until a defect spalls.
pub const KURTOSIS_WARNING_FACTOR: f64 = 1.3;
pub const KURTOSIS_CRITICAL_FACTOR: f64 = 1.6;

/// High-frequency energy swings over a wide dynamic range, so its
/// multipliers are far looser.
pub const HF_WARNING_FACTOR: f64 = 2.5;
pub const HF_CRITICAL_FACTOR: f64 = 4.0;

/// Thresholds for one axis, tagged by derivation method.
///
/// A pair with a zero (or negative) threshold is disabled — the baseline
/// carried no signal for that metric, so it cannot be judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ThresholdSet {
    /// Oscillatory axes: each metric judged against its own pair.
    RmsFactor {
        warning: f64,
        critical: f64,
        warning_peak: f64,
        critical_peak: f64,
        warning_crest: f64,
        critical_crest: f64,
        kurtosis_warning: f64,
        kurtosis_critical: f64,
        hf_warning: f64,
        hf_critical: f64,
    },
    /// Slowly varying axes: |current value| judged against mean + k·σ bands.
    MeanStd { warning: f64, critical: f64 },
}

impl ThresholdSet {
    /// The primary warning/critical pair, for status reporting.
    pub fn primary_pair(&self) -> (f64, f64) {
        match *self {
            ThresholdSet::RmsFactor {
                warning, critical, ..
            }
            | ThresholdSet::MeanStd { warning, critical } => (warning, critical),
        }
    }
}

/// Per-axis threshold sets for the full detection axis set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    sets: [ThresholdSet; Axis::COUNT],
}

impl ThresholdTable {
    pub fn axis(&self, axis: Axis) -> &ThresholdSet {
        &self.sets[axis.index()]
    }

    /// Hand-build a table for state-machine tests.
    #[cfg(test)]
    pub(crate) fn from_sets(sets: [ThresholdSet; Axis::COUNT]) -> Self {
        Self { sets }
    }
}

/// Derives [`ThresholdTable`]s deterministically from baselines or raw
/// windows. Recomputation is always explicit — sets are never mutated in
/// place.
pub struct ThresholdPolicy {
    config: ThresholdConfig,
}

impl ThresholdPolicy {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Derive per-axis thresholds from an accepted baseline profile.
    pub fn compute(&self, profile: &BaselineProfile) -> ThresholdTable {
        let mut sets = [ThresholdSet::MeanStd {
            warning: 0.0,
            critical: 0.0,
        }; Axis::COUNT];

        for axis in Axis::ALL {
            let record = profile.axis(axis);
            sets[axis.index()] = if axis.is_oscillatory() {
                self.oscillatory_set(&record)
            } else {
                self.mean_std_set(&record)
            };
        }

        info!(axes = Axis::COUNT, "Thresholds derived from baseline");
        ThresholdTable { sets }
    }

    fn oscillatory_set(&self, record: &AxisFeatures) -> ThresholdSet {
        let c = &self.config;
        // Kurtosis and hf-energy pairs are enabled only when the baseline
        // actually measured them as non-zero.
        let scaled = |base: f64, factor: f64| if base > 0.0 { base * factor } else { 0.0 };

        ThresholdSet::RmsFactor {
            warning: record.rms * c.warning_rms_factor,
            critical: record.rms * c.critical_rms_factor,
            warning_peak: record.peak * c.warning_peak_factor,
            critical_peak: record.peak * c.critical_peak_factor,
            warning_crest: record.crest_factor * c.warning_crest_factor,
            critical_crest: record.crest_factor * c.critical_crest_factor,
            kurtosis_warning: scaled(record.kurtosis, KURTOSIS_WARNING_FACTOR),
            kurtosis_critical: scaled(record.kurtosis, KURTOSIS_CRITICAL_FACTOR),
            hf_warning: scaled(record.hf_energy.unwrap_or(0.0), HF_WARNING_FACTOR),
            hf_critical: scaled(record.hf_energy.unwrap_or(0.0), HF_CRITICAL_FACTOR),
        }
    }

    fn mean_std_set(&self, record: &AxisFeatures) -> ThresholdSet {
        let k = self.config.temp_sigma;
        ThresholdSet::MeanStd {
            warning: record.mean + k * record.std,
            critical: record.mean + 1.5 * k * record.std,
        }
    }

    /// Alternate derivation when no stable baseline period can be isolated:
    /// per axis, the p-th / q-th percentile of `|value|` over a raw window
    /// become the warning/critical pair (direct-value evaluation).
    pub fn compute_percentile(
        &self,
        window: &[Sample],
        warning_percentile: usize,
        critical_percentile: usize,
    ) -> ThresholdTable {
        let mut sets = [ThresholdSet::MeanStd {
            warning: 0.0,
            critical: 0.0,
        }; Axis::COUNT];

        for axis in Axis::ALL {
            let magnitudes: Vec<f64> = features::axis_values(window, axis)
                .into_iter()
                .map(f64::abs)
                .collect();
            let mut data = Data::new(magnitudes);
            sets[axis.index()] = ThresholdSet::MeanStd {
                warning: data.percentile(warning_percentile),
                critical: data.percentile(critical_percentile),
            };
        }

        info!(
            warning_percentile,
            critical_percentile, "Thresholds derived from raw-window percentiles"
        );
        ThresholdTable { sets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineModel;
    use crate::config::BaselineConfig;

    fn profile() -> BaselineProfile {
        let window: Vec<Sample> = (0..64)
            .map(|i| {
                let t = f64::from(i) * 0.02;
                let s = (2.0 * std::f64::consts::PI * 5.0 * t).sin();
                Sample {
                    timestamp: t,
                    vel_x: s,
                    vel_y: 2.0 * s,
                    vel_z: s,
                    disp_x: 10.0 * s,
                    disp_y: 10.0 * s,
                    disp_z: 10.0 * s,
                    accel_x: 0.05 * s,
                    accel_y: 0.05 * s,
                    accel_z: 0.05 * s,
                    temperature: 25.0 + 0.01 * f64::from(i),
                    ..Sample::default()
                }
            })
            .collect();
        let mut model = BaselineModel::new(BaselineConfig::default());
        model.calculate(&window).unwrap();
        model.profile().unwrap().clone()
    }

    #[test]
    fn oscillatory_axes_get_rms_factor_sets() {
        let profile = profile();
        let table = ThresholdPolicy::new(ThresholdConfig::default()).compute(&profile);

        let vy = profile.axis(Axis::VelocityY);
        match table.axis(Axis::VelocityY) {
            ThresholdSet::RmsFactor {
                warning,
                critical,
                kurtosis_warning,
                hf_warning,
                ..
            } => {
                assert!((warning - vy.rms * 2.0).abs() < 1e-9);
                assert!((critical - vy.rms * 3.0).abs() < 1e-9);
                // Sine-wave kurtosis is non-zero → enabled
                assert!(*kurtosis_warning > 0.0);
                // 50 Hz window carries no 2 kHz energy → disabled
                assert_eq!(*hf_warning, 0.0);
            }
            other => panic!("expected RmsFactor, got {other:?}"),
        }
    }

    #[test]
    fn temperature_gets_mean_std_set() {
        let profile = profile();
        let table = ThresholdPolicy::new(ThresholdConfig::default()).compute(&profile);

        let temp = profile.axis(Axis::Temperature);
        match table.axis(Axis::Temperature) {
            ThresholdSet::MeanStd { warning, critical } => {
                assert!((warning - (temp.mean + 2.0 * temp.std)).abs() < 1e-9);
                assert!((critical - (temp.mean + 3.0 * temp.std)).abs() < 1e-9);
            }
            other => panic!("expected MeanStd, got {other:?}"),
        }
    }

    #[test]
    fn percentile_policy_brackets_the_window() {
        let window: Vec<Sample> = (0..100)
            .map(|i| Sample {
                timestamp: f64::from(i),
                vel_x: f64::from(i), // |values| 0..99
                ..Sample::default()
            })
            .collect();

        let table =
            ThresholdPolicy::new(ThresholdConfig::default()).compute_percentile(&window, 95, 99);

        match table.axis(Axis::VelocityX) {
            ThresholdSet::MeanStd { warning, critical } => {
                assert!(*warning > 90.0 && *warning < 99.0);
                assert!(critical > warning);
            }
            other => panic!("expected MeanStd, got {other:?}"),
        }
    }
}
