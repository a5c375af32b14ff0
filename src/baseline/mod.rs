//! Baseline profiling — the statistical fingerprint of a quiescent window
//!
//! A baseline is computed once, on demand, from a closed window of samples
//! pulled out of the buffer. It is validated before acceptance: a window
//! that is too short, or whose detection-critical velocity axes are flat,
//! indicates a disconnected or mis-mounted sensor rather than a valid
//! quiescent machine, and is rejected outright. Thresholds are derived
//! from the accepted profile by [`crate::detector::ThresholdPolicy`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::BaselineConfig;
use crate::features;
use crate::types::{Axis, Sample};

/// Schema version for persisted baseline snapshots.
pub const SCHEMA_VERSION: u32 = 1;

/// Baseline acceptance and persistence failures.
///
/// These are policy-level errors: they require operator action (collect a
/// longer window, check the mounting) and are never silently retried.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("insufficient data: need {needed} samples, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("no vibration signal: velocity Y and Z both show zero variance")]
    NoVibrationSignal,

    #[error("too many flat axes: {flat} axes with zero variance (max {max})")]
    TooManyFlatAxes { flat: usize, max: usize },

    #[error("no baseline has been computed")]
    NotComputed,

    #[error("snapshot missing axis {0}")]
    MissingAxis(&'static str),

    #[error("schema version mismatch: file has v{found}, expected v{expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Time-domain feature record for one axis over the baseline window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisFeatures {
    pub rms: f64,
    pub peak: f64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub crest_factor: f64,
    pub kurtosis: f64,
    /// High-frequency spectral energy — acceleration axes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hf_energy: Option<f64>,
}

impl AxisFeatures {
    fn from_values(values: &[f64]) -> Self {
        Self {
            rms: features::rms(values),
            peak: features::peak(values),
            mean: features::mean(values),
            std: features::std_dev(values),
            min: features::min(values),
            max: features::max(values),
            crest_factor: features::crest_factor(values),
            kurtosis: features::kurtosis(values),
            hf_energy: None,
        }
    }
}

/// Accepted per-axis baseline, indexed by [`Axis`].
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineProfile {
    features: [AxisFeatures; Axis::COUNT],
    /// Number of samples in the window the profile was computed from
    pub sample_count: usize,
    /// Estimated sample rate of the window (Hz; 0 if degenerate)
    pub sample_rate: f64,
}

impl BaselineProfile {
    /// Feature record for one axis.
    pub fn axis(&self, axis: Axis) -> AxisFeatures {
        self.features[axis.index()]
    }
}

/// Flat on-disk form of a profile, keyed by short axis name.
#[derive(Serialize, Deserialize)]
struct BaselineSnapshot {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    sample_count: usize,
    sample_rate: f64,
    axes: BTreeMap<String, AxisFeatures>,
}

/// Computes, validates, and persists baseline profiles.
pub struct BaselineModel {
    config: BaselineConfig,
    profile: Option<BaselineProfile>,
}

impl BaselineModel {
    pub fn new(config: BaselineConfig) -> Self {
        Self {
            config,
            profile: None,
        }
    }

    /// The current accepted profile, if any.
    pub fn profile(&self) -> Option<&BaselineProfile> {
        self.profile.as_ref()
    }

    /// Compute a baseline from a closed sample window.
    ///
    /// Rejections (window unchanged, previous profile kept):
    /// - fewer than `min_samples` samples;
    /// - velocity Y and Z both flat — the axes detection depends on;
    /// - more than `max_zero_std_axes` flat axes overall.
    pub fn calculate(&mut self, window: &[Sample]) -> Result<(), BaselineError> {
        if window.len() < self.config.min_samples {
            return Err(BaselineError::InsufficientData {
                needed: self.config.min_samples,
                available: window.len(),
            });
        }

        let sample_rate = features::estimate_sample_rate(window);
        let mut records = [AxisFeatures::default(); Axis::COUNT];

        for axis in Axis::ALL {
            let values = features::axis_values(window, axis);
            let mut record = AxisFeatures::from_values(&values);
            if axis.is_acceleration() {
                record.hf_energy = Some(features::hf_energy(
                    &values,
                    sample_rate,
                    self.config.hf_min_freq_hz,
                ));
            }
            records[axis.index()] = record;
        }

        let eps = self.config.zero_std_epsilon;
        let is_flat = |axis: Axis| records[axis.index()].std <= eps;

        if is_flat(Axis::VelocityY) && is_flat(Axis::VelocityZ) {
            return Err(BaselineError::NoVibrationSignal);
        }

        let flat = Axis::ALL.iter().filter(|a| is_flat(**a)).count();
        if flat > self.config.max_zero_std_axes {
            return Err(BaselineError::TooManyFlatAxes {
                flat,
                max: self.config.max_zero_std_axes,
            });
        }

        info!(
            samples = window.len(),
            sample_rate = format_args!("{sample_rate:.1}"),
            flat_axes = flat,
            "Baseline accepted"
        );

        self.profile = Some(BaselineProfile {
            features: records,
            sample_count: window.len(),
            sample_rate,
        });
        Ok(())
    }

    /// Persist the current profile as a flat JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<(), BaselineError> {
        let profile = self.profile.as_ref().ok_or(BaselineError::NotComputed)?;

        let axes: BTreeMap<String, AxisFeatures> = Axis::ALL
            .iter()
            .map(|a| (a.name().to_string(), profile.axis(*a)))
            .collect();

        let snapshot = BaselineSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            sample_count: profile.sample_count,
            sample_rate: profile.sample_rate,
            axes,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;

        info!(path = %path.display(), "Baseline snapshot saved");
        Ok(())
    }

    /// Restore a profile from a snapshot written by [`save`](Self::save).
    ///
    /// A snapshot with a different schema version or missing axes is
    /// rejected and the current profile is left untouched.
    pub fn load(&mut self, path: &Path) -> Result<(), BaselineError> {
        let snapshot: BaselineSnapshot = serde_json::from_str(&std::fs::read_to_string(path)?)?;

        if snapshot.schema_version != SCHEMA_VERSION {
            warn!(
                file_version = snapshot.schema_version,
                expected = SCHEMA_VERSION,
                "Ignoring baseline snapshot with incompatible schema"
            );
            return Err(BaselineError::SchemaMismatch {
                found: snapshot.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let mut records = [AxisFeatures::default(); Axis::COUNT];
        for axis in Axis::ALL {
            let record = snapshot
                .axes
                .get(axis.name())
                .ok_or(BaselineError::MissingAxis(axis.name()))?;
            records[axis.index()] = *record;
        }

        info!(path = %path.display(), samples = snapshot.sample_count, "Baseline snapshot loaded");

        self.profile = Some(BaselineProfile {
            features: records,
            sample_count: snapshot.sample_count,
            sample_rate: snapshot.sample_rate,
        });
        Ok(())
    }
}
