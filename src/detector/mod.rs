//! Streaming anomaly detection — debounced, hysteretic per-axis verdicts
//!
//! Each evaluation tick judges every detection axis against its threshold
//! set, then pushes the raw reading through two noise filters:
//!
//! - **debounce**: a state is promoted only after `min_consecutive`
//!   consecutive over-threshold readings, suppressing single-sample spikes;
//! - **hysteresis**: a raised state holds while the metric stays above
//!   `threshold × hysteresis_ratio`, suppressing flicker on small dips.
//!
//! Evaluation before thresholds exist is a no-op (`None`), not an error —
//! the caller simply has not commissioned the detector yet.

mod policy;

pub use policy::{
    ThresholdPolicy, ThresholdSet, ThresholdTable, HF_CRITICAL_FACTOR, HF_WARNING_FACTOR,
    KURTOSIS_CRITICAL_FACTOR, KURTOSIS_WARNING_FACTOR,
};

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::baseline::BaselineProfile;
use crate::config::{DetectorConfig, ThresholdConfig};
use crate::features;
use crate::types::{Axis, Sample};

/// Per-axis verdict emitted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisState {
    Normal,
    Warning,
    Anomaly,
}

impl std::fmt::Display for AxisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisState::Normal => write!(f, "NORMAL"),
            AxisState::Warning => write!(f, "WARNING"),
            AxisState::Anomaly => write!(f, "ANOMALY"),
        }
    }
}

/// Severity of a single raw reading, before debounce and hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Severity {
    Normal,
    Warning,
    Critical,
}

/// Which metric produced the verdict (for reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Rms,
    Peak,
    CrestFactor,
    Kurtosis,
    HfEnergy,
    /// Direct value comparison (mean + k·σ axes)
    Value,
}

/// Metrics computed over the evaluation window for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisMetrics {
    pub rms: f64,
    pub peak: f64,
    pub crest_factor: f64,
    pub kurtosis: f64,
    /// Zero for non-acceleration axes
    pub hf_energy: f64,
    /// Value of the axis in the evaluated sample
    pub current: f64,
}

/// Status record for one axis at one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisStatus {
    pub axis: Axis,
    pub status: AxisState,
    pub current_value: f64,
    /// Primary warning threshold (RMS pair for oscillatory axes)
    pub threshold_warning: f64,
    /// Primary critical threshold
    pub threshold_critical: f64,
    pub metrics: AxisMetrics,
    /// Metric that raised the state, if any
    pub triggered_by: Option<MetricKind>,
}

/// One full evaluation tick across all axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub timestamp: f64,
    /// Aggregate severity, 0–100
    pub score: f64,
    /// One record per axis, in [`Axis::ALL`] order
    pub statuses: Vec<AxisStatus>,
}

impl EvaluationReport {
    /// Status record for one axis.
    pub fn axis(&self, axis: Axis) -> &AxisStatus {
        &self.statuses[axis.index()]
    }
}

/// Aggregate severity summary: anomalies weigh 100, warnings 50, clamped
/// to 100. Stateless — a monotone roll-up, not part of the state machine.
pub fn aggregate_score(statuses: &[AxisStatus]) -> f64 {
    if statuses.is_empty() {
        return 0.0;
    }
    let anomalies = statuses
        .iter()
        .filter(|s| s.status == AxisState::Anomaly)
        .count();
    let warnings = statuses
        .iter()
        .filter(|s| s.status == AxisState::Warning)
        .count();
    let score = (anomalies as f64 * 100.0 + warnings as f64 * 50.0) / statuses.len() as f64;
    score.min(100.0)
}

/// Debounce counters and last verdict for one axis.
#[derive(Debug, Clone, Copy)]
struct AxisTracker {
    warning_streak: u32,
    critical_streak: u32,
    last_state: AxisState,
}

impl Default for AxisTracker {
    fn default() -> Self {
        Self {
            warning_streak: 0,
            critical_streak: 0,
            last_state: AxisState::Normal,
        }
    }
}

/// Per-axis anomaly state machine over derived thresholds.
pub struct AnomalyDetector {
    config: DetectorConfig,
    policy: ThresholdPolicy,
    thresholds: Option<ThresholdTable>,
    trackers: [AxisTracker; Axis::COUNT],
    history: VecDeque<EvaluationReport>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig, factors: ThresholdConfig) -> Self {
        Self {
            config,
            policy: ThresholdPolicy::new(factors),
            thresholds: None,
            trackers: [AxisTracker::default(); Axis::COUNT],
            history: VecDeque::new(),
        }
    }

    /// Currently installed thresholds, if commissioned.
    pub fn thresholds(&self) -> Option<&ThresholdTable> {
        self.thresholds.as_ref()
    }

    /// Derive and install thresholds from an accepted baseline profile.
    /// Resets all per-axis trackers.
    pub fn compute_thresholds(&mut self, profile: &BaselineProfile) {
        let table = self.policy.compute(profile);
        self.install(table);
    }

    /// Install percentile-derived thresholds from a raw window, for
    /// deployments where no quiescent baseline period can be isolated.
    pub fn compute_percentile_thresholds(&mut self, window: &[Sample]) {
        let table = self.policy.compute_percentile(
            window,
            self.config.percentile_warning,
            self.config.percentile_critical,
        );
        self.install(table);
    }

    fn install(&mut self, table: ThresholdTable) {
        self.thresholds = Some(table);
        self.trackers = [AxisTracker::default(); Axis::COUNT];
        info!("Detector thresholds installed, trackers reset");
    }

    /// Evaluate one sample against its recent window.
    ///
    /// Returns `None` when thresholds have not been computed yet — a
    /// precondition, not an error.
    pub fn evaluate(&mut self, sample: &Sample, window: &[Sample]) -> Option<EvaluationReport> {
        let table = self.thresholds.as_ref()?;

        let sample_rate = features::estimate_sample_rate(window);
        let mut statuses = Vec::with_capacity(Axis::COUNT);

        for axis in Axis::ALL {
            let set = table.axis(axis);
            let metrics = compute_metrics(axis, sample, window, sample_rate, &self.config);

            let (raw, raw_trigger) = raw_severity(set, &metrics, 1.0);
            let (held, held_trigger) = raw_severity(set, &metrics, self.config.hysteresis_ratio);

            let tracker = &mut self.trackers[axis.index()];

            // Debounce: critical counts toward both streaks; a warning-only
            // reading breaks a critical run; normal breaks both.
            match raw {
                Severity::Critical => {
                    tracker.critical_streak += 1;
                    tracker.warning_streak += 1;
                }
                Severity::Warning => {
                    tracker.critical_streak = 0;
                    tracker.warning_streak += 1;
                }
                Severity::Normal => {
                    tracker.critical_streak = 0;
                    tracker.warning_streak = 0;
                }
            }

            let mut status = if tracker.critical_streak >= self.config.min_consecutive {
                AxisState::Anomaly
            } else if tracker.warning_streak >= self.config.min_consecutive {
                AxisState::Warning
            } else {
                AxisState::Normal
            };

            // Hysteresis: a raised state holds while the metric stays above
            // the scaled threshold; a worse debounced verdict still wins.
            if tracker.last_state == AxisState::Anomaly && held == Severity::Critical {
                status = status.max(AxisState::Anomaly);
            }
            if tracker.last_state >= AxisState::Warning && held >= Severity::Warning {
                status = status.max(AxisState::Warning);
            }

            if status != tracker.last_state {
                debug!(
                    axis = %axis,
                    from = %tracker.last_state,
                    to = %status,
                    value = metrics.current,
                    "Axis state transition"
                );
            }
            tracker.last_state = status;

            let (threshold_warning, threshold_critical) = set.primary_pair();
            let triggered_by = match status {
                AxisState::Normal => None,
                _ => raw_trigger.or(held_trigger),
            };

            statuses.push(AxisStatus {
                axis,
                status,
                current_value: metrics.current,
                threshold_warning,
                threshold_critical,
                metrics,
                triggered_by,
            });
        }

        let report = EvaluationReport {
            timestamp: sample.timestamp,
            score: aggregate_score(&statuses),
            statuses,
        };

        self.history.push_back(report.clone());
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }

        Some(report)
    }

    /// The most recent evaluation reports, oldest first, at most `limit`.
    pub fn history(&self, limit: usize) -> Vec<EvaluationReport> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }
}

/// Metrics for one axis over the evaluation window.
fn compute_metrics(
    axis: Axis,
    sample: &Sample,
    window: &[Sample],
    sample_rate: f64,
    config: &DetectorConfig,
) -> AxisMetrics {
    let values = features::axis_values(window, axis);
    AxisMetrics {
        rms: features::rms(&values),
        peak: features::peak(&values),
        crest_factor: features::crest_factor(&values),
        kurtosis: features::kurtosis(&values),
        hf_energy: if axis.is_acceleration() {
            features::hf_energy(&values, sample_rate, config.hf_min_freq_hz)
        } else {
            0.0
        },
        current: sample.axis_value(axis),
    }
}

/// A pair with a non-positive threshold is disabled and never fires.
fn severity_for(value: f64, warning: f64, critical: f64) -> Severity {
    if critical > 0.0 && value >= critical {
        Severity::Critical
    } else if warning > 0.0 && value >= warning {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Most severe verdict across the applicable metrics, with thresholds
/// scaled by `scale` (1.0 for raw evaluation, the hysteresis ratio for
/// hold evaluation).
fn raw_severity(
    set: &ThresholdSet,
    metrics: &AxisMetrics,
    scale: f64,
) -> (Severity, Option<MetricKind>) {
    match *set {
        ThresholdSet::RmsFactor {
            warning,
            critical,
            warning_peak,
            critical_peak,
            warning_crest,
            critical_crest,
            kurtosis_warning,
            kurtosis_critical,
            hf_warning,
            hf_critical,
        } => {
            let checks = [
                (metrics.rms, warning, critical, MetricKind::Rms),
                (metrics.peak, warning_peak, critical_peak, MetricKind::Peak),
                (
                    metrics.crest_factor,
                    warning_crest,
                    critical_crest,
                    MetricKind::CrestFactor,
                ),
                (
                    metrics.kurtosis,
                    kurtosis_warning,
                    kurtosis_critical,
                    MetricKind::Kurtosis,
                ),
                (
                    metrics.hf_energy,
                    hf_warning,
                    hf_critical,
                    MetricKind::HfEnergy,
                ),
            ];

            let mut worst = (Severity::Normal, None);
            for (value, warn, crit, kind) in checks {
                let severity = severity_for(value, warn * scale, crit * scale);
                if severity > worst.0 {
                    worst = (severity, Some(kind));
                }
            }
            worst
        }
        ThresholdSet::MeanStd { warning, critical } => {
            let severity = severity_for(metrics.current.abs(), warning * scale, critical * scale);
            let kind = (severity > Severity::Normal).then_some(MetricKind::Value);
            (severity, kind)
        }
    }
}
