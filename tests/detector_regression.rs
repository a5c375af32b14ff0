//! Analysis pipeline regression
//!
//! Synthetic quiescent signal → baseline → thresholds → state machine.
//! Verifies the healthy path stays quiet, an injected fault promotes only
//! after the debounce run, and the persisted baseline reproduces the same
//! thresholds.

use vibromon::config::{BaselineConfig, DetectorConfig, ThresholdConfig};
use vibromon::{
    AnomalyDetector, Axis, AxisState, BaselineModel, MetricKind, Sample, ThresholdPolicy,
};

const PERIOD: usize = 16;
const DT: f64 = 0.02;

/// One sample of the quiescent machine: sinusoidal motion on every
/// oscillatory axis, gently oscillating temperature.
fn healthy_sample(i: usize) -> Sample {
    let phase = 2.0 * std::f64::consts::PI * (i % PERIOD) as f64 / PERIOD as f64;
    let s = phase.sin();
    Sample {
        timestamp: i as f64 * DT,
        vel_x: 1.2 * s,
        vel_y: 2.0 * s,
        vel_z: 0.8 * s,
        disp_x: 15.0 * s,
        disp_y: 18.0 * s,
        disp_z: 11.0 * s,
        accel_x: 0.05 * s,
        accel_y: 0.04 * s,
        accel_z: 0.06 * s,
        freq_x: 3.1,
        freq_y: 3.1,
        freq_z: 3.1,
        temperature: 25.0 + 0.5 * s,
    }
}

/// The same machine with a velocity fault and overheating chip.
fn faulty_sample(i: usize) -> Sample {
    let mut s = healthy_sample(i);
    s.vel_x *= 5.0;
    s.vel_y *= 5.0;
    s.vel_z *= 5.0;
    s.temperature = 80.0;
    s
}

fn commissioned_detector() -> (AnomalyDetector, BaselineModel) {
    let window: Vec<Sample> = (0..64).map(healthy_sample).collect();

    let mut baseline = BaselineModel::new(BaselineConfig::default());
    baseline.calculate(&window).expect("quiescent window accepted");

    let mut detector = AnomalyDetector::new(
        DetectorConfig {
            min_consecutive: 3,
            ..DetectorConfig::default()
        },
        ThresholdConfig::default(),
    );
    detector.compute_thresholds(baseline.profile().expect("profile present"));
    (detector, baseline)
}

#[test]
fn healthy_signal_stays_normal() {
    let (mut detector, _) = commissioned_detector();

    for i in 64..80 {
        let sample = healthy_sample(i);
        let window: Vec<Sample> = ((i - 31)..=i).map(healthy_sample).collect();
        let report = detector.evaluate(&sample, &window).expect("commissioned");

        assert_eq!(report.score, 0.0, "tick {i}: {report:#?}");
        for status in &report.statuses {
            assert_eq!(status.status, AxisState::Normal, "axis {}", status.axis);
        }
    }
}

#[test]
fn injected_fault_promotes_after_the_debounce_run() {
    let (mut detector, _) = commissioned_detector();

    let fault_window: Vec<Sample> = (0..32).map(faulty_sample).collect();
    let mut states = Vec::new();
    for i in 0..3 {
        let sample = faulty_sample(32 + i);
        let report = detector.evaluate(&sample, &fault_window).expect("commissioned");
        states.push(report.axis(Axis::VelocityY).status);
    }

    // Two suppressed ticks, promotion exactly on the third
    assert_eq!(
        states,
        vec![AxisState::Normal, AxisState::Normal, AxisState::Anomaly]
    );

    let sample = faulty_sample(35);
    let report = detector.evaluate(&sample, &fault_window).expect("commissioned");

    // All three velocity axes plus temperature are anomalous: 4 × 100 / 10
    assert!((report.score - 40.0).abs() < 1e-9, "score {}", report.score);

    let vy = report.axis(Axis::VelocityY);
    assert_eq!(vy.status, AxisState::Anomaly);
    assert_eq!(vy.triggered_by, Some(MetricKind::Rms));
    assert!(vy.metrics.rms > vy.threshold_critical);

    let temp = report.axis(Axis::Temperature);
    assert_eq!(temp.status, AxisState::Anomaly);
    assert_eq!(temp.triggered_by, Some(MetricKind::Value));

    // Displacement was untouched by the fault
    assert_eq!(report.axis(Axis::DisplacementX).status, AxisState::Normal);

    // The run is recorded in the bounded history
    let history = detector.history(10);
    assert!(!history.is_empty());
    assert_eq!(history.last().expect("non-empty").score, report.score);
}

#[test]
fn percentile_fallback_detects_gross_faults() {
    let window: Vec<Sample> = (0..64).map(healthy_sample).collect();

    let mut detector = AnomalyDetector::new(
        DetectorConfig {
            min_consecutive: 3,
            ..DetectorConfig::default()
        },
        ThresholdConfig::default(),
    );
    detector.compute_percentile_thresholds(&window);
    assert!(detector.thresholds().is_some());

    // A zero-crossing healthy sample sits far below the percentile bands
    let quiet = Sample {
        timestamp: 100.0,
        ..Sample::default()
    };
    let report = detector.evaluate(&quiet, &[quiet]).expect("commissioned");
    assert_eq!(report.score, 0.0);

    // A gross velocity fault crosses the 99th-percentile band for three
    // consecutive ticks and promotes
    let mut last = AxisState::Normal;
    for i in 0..3 {
        let fault = Sample {
            timestamp: 101.0 + i as f64,
            vel_y: 50.0,
            ..Sample::default()
        };
        last = detector
            .evaluate(&fault, &[fault])
            .expect("commissioned")
            .axis(Axis::VelocityY)
            .status;
    }
    assert_eq!(last, AxisState::Anomaly);
}

#[test]
fn persisted_baseline_reproduces_identical_thresholds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("baseline.json");

    let (_, baseline) = commissioned_detector();
    baseline.save(&path).expect("save");

    let mut restored = BaselineModel::new(BaselineConfig::default());
    restored.load(&path).expect("load");

    let policy = ThresholdPolicy::new(ThresholdConfig::default());
    let original = policy.compute(baseline.profile().expect("profile"));
    let recovered = policy.compute(restored.profile().expect("profile"));
    assert_eq!(original, recovered);
}
