//! End-to-end session over an in-memory serial link
//!
//! A simulated sensor answers real Modbus frames; the collector fills the
//! buffer through the full decode path, the baseline commissions from a
//! buffer snapshot, and the detector judges live samples — the complete
//! consumer query surface, with no hardware involved.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vibromon::config::{BaselineConfig, CollectorConfig, DetectorConfig, ThresholdConfig};
use vibromon::protocol::{checksum, encode_read_response, registers};
use vibromon::{
    AnomalyDetector, Axis, AxisState, BaselineModel, CollectorEvent, CollectorState,
    PollingCollector, Sample, SampleBuffer, SerialLink, SerialTransport,
};

const PERIOD: usize = 16;

/// Simulated WTVB01-485: answers register reads with a deterministic
/// sinusoidal machine signature and echoes single-register writes.
struct SensorSim {
    pending: Vec<u8>,
    cycle: usize,
}

impl SensorSim {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            cycle: 0,
        }
    }

    fn raw_value(&self, register: u16) -> i16 {
        let phase = 2.0 * std::f64::consts::PI * (self.cycle % PERIOD) as f64 / PERIOD as f64;
        let s = phase.sin();
        match register {
            r if (registers::VX..=registers::VZ).contains(&r) => (100.0 * s) as i16,
            r if (registers::DX..=registers::DZ).contains(&r) => (50.0 * s) as i16,
            r if (registers::HX..=registers::HZ).contains(&r) => 31,
            r if (registers::AX..=registers::AZ).contains(&r) => (200.0 * s) as i16,
            r if r == registers::TEMP => 2500 + ((self.cycle % PERIOD) as i16) * 2,
            _ => 0,
        }
    }
}

impl SerialLink for SensorSim {
    fn write_all(&mut self, frame: &[u8]) -> io::Result<()> {
        assert_eq!(frame.len(), 8, "malformed request");
        let crc = checksum(&frame[..6]);
        assert_eq!(
            u16::from_le_bytes([frame[6], frame[7]]),
            crc,
            "request checksum"
        );

        let function = frame[1];
        let register = u16::from_be_bytes([frame[2], frame[3]]);

        if function == 0x06 {
            // Single-register write: echo the request
            self.pending = frame.to_vec();
            return Ok(());
        }

        // The velocity block leads every cycle
        if register == registers::VX {
            self.cycle += 1;
        }

        let count = u16::from_be_bytes([frame[4], frame[5]]);
        let words: Vec<i16> = (0..count).map(|i| self.raw_value(register + i)).collect();
        self.pending = encode_read_response(frame[0], &words);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

fn sim_transport() -> SerialTransport {
    SerialTransport::new(Box::new(SensorSim::new()), 0x50)
        .with_response_timeout(Duration::from_millis(50))
}

fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn session_feeds_baseline_and_detector() {
    let buffer = Arc::new(SampleBuffer::new(256));
    let mut collector = PollingCollector::new(
        CollectorConfig {
            collection_interval_ms: 1,
            ..CollectorConfig::default()
        },
        Arc::clone(&buffer),
    );

    let events = collector.start(sim_transport()).expect("session starts");
    assert!(
        wait_until(10_000, || buffer.len() >= 48),
        "buffer never filled"
    );
    collector.stop().expect("clean stop");
    assert_eq!(collector.state(), CollectorState::Idle);

    let stats = collector.statistics();
    assert!(stats.total_readings >= 48);
    assert_eq!(stats.failed_readings, 0);
    assert!(stats.elapsed_secs > 0.0);

    // Events mirrored the buffer
    let mut sample_events = 0;
    while let Ok(event) = events.try_recv() {
        if let CollectorEvent::Sample(_) = event {
            sample_events += 1;
        }
    }
    assert!(sample_events >= 48);

    // Decoded engineering units: velocity ±1.00 mm/s, temperature ≈ 25 °C
    let snap = buffer.snapshot();
    let vmax = snap.iter().map(|s| s.vel_x.abs()).fold(0.0, f64::max);
    assert!(vmax <= 1.0 + 1e-9 && vmax > 0.5, "vel_x peak {vmax}");
    assert!(snap.iter().all(|s| (25.0..25.5).contains(&s.temperature)));
    assert!(snap.iter().all(|s| (s.freq_x - 3.1).abs() < 1e-9));

    // Commission from a whole number of signal periods
    let window = &snap[..48];
    let mut baseline = BaselineModel::new(BaselineConfig::default());
    baseline.calculate(window).expect("lively window accepted");

    let mut detector = AnomalyDetector::new(
        DetectorConfig {
            min_consecutive: 3,
            ..DetectorConfig::default()
        },
        ThresholdConfig::default(),
    );
    detector.compute_thresholds(baseline.profile().expect("profile"));

    // The machine as captured is healthy
    let eval_window: Vec<Sample> = snap[snap.len() - 32..].to_vec();
    let latest = buffer.latest().expect("samples present");
    let report = detector
        .evaluate(&latest, &eval_window)
        .expect("commissioned");
    assert_eq!(report.score, 0.0, "healthy session: {report:#?}");

    // A velocity fault on the same machine trips the detector after the
    // debounce run
    let fault_window: Vec<Sample> = eval_window
        .iter()
        .map(|s| {
            let mut f = *s;
            f.vel_x *= 6.0;
            f.vel_y *= 6.0;
            f.vel_z *= 6.0;
            f
        })
        .collect();

    let mut last = AxisState::Normal;
    for i in 0..3 {
        let mut fault = fault_window[fault_window.len() - 1];
        fault.timestamp += 0.001 * f64::from(i);
        last = detector
            .evaluate(&fault, &fault_window)
            .expect("commissioned")
            .axis(Axis::VelocityY)
            .status;
    }
    assert_eq!(last, AxisState::Anomaly);

    let report = detector.history(1).pop().expect("history recorded");
    assert!((report.score - 30.0).abs() < 1e-9, "score {}", report.score);
}

#[test]
fn configuration_writes_are_echo_verified() {
    let mut transport = sim_transport();
    transport
        .write_register(registers::DETECTION_PERIOD, 5)
        .expect("write acknowledged");
    transport
        .write_register(registers::CUTOFF_FREQ_INT, 1000)
        .expect("write acknowledged");
}
