//! Background polling collector
//!
//! Runs one dedicated worker thread that drives the fixed per-cycle read
//! sequence (velocity, displacement, frequency, acceleration blocks, then
//! the temperature register), assembles a composite [`Sample`], and pushes
//! it into the shared buffer. Consumers observe the session through a typed
//! event channel instead of callbacks.
//!
//! Failure semantics: a failed cycle is retried implicitly on the next
//! cycle (plus a small bounded per-block retry within the cycle). Failed
//! cycles apply a doubling backoff, and a run of
//! `max_consecutive_errors` failures is session-fatal: the worker emits
//! [`CollectorEvent::ConnectionLost`] once, clears the buffer, and exits.
//! Callers restart explicitly with a fresh transport.
//!
//! Cancellation is a polled atomic flag checked at the top of every cycle;
//! an in-flight read only honors it after its own bounded timeout elapses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::SampleBuffer;
use crate::config::CollectorConfig;
use crate::protocol::{convert, registers};
use crate::transport::{SerialTransport, TransportError};
use crate::types::Sample;

/// Collector lifecycle errors (distinct from per-cycle transport errors,
/// which are absorbed into counters and events).
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector already running")]
    AlreadyRunning,

    #[error("transport not connected")]
    NotConnected,

    #[error("worker did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectorState {
    Idle,
    Running,
    Stopping,
}

/// Broad classification of a cycle failure, for event consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Timeout,
    Frame,
    Port,
    NotConnected,
}

impl From<&TransportError> for ErrorKind {
    fn from(error: &TransportError) -> Self {
        match error {
            TransportError::Timeout { .. } => ErrorKind::Timeout,
            TransportError::Frame(_) => ErrorKind::Frame,
            TransportError::NotConnected => ErrorKind::NotConnected,
            TransportError::Port(_) | TransportError::Io(_) => ErrorKind::Port,
        }
    }
}

/// Typed notifications from the polling worker.
#[derive(Debug)]
pub enum CollectorEvent {
    /// A full cycle succeeded and this sample entered the buffer.
    Sample(Sample),
    /// A cycle failed; the session continues.
    Error { kind: ErrorKind, detail: String },
    /// Sustained failure — the session has ended. Sent exactly once.
    ConnectionLost,
}

/// Snapshot of collection statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatistics {
    pub total_readings: u64,
    pub failed_readings: u64,
    /// Percentage of successful cycles (0 when nothing was attempted)
    pub success_rate: f64,
    pub elapsed_secs: f64,
    pub buffer_len: usize,
    pub running: bool,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct StatsInner {
    total_readings: u64,
    failed_readings: u64,
    last_error: Option<String>,
    started_at: Option<Instant>,
}

/// Owns the polling worker for one sensor session.
///
/// `Idle → Running → Stopping → Idle`; a session also returns to `Idle` on
/// its own when sustained failure ends it.
pub struct PollingCollector {
    config: CollectorConfig,
    buffer: Arc<SampleBuffer>,
    cancel: Arc<AtomicBool>,
    stats: Arc<Mutex<StatsInner>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PollingCollector {
    pub fn new(config: CollectorConfig, buffer: Arc<SampleBuffer>) -> Self {
        Self {
            config,
            buffer,
            cancel: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(StatsInner::default())),
            worker: None,
        }
    }

    /// The buffer this collector fills.
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CollectorState {
        match &self.worker {
            None => CollectorState::Idle,
            Some(handle) if handle.is_finished() => CollectorState::Idle,
            Some(_) if self.cancel.load(Ordering::Relaxed) => CollectorState::Stopping,
            Some(_) => CollectorState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == CollectorState::Running
    }

    /// Start a polling session over `transport`.
    ///
    /// Fails if a session is already running or the transport is not
    /// connected. Counters reset; the returned channel carries this
    /// session's events.
    pub fn start(
        &mut self,
        transport: SerialTransport,
    ) -> Result<Receiver<CollectorEvent>, CollectorError> {
        // Reap a worker that already exited on its own
        if let Some(handle) = self.worker.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                self.worker = Some(handle);
                return Err(CollectorError::AlreadyRunning);
            }
        }

        if !transport.is_connected() {
            return Err(CollectorError::NotConnected);
        }

        {
            let mut stats = lock_stats(&self.stats);
            *stats = StatsInner {
                started_at: Some(Instant::now()),
                ..StatsInner::default()
            };
        }
        self.cancel.store(false, Ordering::Relaxed);

        let (events, receiver) = mpsc::channel();
        let worker = Worker {
            transport,
            buffer: Arc::clone(&self.buffer),
            events,
            cancel: Arc::clone(&self.cancel),
            stats: Arc::clone(&self.stats),
            config: self.config.clone(),
        };

        let handle = thread::Builder::new()
            .name("vibromon-poller".to_string())
            .spawn(move || worker.run())?;
        self.worker = Some(handle);

        info!(
            interval_ms = self.config.collection_interval_ms,
            "Polling session started"
        );
        Ok(receiver)
    }

    /// Signal cancellation and join the worker with a bounded wait.
    ///
    /// On timeout the handle is kept so `stop` can be retried; the worker
    /// will still exit once its in-flight read times out.
    pub fn stop(&mut self) -> Result<(), CollectorError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        self.cancel.store(true, Ordering::Relaxed);

        let timeout = self.config.stop_timeout();
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        if handle.is_finished() {
            let _ = handle.join();
            info!("Polling session stopped");
            Ok(())
        } else {
            warn!(timeout_ms = timeout.as_millis() as u64, "Worker did not stop in time");
            self.worker = Some(handle);
            Err(CollectorError::StopTimeout(timeout))
        }
    }

    /// Snapshot of session statistics.
    pub fn statistics(&self) -> CollectorStatistics {
        let stats = lock_stats(&self.stats);
        let attempted = stats.total_readings + stats.failed_readings;
        let success_rate = if attempted > 0 {
            stats.total_readings as f64 / attempted as f64 * 100.0
        } else {
            0.0
        };
        CollectorStatistics {
            total_readings: stats.total_readings,
            failed_readings: stats.failed_readings,
            success_rate,
            elapsed_secs: stats
                .started_at
                .map_or(0.0, |t| t.elapsed().as_secs_f64()),
            buffer_len: self.buffer.len(),
            running: matches!(self.state(), CollectorState::Running),
            last_error: stats.last_error.clone(),
        }
    }
}

impl Drop for PollingCollector {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}

fn lock_stats(stats: &Mutex<StatsInner>) -> std::sync::MutexGuard<'_, StatsInner> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State moved onto the worker thread for one session.
struct Worker {
    transport: SerialTransport,
    buffer: Arc<SampleBuffer>,
    events: Sender<CollectorEvent>,
    cancel: Arc<AtomicBool>,
    stats: Arc<Mutex<StatsInner>>,
    config: CollectorConfig,
}

impl Worker {
    fn run(mut self) {
        let interval = self.config.collection_interval();
        let mut consecutive_errors: u32 = 0;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                debug!("Cancellation observed, worker exiting");
                break;
            }

            if consecutive_errors >= self.config.max_consecutive_errors {
                warn!(
                    consecutive_errors,
                    "Sustained failure — declaring connection lost"
                );
                let _ = self.events.send(CollectorEvent::ConnectionLost);
                // Session data does not outlive its connection
                self.buffer.clear();
                break;
            }

            let cycle_start = Instant::now();

            if !self.transport.is_connected() {
                consecutive_errors += 1;
                self.record_failure(&TransportError::NotConnected);
                thread::sleep(interval);
                continue;
            }

            match self.read_cycle() {
                Ok(sample) => {
                    self.buffer.push(sample);
                    consecutive_errors = 0;
                    {
                        let mut stats = lock_stats(&self.stats);
                        stats.total_readings += 1;
                    }
                    let _ = self.events.send(CollectorEvent::Sample(sample));

                    // Approximate the target cadence regardless of read latency
                    let elapsed = cycle_start.elapsed();
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
                Err(error) => {
                    consecutive_errors += 1;
                    self.record_failure(&error);

                    // Doubling backoff, capped
                    let shift = consecutive_errors.saturating_sub(1).min(16);
                    let backoff = interval
                        .saturating_mul(1u32 << shift)
                        .min(self.config.max_backoff());
                    debug!(
                        consecutive_errors,
                        backoff_ms = backoff.as_millis() as u64,
                        "Cycle failed, backing off"
                    );
                    thread::sleep(backoff);
                }
            }
        }
    }

    /// The fixed read sequence for one composite sample.
    fn read_cycle(&mut self) -> Result<Sample, TransportError> {
        let velocity = self.read_block(registers::VX, 3)?;
        let displacement = self.read_block(registers::DX, 3)?;
        let frequency = self.read_block(registers::HX, 3)?;
        let acceleration = self.read_block(registers::AX, 3)?;
        let temperature = self.read_block(registers::TEMP, 1)?;

        Ok(Sample {
            timestamp: unix_now(),
            vel_x: convert::velocity_mm_s(velocity[0]),
            vel_y: convert::velocity_mm_s(velocity[1]),
            vel_z: convert::velocity_mm_s(velocity[2]),
            disp_x: convert::displacement_um(displacement[0]),
            disp_y: convert::displacement_um(displacement[1]),
            disp_z: convert::displacement_um(displacement[2]),
            freq_x: convert::frequency_hz(frequency[0]),
            freq_y: convert::frequency_hz(frequency[1]),
            freq_z: convert::frequency_hz(frequency[2]),
            accel_x: convert::acceleration_g(acceleration[0]),
            accel_y: convert::acceleration_g(acceleration[1]),
            accel_z: convert::acceleration_g(acceleration[2]),
            temperature: convert::temperature_c(temperature[0]),
        })
    }

    /// One register block with bounded in-cycle retries. The transport
    /// itself performs exactly one attempt per call.
    fn read_block(&mut self, register: u16, count: u16) -> Result<Vec<i16>, TransportError> {
        let attempts = self.config.read_retries.max(1);
        let mut attempt = 0;
        loop {
            match self.transport.read_registers(register, count) {
                Ok(words) => return Ok(words),
                Err(error) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(error);
                    }
                    debug!(
                        register = format_args!("{register:#06x}"),
                        attempt,
                        error = %error,
                        "Register block retry"
                    );
                }
            }
        }
    }

    fn record_failure(&self, error: &TransportError) {
        let detail = error.to_string();
        {
            let mut stats = lock_stats(&self.stats);
            stats.failed_readings += 1;
            stats.last_error = Some(detail.clone());
        }
        let _ = self.events.send(CollectorEvent::Error {
            kind: ErrorKind::from(error),
            detail,
        });
    }
}

/// Current Unix time as fractional seconds.
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
