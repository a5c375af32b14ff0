//! Thread-safe bounded sample store
//!
//! A fixed arena ring with head/len counters behind a single mutex. The
//! polling worker pushes; readers pull consistent copies. The lock is held
//! only long enough to copy or mutate the ring — never across I/O — and
//! every public read returns owned data, so callers can never observe a
//! half-written sample.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::types::Sample;

/// Bounded circular store of decoded samples.
///
/// Insertion order is arrival order; the oldest sample is evicted once the
/// ring is full.
pub struct SampleBuffer {
    inner: Mutex<Ring>,
}

struct Ring {
    slots: Vec<Sample>,
    /// Index of the oldest sample
    head: usize,
    /// Number of live samples (≤ capacity)
    len: usize,
}

impl Ring {
    fn iter(&self) -> impl Iterator<Item = &Sample> {
        let cap = self.slots.len();
        (0..self.len).map(move |i| &self.slots[(self.head + i) % cap])
    }
}

impl SampleBuffer {
    /// Create a buffer holding at most `capacity` samples (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Ring {
                slots: vec![Sample::default(); capacity],
                head: 0,
                len: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a sample, evicting the oldest when full. O(1).
    pub fn push(&self, sample: Sample) {
        let mut ring = self.lock();
        let cap = ring.slots.len();
        if ring.len < cap {
            let tail = (ring.head + ring.len) % cap;
            ring.slots[tail] = sample;
            ring.len += 1;
        } else {
            let head = ring.head;
            ring.slots[head] = sample;
            ring.head = (head + 1) % cap;
        }
    }

    /// Number of live samples.
    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of samples the ring can hold.
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// Drop all samples (used on disconnect).
    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.head = 0;
        ring.len = 0;
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<Sample> {
        let ring = self.lock();
        if ring.len == 0 {
            return None;
        }
        let cap = ring.slots.len();
        Some(ring.slots[(ring.head + ring.len - 1) % cap])
    }

    /// Consistent copy of all samples, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().iter().copied().collect()
    }

    /// The most recent `n` samples, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<Sample> {
        let ring = self.lock();
        let skip = ring.len.saturating_sub(n);
        ring.iter().skip(skip).copied().collect()
    }

    /// Samples with `start ≤ timestamp ≤ end`, in insertion order.
    ///
    /// Linear scan — acceptable for the bounded capacities used here.
    pub fn time_range(&self, start: f64, end: f64) -> Vec<Sample> {
        self.lock()
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .copied()
            .collect()
    }

    /// Min/max/avg/current summary for the three velocity channels.
    pub fn velocity_stats(&self) -> TriAxisStats {
        self.tri_stats(|s| (s.vel_x, s.vel_y, s.vel_z))
    }

    /// Min/max/avg/current summary for the three displacement channels.
    pub fn displacement_stats(&self) -> TriAxisStats {
        self.tri_stats(|s| (s.disp_x, s.disp_y, s.disp_z))
    }

    /// Min/max/avg/current summary for the three frequency channels.
    pub fn frequency_stats(&self) -> TriAxisStats {
        self.tri_stats(|s| (s.freq_x, s.freq_y, s.freq_z))
    }

    /// Min/max/avg/current summary for the temperature channel.
    pub fn temperature_stats(&self) -> ChannelStats {
        let values: Vec<f64> = {
            let ring = self.lock();
            ring.iter().map(|s| s.temperature).collect()
        };
        ChannelStats::from_values(&values)
    }

    /// Acceleration amplitude per axis over the last `window` samples,
    /// as peak-to-peak / 2. Returns zeros with fewer than two samples.
    pub fn acceleration_amplitudes(&self, window: usize) -> (f64, f64, f64) {
        let recent = self.last_n(window);
        if recent.len() < 2 {
            return (0.0, 0.0, 0.0);
        }
        let amp = |extract: fn(&Sample) -> f64| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for s in &recent {
                let v = extract(s);
                min = min.min(v);
                max = max.max(v);
            }
            (max - min) / 2.0
        };
        (amp(|s| s.accel_x), amp(|s| s.accel_y), amp(|s| s.accel_z))
    }

    fn tri_stats(&self, extract: fn(&Sample) -> (f64, f64, f64)) -> TriAxisStats {
        // Copy out under the lock, compute outside it.
        let values: Vec<(f64, f64, f64)> = {
            let ring = self.lock();
            ring.iter().map(extract).collect()
        };
        let xs: Vec<f64> = values.iter().map(|v| v.0).collect();
        let ys: Vec<f64> = values.iter().map(|v| v.1).collect();
        let zs: Vec<f64> = values.iter().map(|v| v.2).collect();
        TriAxisStats {
            x: ChannelStats::from_values(&xs),
            y: ChannelStats::from_values(&ys),
            z: ChannelStats::from_values(&zs),
        }
    }
}

/// Summary statistics for one channel over the buffered window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Most recent value
    pub current: f64,
}

impl ChannelStats {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        Self {
            min,
            max,
            avg: sum / values.len() as f64,
            current: values[values.len() - 1],
        }
    }
}

/// Per-axis summaries for a three-channel group.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TriAxisStats {
    pub x: ChannelStats,
    pub y: ChannelStats,
    pub z: ChannelStats,
}
