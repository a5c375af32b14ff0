//! Core data types shared across the monitoring pipeline

use serde::{Deserialize, Serialize};

/// One decoded sensor reading across all channels.
///
/// Produced by the polling collector from a full read cycle (velocity,
/// displacement, frequency, acceleration blocks plus the temperature
/// register). Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp (seconds, fractional)
    pub timestamp: f64,

    // === Acceleration (g) - registers 0x34..0x36 ===
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,

    // === Vibration velocity (mm/s) - registers 0x3A..0x3C ===
    pub vel_x: f64,
    pub vel_y: f64,
    pub vel_z: f64,

    // === Vibration displacement (µm) - registers 0x41..0x43 ===
    pub disp_x: f64,
    pub disp_y: f64,
    pub disp_z: f64,

    // === Vibration frequency (Hz) - registers 0x44..0x46 ===
    pub freq_x: f64,
    pub freq_y: f64,
    pub freq_z: f64,

    // === Chip temperature (°C) - register 0x40 ===
    pub temperature: f64,
}

impl Sample {
    /// Value of one detection axis in this sample.
    pub fn axis_value(&self, axis: Axis) -> f64 {
        match axis {
            Axis::VelocityX => self.vel_x,
            Axis::VelocityY => self.vel_y,
            Axis::VelocityZ => self.vel_z,
            Axis::DisplacementX => self.disp_x,
            Axis::DisplacementY => self.disp_y,
            Axis::DisplacementZ => self.disp_z,
            Axis::AccelerationX => self.accel_x,
            Axis::AccelerationY => self.accel_y,
            Axis::AccelerationZ => self.accel_z,
            Axis::Temperature => self.temperature,
        }
    }
}

/// One detection channel.
///
/// The frequency registers (0x44..0x46) are carried in [`Sample`] for
/// consumers but are not detection axes — the sensor already derives them
/// from the oscillatory channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "vx")]
    VelocityX,
    #[serde(rename = "vy")]
    VelocityY,
    #[serde(rename = "vz")]
    VelocityZ,
    #[serde(rename = "dx")]
    DisplacementX,
    #[serde(rename = "dy")]
    DisplacementY,
    #[serde(rename = "dz")]
    DisplacementZ,
    #[serde(rename = "ax")]
    AccelerationX,
    #[serde(rename = "ay")]
    AccelerationY,
    #[serde(rename = "az")]
    AccelerationZ,
    #[serde(rename = "temp")]
    Temperature,
}

impl Axis {
    /// All detection axes, in stable order. `index()` matches positions here.
    pub const ALL: [Axis; 10] = [
        Axis::VelocityX,
        Axis::VelocityY,
        Axis::VelocityZ,
        Axis::DisplacementX,
        Axis::DisplacementY,
        Axis::DisplacementZ,
        Axis::AccelerationX,
        Axis::AccelerationY,
        Axis::AccelerationZ,
        Axis::Temperature,
    ];

    /// Number of detection axes.
    pub const COUNT: usize = Self::ALL.len();

    /// Stable slot index for fixed per-axis arrays.
    pub const fn index(self) -> usize {
        match self {
            Axis::VelocityX => 0,
            Axis::VelocityY => 1,
            Axis::VelocityZ => 2,
            Axis::DisplacementX => 3,
            Axis::DisplacementY => 4,
            Axis::DisplacementZ => 5,
            Axis::AccelerationX => 6,
            Axis::AccelerationY => 7,
            Axis::AccelerationZ => 8,
            Axis::Temperature => 9,
        }
    }

    /// Short channel name used in the persisted baseline snapshot.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::VelocityX => "vx",
            Axis::VelocityY => "vy",
            Axis::VelocityZ => "vz",
            Axis::DisplacementX => "dx",
            Axis::DisplacementY => "dy",
            Axis::DisplacementZ => "dz",
            Axis::AccelerationX => "ax",
            Axis::AccelerationY => "ay",
            Axis::AccelerationZ => "az",
            Axis::Temperature => "temp",
        }
    }

    /// Parse a short channel name back into an axis.
    pub fn from_name(name: &str) -> Option<Axis> {
        Axis::ALL.iter().copied().find(|a| a.name() == name)
    }

    /// Oscillatory axes get rms-factor thresholds; the rest get mean+std.
    pub const fn is_oscillatory(self) -> bool {
        !matches!(self, Axis::Temperature)
    }

    /// Acceleration axes additionally carry high-frequency spectral energy.
    pub const fn is_acceleration(self) -> bool {
        matches!(
            self,
            Axis::AccelerationX | Axis::AccelerationY | Axis::AccelerationZ
        )
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_index_matches_all_order() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
        }
    }

    #[test]
    fn axis_name_round_trips() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_name(axis.name()), Some(axis));
        }
        assert_eq!(Axis::from_name("hx"), None);
    }

    #[test]
    fn axis_classes() {
        assert!(Axis::VelocityY.is_oscillatory());
        assert!(!Axis::Temperature.is_oscillatory());
        assert!(Axis::AccelerationZ.is_acceleration());
        assert!(!Axis::VelocityX.is_acceleration());
    }

    #[test]
    fn sample_axis_value_selects_channel() {
        let sample = Sample {
            timestamp: 1.0,
            vel_y: 2.5,
            temperature: 36.5,
            ..Sample::default()
        };
        assert_eq!(sample.axis_value(Axis::VelocityY), 2.5);
        assert_eq!(sample.axis_value(Axis::Temperature), 36.5);
        assert_eq!(sample.axis_value(Axis::AccelerationX), 0.0);
    }
}
