//! Modbus RTU wire protocol for the WTVB01-485 vibration sensor
//!
//! Request/response framing over a half-duplex RS-485 link:
//!
//! - request:  `[id][fn][reg_hi][reg_lo][cnt_hi][cnt_lo][crc_lo][crc_hi]`
//! - response: `[id][fn][byte_count][data: 2*count bytes, big-endian][crc_lo][crc_hi]`
//!
//! Function 0x03 reads holding registers; function 0x06 writes a single
//! register and the response echoes the request byte-for-byte.
//!
//! This module is pure — framing, checksum, and unit conversion only.
//! All I/O lives in [`crate::transport`].

mod codec;

pub use codec::{
    build_read_request, build_write_request, checksum, encode_read_response, parse_response,
    parse_write_echo, response_len, MAX_READ_COUNT, READ_HOLDING_REGISTERS, REQUEST_LEN,
    WRITE_SINGLE_REGISTER,
};

use thiserror::Error;

/// Protocol-level frame violations. Always recoverable by retrying the
/// request; never fatal on their own.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("short frame: expected {expected} bytes, got {actual}")]
    ShortFrame { expected: usize, actual: usize },

    #[error("checksum mismatch: computed {computed:#06x}, frame carries {received:#06x}")]
    ChecksumMismatch { computed: u16, received: u16 },

    #[error("byte-count mismatch: expected {expected}, frame carries {actual}")]
    CountMismatch { expected: u8, actual: u8 },

    #[error("register count {0} out of range (1..={MAX_READ_COUNT})")]
    CountOutOfRange(u16),

    #[error("write echo does not match request")]
    EchoMismatch,
}

/// Holding-register addresses (device manual, WTVB01-485).
pub mod registers {
    /// Unlock/save control register (write path)
    pub const SAVE: u16 = 0x00;
    /// Baud-rate select (write path)
    pub const BAUD: u16 = 0x04;
    /// Device bus address (write path)
    pub const DEVICE_ADDR: u16 = 0x1A;
    /// X-axis acceleration
    pub const AX: u16 = 0x34;
    /// Y-axis acceleration
    pub const AY: u16 = 0x35;
    /// Z-axis acceleration
    pub const AZ: u16 = 0x36;
    /// X-axis vibration velocity
    pub const VX: u16 = 0x3A;
    /// Y-axis vibration velocity
    pub const VY: u16 = 0x3B;
    /// Z-axis vibration velocity
    pub const VZ: u16 = 0x3C;
    /// Chip temperature
    pub const TEMP: u16 = 0x40;
    /// X-axis vibration displacement
    pub const DX: u16 = 0x41;
    /// Y-axis vibration displacement
    pub const DY: u16 = 0x42;
    /// Z-axis vibration displacement
    pub const DZ: u16 = 0x43;
    /// X-axis vibration frequency
    pub const HX: u16 = 0x44;
    /// Y-axis vibration frequency
    pub const HY: u16 = 0x45;
    /// Z-axis vibration frequency
    pub const HZ: u16 = 0x46;
    /// Cutoff frequency, integer part (write path)
    pub const CUTOFF_FREQ_INT: u16 = 0x63;
    /// Cutoff frequency, fractional part (write path)
    pub const CUTOFF_FREQ_FRAC: u16 = 0x64;
    /// Detection period (write path)
    pub const DETECTION_PERIOD: u16 = 0x65;
}

/// Raw register word → engineering unit conversions.
///
/// Scale factors come from the manufacturer protocol: values are transmitted
/// as scaled signed 16-bit integers.
pub mod convert {
    /// Acceleration: raw / 32768 × 16 g (±16 g full scale)
    pub fn acceleration_g(raw: i16) -> f64 {
        f64::from(raw) / 32768.0 * 16.0
    }

    /// Vibration velocity: raw / 100 mm/s
    pub fn velocity_mm_s(raw: i16) -> f64 {
        f64::from(raw) / 100.0
    }

    /// Vibration displacement: raw µm
    pub fn displacement_um(raw: i16) -> f64 {
        f64::from(raw)
    }

    /// Vibration frequency: raw / 10 Hz
    pub fn frequency_hz(raw: i16) -> f64 {
        f64::from(raw) / 10.0
    }

    /// Chip temperature: raw / 100 °C
    pub fn temperature_c(raw: i16) -> f64 {
        f64::from(raw) / 100.0
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn scale_factors() {
            assert!((acceleration_g(16384) - 8.0).abs() < 1e-9);
            assert!((velocity_mm_s(-250) - -2.5).abs() < 1e-9);
            assert!((displacement_um(42) - 42.0).abs() < 1e-9);
            assert!((frequency_hz(505) - 50.5).abs() < 1e-9);
            assert!((temperature_c(2365) - 23.65).abs() < 1e-9);
        }
    }
}
