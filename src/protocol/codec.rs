//! Frame construction, checksum, and response parsing
//!
//! Pure functions — no I/O, no state. The transport layer feeds raw bytes
//! in and gets typed register words out.

use super::FrameError;

/// Function code: read holding registers
pub const READ_HOLDING_REGISTERS: u8 = 0x03;

/// Function code: write single register
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Every request frame is exactly 8 bytes (6-byte header + 2 checksum bytes).
pub const REQUEST_LEN: usize = 8;

/// Largest register count a read response can carry: the byte-count field
/// is a single byte, so 2×count must fit in 255. Modbus caps it at 125.
pub const MAX_READ_COUNT: u16 = 125;

/// CRC-16/MODBUS running checksum.
///
/// Init 0xFFFF; each byte XORed in, then eight shift-right steps applying
/// polynomial 0xA001 when the LSB is set. Transmitted little-endian
/// (low byte first) at the end of every frame.
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the checksum of `frame[..len-2]` into the trailing two bytes.
fn seal(frame: &mut [u8; REQUEST_LEN]) {
    let crc = checksum(&frame[..REQUEST_LEN - 2]);
    frame[6] = (crc & 0xFF) as u8;
    frame[7] = (crc >> 8) as u8;
}

/// Build a read-holding-registers request (function 0x03).
///
/// Fails when `count` is zero or would overflow the response byte-count
/// field.
pub fn build_read_request(
    device_id: u8,
    register: u16,
    count: u16,
) -> Result<[u8; REQUEST_LEN], FrameError> {
    if count == 0 || count > MAX_READ_COUNT {
        return Err(FrameError::CountOutOfRange(count));
    }

    let mut frame = [
        device_id,
        READ_HOLDING_REGISTERS,
        (register >> 8) as u8,
        (register & 0xFF) as u8,
        (count >> 8) as u8,
        (count & 0xFF) as u8,
        0,
        0,
    ];
    seal(&mut frame);
    Ok(frame)
}

/// Build a write-single-register request (function 0x06), value in place
/// of the register count.
pub fn build_write_request(device_id: u8, register: u16, value: u16) -> [u8; REQUEST_LEN] {
    let mut frame = [
        device_id,
        WRITE_SINGLE_REGISTER,
        (register >> 8) as u8,
        (register & 0xFF) as u8,
        (value >> 8) as u8,
        (value & 0xFF) as u8,
        0,
        0,
    ];
    seal(&mut frame);
    frame
}

/// Expected total length of a read response carrying `count` registers:
/// id + function + byte-count + 2×count data bytes + 2 checksum bytes.
pub const fn response_len(count: u16) -> usize {
    5 + 2 * count as usize
}

/// Parse and validate a read response.
///
/// Validation order: exact frame length, then checksum over everything but
/// the trailing two bytes, then the byte-count field, then the data region
/// split into big-endian signed 16-bit words.
pub fn parse_response(frame: &[u8], expected_count: u16) -> Result<Vec<i16>, FrameError> {
    let expected_len = response_len(expected_count);
    if frame.len() != expected_len {
        return Err(FrameError::ShortFrame {
            expected: expected_len,
            actual: frame.len(),
        });
    }

    verify_checksum(frame)?;

    let expected_bytes = (expected_count * 2) as u8;
    let byte_count = frame[2];
    if byte_count != expected_bytes {
        return Err(FrameError::CountMismatch {
            expected: expected_bytes,
            actual: byte_count,
        });
    }

    let words = frame[3..frame.len() - 2]
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(words)
}

/// Verify a write echo: the response must match the request byte-for-byte
/// (which also re-verifies the checksum over the same structure).
pub fn parse_write_echo(frame: &[u8], request: &[u8; REQUEST_LEN]) -> Result<(), FrameError> {
    if frame.len() != REQUEST_LEN {
        return Err(FrameError::ShortFrame {
            expected: REQUEST_LEN,
            actual: frame.len(),
        });
    }

    verify_checksum(frame)?;

    if frame != request {
        return Err(FrameError::EchoMismatch);
    }
    Ok(())
}

/// Re-derive the checksum over all but the trailing two bytes and compare
/// against the little-endian trailer.
fn verify_checksum(frame: &[u8]) -> Result<(), FrameError> {
    let body = &frame[..frame.len() - 2];
    let computed = checksum(body);
    let received = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }
    Ok(())
}

/// Encode a read response carrying the given register words (for testing
/// and simulation — the inverse of [`parse_response`]).
pub fn encode_read_response(device_id: u8, words: &[i16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(response_len(words.len() as u16));
    frame.push(device_id);
    frame.push(READ_HOLDING_REGISTERS);
    frame.push((words.len() * 2) as u8);
    for word in words {
        frame.extend_from_slice(&word.to_be_bytes());
    }
    let crc = checksum(&frame);
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_reference_vector() {
        // CRC-16/MODBUS check value for the ASCII string "123456789"
        assert_eq!(checksum(b"123456789"), 0x4B37);
    }

    #[test]
    fn read_request_layout() {
        let frame = build_read_request(0x50, 0x003A, 3).unwrap();
        assert_eq!(&frame[..6], &[0x50, 0x03, 0x00, 0x3A, 0x00, 0x03]);

        let crc = checksum(&frame[..6]);
        assert_eq!(frame[6], (crc & 0xFF) as u8);
        assert_eq!(frame[7], (crc >> 8) as u8);
    }

    #[test]
    fn read_request_rejects_bad_counts() {
        assert_eq!(
            build_read_request(0x50, 0x34, 0),
            Err(FrameError::CountOutOfRange(0))
        );
        assert_eq!(
            build_read_request(0x50, 0x34, MAX_READ_COUNT + 1),
            Err(FrameError::CountOutOfRange(MAX_READ_COUNT + 1))
        );
        assert!(build_read_request(0x50, 0x34, MAX_READ_COUNT).is_ok());
    }

    #[test]
    fn response_round_trips_register_words() {
        let words = [120_i16, -250, 0, i16::MAX, i16::MIN];
        let frame = encode_read_response(0x50, &words);
        assert_eq!(frame.len(), response_len(words.len() as u16));

        let parsed = parse_response(&frame, words.len() as u16).unwrap();
        assert_eq!(parsed, words);
    }

    #[test]
    fn response_rejects_wrong_length() {
        let frame = encode_read_response(0x50, &[1, 2, 3]);
        let err = parse_response(&frame[..frame.len() - 1], 3).unwrap_err();
        assert!(matches!(err, FrameError::ShortFrame { .. }));

        // Right bytes, wrong expectation
        let err = parse_response(&frame, 2).unwrap_err();
        assert!(matches!(err, FrameError::ShortFrame { .. }));
    }

    #[test]
    fn single_bit_flip_is_always_detected() {
        let frame = encode_read_response(0x50, &[1234, -567, 89]);
        for byte_idx in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte_idx] ^= 1 << bit;
                assert!(
                    parse_response(&corrupted, 3).is_err(),
                    "flip of byte {byte_idx} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn byte_count_field_is_checked() {
        let mut frame = encode_read_response(0x50, &[10, 20]);
        frame[2] = 6; // claim 3 registers in a 2-register frame
        // Re-seal so only the count field is wrong
        let crc = checksum(&frame[..frame.len() - 2]);
        let n = frame.len();
        frame[n - 2] = (crc & 0xFF) as u8;
        frame[n - 1] = (crc >> 8) as u8;

        assert_eq!(
            parse_response(&frame, 2),
            Err(FrameError::CountMismatch {
                expected: 4,
                actual: 6
            })
        );
    }

    #[test]
    fn write_echo_verification() {
        use crate::protocol::registers;

        let request = build_write_request(0x50, registers::BAUD, 0x0002);
        assert!(parse_write_echo(&request, &request).is_ok());

        // A valid frame that is not the request is rejected
        let other = build_write_request(0x50, registers::BAUD, 0x0003);
        assert_eq!(
            parse_write_echo(&other, &request),
            Err(FrameError::EchoMismatch)
        );

        // Corrupted echo fails the checksum first
        let mut corrupted = request;
        corrupted[4] ^= 0x01;
        assert!(matches!(
            parse_write_echo(&corrupted, &request),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }
}
