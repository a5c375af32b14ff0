//! Serial transport — one request/response exchange per call
//!
//! Owns the physical connection to the sensor. Each call clears stale
//! input, writes one request frame, then accumulates bytes until the
//! exact expected response length arrives or the response deadline
//! elapses. Frame validation is delegated to [`crate::protocol`].
//!
//! The transport performs exactly one attempt per call; retry and backoff
//! policy belongs to the polling collector so it lives in one place.

use std::io;
use std::time::{Duration, Instant};

use crate::protocol::{
    build_read_request, build_write_request, parse_response, parse_write_echo, response_len,
    FrameError, REQUEST_LEN,
};

/// Default per-request response deadline.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Inter-byte poll timeout applied to the underlying port. The transport's
/// own deadline loop re-checks between polls, so this only bounds how long
/// a single blocking read can sit with no data.
pub const LINK_POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Transport-level failures. Recoverable by retrying the exchange;
/// sustained repetition escalates to connection-lost in the collector.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("response timeout: received {received} of {expected} bytes")]
    Timeout { expected: usize, received: usize },

    #[error("serial port failure: {0}")]
    Port(#[from] serialport::Error),

    #[error("serial I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Byte-level seam over the physical half-duplex link.
///
/// Implementations must return `Ok(0)` from [`read`](SerialLink::read) when
/// their own poll timeout elapses with no data, so the transport's deadline
/// loop stays in control of the overall response timeout.
pub trait SerialLink: Send {
    /// Write an entire frame to the link.
    fn write_all(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Read available bytes, blocking at most the link's poll timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Discard unread input left over from a previous exchange.
    fn discard_input(&mut self) -> io::Result<()>;

    /// Whether the physical link is currently usable.
    fn is_connected(&self) -> bool;
}

/// Production [`SerialLink`] over the `serialport` crate (RS-485 adapter,
/// 8 data bits / no parity / 1 stop bit).
pub struct SerialPortLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialPortLink {
    /// Open a serial device, e.g. `/dev/ttyUSB0` or `COM3`.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(LINK_POLL_TIMEOUT)
            .open()?;
        tracing::info!(path = %path, baud = baud_rate, "Serial port opened");
        Ok(Self { port })
    }
}

impl SerialLink for SerialPortLink {
    fn write_all(&mut self, frame: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, frame)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match io::Read::read(&mut self.port, buf) {
            Ok(n) => Ok(n),
            // Poll timeout with no data is not an error at this layer
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }

    fn is_connected(&self) -> bool {
        // An open handle is usable until an exchange fails; failures surface
        // per-call and feed the collector's consecutive-error escalation.
        true
    }
}

/// Request/response engine over a [`SerialLink`].
pub struct SerialTransport {
    link: Box<dyn SerialLink>,
    device_id: u8,
    response_timeout: Duration,
}

impl SerialTransport {
    pub fn new(link: Box<dyn SerialLink>, device_id: u8) -> Self {
        Self {
            link,
            device_id,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Set the per-request response deadline. Default is 1 s.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Device bus address this transport talks to.
    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// Whether the underlying link reports itself usable.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Read `count` consecutive holding registers starting at `register`.
    ///
    /// One attempt: stale input is discarded, the request written, and the
    /// exact-length response awaited until the deadline.
    pub fn read_registers(
        &mut self,
        register: u16,
        count: u16,
    ) -> Result<Vec<i16>, TransportError> {
        if !self.link.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let request = build_read_request(self.device_id, register, count)?;
        self.link.discard_input()?;
        self.link.write_all(&request)?;

        let frame = self.read_exact(response_len(count))?;
        let words = parse_response(&frame, count)?;

        tracing::trace!(
            register = format_args!("{register:#06x}"),
            count,
            "Register read complete"
        );
        Ok(words)
    }

    /// Write a single holding register and verify the echoed response.
    pub fn write_register(&mut self, register: u16, value: u16) -> Result<(), TransportError> {
        if !self.link.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let request = build_write_request(self.device_id, register, value);
        self.link.discard_input()?;
        self.link.write_all(&request)?;

        let frame = self.read_exact(REQUEST_LEN)?;
        parse_write_echo(&frame, &request)?;

        tracing::debug!(
            register = format_args!("{register:#06x}"),
            value,
            "Register write acknowledged"
        );
        Ok(())
    }

    /// Accumulate exactly `expected` bytes or fail with the byte count
    /// received so far once the deadline passes.
    fn read_exact(&mut self, expected: usize) -> Result<Vec<u8>, TransportError> {
        let mut frame = vec![0u8; expected];
        let mut received = 0usize;
        let deadline = Instant::now() + self.response_timeout;

        while received < expected {
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout { expected, received });
            }
            received += self.link.read(&mut frame[received..])?;
        }
        Ok(frame)
    }
}
