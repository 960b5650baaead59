//! Real serial port backing for the transport layer.
//!
//! Adapts the [`serialport`] crate to the [`embedded_io`] traits the rest of
//! the crate is generic over. Opening configures the tracer's fixed line
//! settings (115200 baud, 8 data bits, no parity) and flushes any stale
//! bytes a previous session may have left in the OS buffer.

use std::time::Duration;

use log::debug;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort};

use crate::error::OpenError;

pub const BAUD_RATE: u32 = 115_200;

/// Default per-operation read timeout. The firmware answers well within a
/// second; two seconds distinguishes a dead device from a slow one.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// An open (or deliberately closed) serial connection to the tracer.
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    /// Open `path` with the tracer's fixed line settings and the default
    /// read timeout.
    pub fn open(path: &str) -> Result<Self, OpenError> {
        Self::open_with(path, BAUD_RATE, DEFAULT_READ_TIMEOUT)
    }

    pub fn open_with(path: &str, baud: u32, read_timeout: Duration) -> Result<Self, OpenError> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .timeout(read_timeout)
            .open()?;
        // Stale data from a previous session must not be parsed as a
        // response to our first command.
        port.clear(ClearBuffer::Input)?;
        debug!("opened {path} at {baud} baud");
        Ok(Self { port: Some(port) })
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Close the connection. Idempotent; safe when never opened.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("serial link closed");
        }
    }
}

/// Transport error wrapper carrying the underlying I/O error, with the
/// closed-link case folded in so reads on a closed link fail cleanly
/// instead of panicking.
#[derive(Debug)]
pub enum LinkError {
    Io(std::io::Error),
    Closed,
}

impl embedded_io::Error for LinkError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            LinkError::Io(err) => match err.kind() {
                std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
                std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
                std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
                std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
                std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
                _ => embedded_io::ErrorKind::Other,
            },
            LinkError::Closed => embedded_io::ErrorKind::NotConnected,
        }
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkError::Io(err) => write!(f, "{err}"),
            LinkError::Closed => write!(f, "serial link is closed"),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::Io(err) => Some(err),
            LinkError::Closed => None,
        }
    }
}

impl embedded_io::ErrorType for SerialLink {
    type Error = LinkError;
}

impl embedded_io::Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let port = self.port.as_mut().ok_or(LinkError::Closed)?;
        std::io::Read::read(port, buf).map_err(LinkError::Io)
    }
}

impl embedded_io::Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let port = self.port.as_mut().ok_or(LinkError::Closed)?;
        std::io::Write::write(port, buf).map_err(LinkError::Io)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let port = self.port.as_mut().ok_or(LinkError::Closed)?;
        std::io::Write::flush(port).map_err(LinkError::Io)
    }
}

/// Names of serial ports present on this machine, for connect pickers.
pub fn available_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}
