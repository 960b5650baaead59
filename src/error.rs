//! Error types for curve tracer communications.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Errors raised while talking to the tracer over an already-open link.
///
/// Generic over the transport's own error type so the protocol layer works
/// with any [`embedded_io`] implementation, real serial port or test mock.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("serial communication error: {0:?}")]
    Serial(I),
    #[error("no complete response line before the read timeout")]
    ReadTimeout,
    #[error("write did not complete before the write timeout")]
    WriteTimeout,
    /// The device answered with its error marker (`-` prefix). Non-fatal for
    /// "set" commands; the sweep engine decides whether to continue.
    #[error("device rejected command: {0:?}")]
    DeviceRejected(String),
    #[error("malformed device response")]
    MalformedResponse,
}

impl<I: embedded_io::Error> Error<I> {
    /// Classify a raw transport error, folding timeouts into their own
    /// variants so callers never have to inspect `ErrorKind` themselves.
    pub(crate) fn from_read(err: I) -> Self {
        match err.kind() {
            embedded_io::ErrorKind::TimedOut => Error::ReadTimeout,
            _ => Error::Serial(err),
        }
    }

    pub(crate) fn from_write(err: I) -> Self {
        match err.kind() {
            embedded_io::ErrorKind::TimedOut => Error::WriteTimeout,
            _ => Error::Serial(err),
        }
    }
}

/// Failure to open the serial device at all. Fatal to the connect attempt
/// and surfaced directly at the call site, unlike [`Error`] which is
/// absorbed into sentinel results below the sweep engine.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("serial port unavailable: {0}")]
    PortUnavailable(#[from] serialport::Error),
}
