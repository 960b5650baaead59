//! Line-oriented transport over any [`embedded_io`] byte stream.
//!
//! The tracer speaks newline-terminated ASCII, but the underlying stream
//! delivers bytes in arbitrary chunks: a single response line may arrive
//! across many small reads, and electrical noise can inject garbage bytes.
//! [`LineIo`] buffers incoming bytes, splits them on line terminators, and
//! filters each line down to the characters the protocol actually allows.

use embedded_io::{Read, Write};
use log::trace;

use crate::error::{Error, Result};

/// Characters accepted in a response payload: digits, tab, and space, plus
/// the leading `-` error marker. Anything else is treated as line noise and
/// dropped before numeric parsing.
fn is_payload_byte(byte: u8) -> bool {
    byte.is_ascii_digit() || byte == b'\t' || byte == b' ' || byte == b'-'
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Buffered line reader/writer owning the byte stream exclusively.
pub struct LineIo<S> {
    inner: S,
    buf: Vec<u8>,
}

impl<S: Read + Write> LineIo<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(128),
        }
    }

    /// Write one command line, appending the terminator, and flush.
    pub fn write_line(&mut self, text: &str) -> Result<(), S::Error> {
        trace!("tx: {text:?}");
        self.inner
            .write_all(text.as_bytes())
            .map_err(Error::from_write)?;
        self.inner.write_all(b"\n").map_err(Error::from_write)?;
        self.inner.flush().map_err(Error::from_write)?;
        Ok(())
    }

    /// Read one response line, blocking until a terminator arrives or the
    /// stream's read timeout elapses with no further bytes.
    ///
    /// Trailing terminators are discarded and the payload is filtered to the
    /// protocol's accepted characters. Partially received bytes stay
    /// buffered across calls.
    pub fn read_line(&mut self) -> Result<String, S::Error> {
        loop {
            // Terminator runs left over from a previous line ("\r\n").
            while self.buf.first().is_some_and(|&b| is_terminator(b)) {
                self.buf.remove(0);
            }

            if let Some(end) = self.buf.iter().position(|&b| is_terminator(b)) {
                let line: String = self
                    .buf
                    .drain(..=end)
                    .take(end)
                    .filter(|&b| is_payload_byte(b))
                    .map(char::from)
                    .collect();
                trace!("rx: {line:?}");
                return Ok(line);
            }

            let mut chunk = [0u8; 64];
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(Error::ReadTimeout),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err) => return Err(Error::from_read(err)),
            }
        }
    }

    /// Drop all buffered input, then drain whatever the stream still has
    /// pending. Used to resynchronize after a partial measurement so stale
    /// bytes cannot be mistaken for the next command's response.
    pub fn discard_input(&mut self) {
        self.buf.clear();
        let mut chunk = [0u8; 64];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    #[cfg(test)]
    pub(crate) fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}
