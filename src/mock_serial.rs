//! Scripted in-memory serial port used by unit tests.
//!
//! Replies are queued ahead of time as whole lines or raw bytes; reads hand
//! them back a few bytes at a time to exercise the partial-arrival handling
//! in the transport layer. An exhausted script reads as a timeout, which is
//! exactly what a silent device looks like.

/// Largest number of bytes a single `read` returns. Deliberately tiny so a
/// line always arrives in pieces.
const READ_CHUNK: usize = 3;

pub struct MockSerial {
    written: Vec<u8>,
    script: Vec<u8>,
    position: usize,
    fail_writes: Option<MockSerialError>,
    fail_reads: Option<MockSerialError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSerialError {
    /// The script ran out: a real port would sit silent until its timeout.
    Timeout,
    /// Injected hard I/O failure.
    Broken,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::Broken => embedded_io::ErrorKind::Other,
        }
    }
}

impl core::fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MockSerialError::Timeout => write!(f, "mock timeout"),
            MockSerialError::Broken => write!(f, "mock i/o failure"),
        }
    }
}

impl std::error::Error for MockSerialError {}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if let Some(err) = self.fail_writes {
            return Err(err);
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if let Some(err) = self.fail_writes {
            return Err(err);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if let Some(err) = self.fail_reads {
            return Err(err);
        }
        if self.position >= self.script.len() {
            return Err(MockSerialError::Timeout);
        }
        let remaining = self.script.len() - self.position;
        let n = buf.len().min(remaining).min(READ_CHUNK);
        buf[..n].copy_from_slice(&self.script[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            written: Vec::new(),
            script: Vec::new(),
            position: 0,
            fail_writes: None,
            fail_reads: None,
        }
    }

    /// Queue one reply line, terminator included.
    pub fn queue_line(&mut self, line: &str) {
        self.script.extend_from_slice(line.as_bytes());
        self.script.push(b'\n');
    }

    /// Queue raw bytes verbatim, e.g. a partial line with no terminator.
    pub fn queue_raw(&mut self, bytes: &[u8]) {
        self.script.extend_from_slice(bytes);
    }

    /// Everything the code under test has written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Written bytes split into terminator-free command lines.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written)
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Make every write (and flush) fail with `err`; `None` restores
    /// normal behaviour.
    pub fn set_write_error(&mut self, err: Option<MockSerialError>) {
        self.fail_writes = err;
    }

    pub fn set_read_error(&mut self, err: Option<MockSerialError>) {
        self.fail_reads = err;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};

    #[test]
    fn reads_come_back_chunked() {
        let mut mock = MockSerial::new();
        mock.queue_line("123456");
        let mut buf = [0u8; 16];
        let n = mock.read(&mut buf).unwrap();
        assert!(n <= READ_CHUNK);
    }

    #[test]
    fn exhausted_script_times_out() {
        let mut mock = MockSerial::new();
        let mut buf = [0u8; 4];
        assert!(matches!(mock.read(&mut buf), Err(MockSerialError::Timeout)));
    }

    #[test]
    fn captures_written_lines() {
        let mut mock = MockSerial::new();
        mock.write_all(b"B100\nC200\n").unwrap();
        assert_eq!(mock.written_lines(), vec!["B100", "C200"]);
    }

    #[test]
    fn injected_errors_surface() {
        let mut mock = MockSerial::new();
        mock.set_write_error(Some(MockSerialError::Timeout));
        assert_eq!(mock.write(b"x"), Err(MockSerialError::Timeout));
        mock.set_write_error(None);
        mock.set_read_error(Some(MockSerialError::Broken));
        let mut buf = [0u8; 1];
        assert_eq!(mock.read(&mut buf), Err(MockSerialError::Broken));
    }
}
