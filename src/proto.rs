//! The synchronous command protocol: one physical-unit operation maps to
//! one request/response exchange on the wire.
//!
//! Wire format (ASCII, `\n`-terminated):
//!
//! | Request      | Meaning                        | Reply            |
//! |--------------|--------------------------------|------------------|
//! | `B<µA>`      | set base / diode current       | one line         |
//! | `C<mV>`      | set collector voltage          | one line         |
//! | `M`          | take a measurement             | three lines      |
//!
//! A reply line starting with `-` is the firmware's error marker. The
//! measurement reply carries a status line, the base node voltage, and the
//! emitter shunt voltage.
//!
//! Because a reply is read before the next request is written, at most one
//! command is ever outstanding; request/response misalignment, the classic
//! failure mode of line-oriented serial protocols, cannot occur here. The
//! queued variant in [`crate::queue`] upholds the same invariant explicitly.

use embedded_io::{Read, Write};
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::LineIo;
use crate::units;

/// First character of a reply signalling rejection by the firmware.
pub const ERROR_MARKER: char = '-';

/// Which protocol encoding to drive the device with. Selected once at
/// configuration time; the two variants are never mixed on one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVariant {
    /// Write a command, then block for its reply.
    #[default]
    Synchronous,
    /// Enqueue commands and drain them one at a time ([`crate::queue`]).
    Queued,
}

/// Link and protocol settings, resolved once before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracerConfig {
    pub variant: ProtocolVariant,
    pub read_timeout: std::time::Duration,
    pub baud: u32,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            variant: ProtocolVariant::default(),
            read_timeout: crate::port::DEFAULT_READ_TIMEOUT,
            baud: crate::port::BAUD_RATE,
        }
    }
}

impl TracerConfig {
    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: std::time::Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }
}

/// One decoded measurement. Internal currency between the protocol layer
/// and the sweep engine; never crosses the crate boundary in results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureResult {
    pub valid: bool,
    /// Base node voltage, device units.
    pub base_v: f64,
    /// Voltage across the emitter shunt, device units.
    pub emitter_v: f64,
}

impl MeasureResult {
    pub const INVALID: Self = Self {
        valid: false,
        base_v: 0.0,
        emitter_v: 0.0,
    };
}

/// Parse a reading line: first whitespace-separated token as a number.
pub(crate) fn parse_reading(line: &str) -> Option<f64> {
    line.split_whitespace().next()?.parse::<i64>().ok().map(|v| v as f64)
}

/// Operations the sweep engine needs from a protocol implementation.
///
/// Both the synchronous [`Tracer`] and the queued
/// [`crate::queue::QueuedTracer`] implement this, so the engine and its
/// tests are generic over the variant.
pub trait CurveTracer: Send {
    type Err: core::fmt::Display + Send;

    fn set_base_current(&mut self, amps: f64) -> core::result::Result<(), Self::Err>;
    fn set_collector_voltage(&mut self, volts: f64) -> core::result::Result<(), Self::Err>;
    /// Diode sweeps step the base-current DAC; the independent variable is
    /// a current, so it rides the `B` channel.
    fn set_diode_current(&mut self, amps: f64) -> core::result::Result<(), Self::Err>;
    /// Take one measurement. Failures are folded into
    /// `MeasureResult::INVALID`; they never propagate as errors.
    fn measure(&mut self) -> MeasureResult;

    /// Drive both outputs to zero, returning the device to its quiescent
    /// state. Rejections are already logged below, and there is nothing
    /// more a caller could do with them on the way out of a sweep.
    fn quiesce(&mut self) {
        let _ = self.set_base_current(0.0);
        let _ = self.set_collector_voltage(0.0);
    }
}

/// Synchronous protocol driver. Owns the transport exclusively.
pub struct Tracer<S> {
    io: LineIo<S>,
}

impl<S: Read + Write> Tracer<S> {
    pub fn new(link: S) -> Self {
        Self {
            io: LineIo::new(link),
        }
    }

    fn exec_set(&mut self, prefix: char, code: u16) -> Result<(), S::Error> {
        self.io.write_line(&format!("{prefix}{code}"))?;
        let reply = self.io.read_line()?;
        if reply.starts_with(ERROR_MARKER) {
            // Rejection is non-fatal for set commands: the device keeps its
            // previous setting and the sweep goes on. Only transport
            // failures surface as errors here.
            warn!("device rejected {prefix}{code}: {reply:?}");
        }
        Ok(())
    }

    /// Program the base current DAC. Clamped to `[0, 5 mA]` silently.
    pub fn set_base_current(&mut self, amps: f64) -> Result<(), S::Error> {
        self.exec_set('B', units::base_current_code(amps))
    }

    /// Program the collector voltage DAC. Clamped to `[0, 20 V]` silently.
    pub fn set_collector_voltage(&mut self, volts: f64) -> Result<(), S::Error> {
        self.exec_set('C', units::collector_voltage_code(volts))
    }

    /// Request one measurement: status line, base reading, emitter reading.
    ///
    /// Any shortfall — a timeout, fewer than three lines, a rejected status,
    /// a non-numeric reading — yields `MeasureResult::INVALID` and
    /// resynchronizes the transport so a half-delivered reply cannot bleed
    /// into the next exchange.
    pub fn measure(&mut self) -> MeasureResult {
        match self.try_measure() {
            Ok(result) => result,
            Err(err) => {
                warn!("measurement failed: {err}");
                self.io.discard_input();
                MeasureResult::INVALID
            }
        }
    }

    fn try_measure(&mut self) -> Result<MeasureResult, S::Error> {
        self.io.write_line("M")?;
        let status = self.io.read_line()?;
        if status.starts_with(ERROR_MARKER) {
            return Err(Error::DeviceRejected(status));
        }
        let base_line = self.io.read_line()?;
        let emitter_line = self.io.read_line()?;
        let base_v = parse_reading(&base_line).ok_or(Error::MalformedResponse)?;
        let emitter_v = parse_reading(&emitter_line).ok_or(Error::MalformedResponse)?;
        debug!("measured base={base_v} emitter={emitter_v}");
        Ok(MeasureResult {
            valid: true,
            base_v,
            emitter_v,
        })
    }

    pub fn into_inner(self) -> S {
        self.io.into_inner()
    }
}

impl<S> CurveTracer for Tracer<S>
where
    S: Read + Write + Send,
    S::Error: Send,
{
    type Err = Error<S::Error>;

    fn set_base_current(&mut self, amps: f64) -> core::result::Result<(), Self::Err> {
        Tracer::set_base_current(self, amps)
    }

    fn set_collector_voltage(&mut self, volts: f64) -> core::result::Result<(), Self::Err> {
        Tracer::set_collector_voltage(self, volts)
    }

    fn set_diode_current(&mut self, amps: f64) -> core::result::Result<(), Self::Err> {
        Tracer::set_base_current(self, amps)
    }

    fn measure(&mut self) -> MeasureResult {
        Tracer::measure(self)
    }
}
