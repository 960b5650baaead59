//! Queued command protocol: commands accumulate in a FIFO and go out one at
//! a time, the next transmitted only after the previous reply (or its
//! timeout) has retired the one in flight.
//!
//! The wire format is identical to [`crate::proto`]; only the pacing
//! differs. Keeping at most one command outstanding is what lets replies be
//! matched to requests on a link with no sequence numbers.

use std::collections::VecDeque;

use embedded_io::{Read, Write};
use log::warn;
use strum_macros::EnumIter;

use crate::error::{Error, Result};
use crate::proto::{parse_reading, CurveTracer, MeasureResult, ERROR_MARKER};
use crate::transport::LineIo;
use crate::units;

/// The commands the firmware understands, by wire prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum CommandKind {
    SetBase,
    SetCollector,
    SetDiode,
    Measure,
}

impl CommandKind {
    pub fn prefix(self) -> char {
        match self {
            CommandKind::SetBase | CommandKind::SetDiode => 'B',
            CommandKind::SetCollector => 'C',
            CommandKind::Measure => 'M',
        }
    }

    /// Number of reply lines the firmware sends for this command.
    pub fn response_lines(self) -> usize {
        match self {
            CommandKind::Measure => 3,
            _ => 1,
        }
    }
}

/// One queued command, already encoded down to its integer code. `report`
/// controls whether its reply is surfaced to the caller; housekeeping
/// commands consume their acknowledge silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub code: u16,
    pub report: bool,
}

impl Command {
    pub fn set_base(amps: f64) -> Self {
        Self {
            kind: CommandKind::SetBase,
            code: units::base_current_code(amps),
            report: true,
        }
    }

    pub fn set_collector(volts: f64) -> Self {
        Self {
            kind: CommandKind::SetCollector,
            code: units::collector_voltage_code(volts),
            report: true,
        }
    }

    pub fn set_diode(amps: f64) -> Self {
        Self {
            kind: CommandKind::SetDiode,
            code: units::base_current_code(amps),
            report: true,
        }
    }

    pub fn measure() -> Self {
        Self {
            kind: CommandKind::Measure,
            code: 0,
            report: true,
        }
    }

    /// Consume the reply without reporting it.
    pub fn silent(mut self) -> Self {
        self.report = false;
        self
    }

    /// The line as it goes out on the wire, terminator excluded.
    pub fn wire(&self) -> String {
        match self.kind {
            CommandKind::Measure => "M".to_owned(),
            _ => format!("{}{}", self.kind.prefix(), self.code),
        }
    }
}

/// FIFO of pending commands plus the single in-flight slot.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<Command>,
    in_flight: Option<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: Command) {
        self.pending.push_back(cmd);
    }

    /// Promote the front command to in-flight. Returns `None` while another
    /// command is still awaiting its reply or the queue is empty.
    pub fn begin_transmit(&mut self) -> Option<Command> {
        if self.in_flight.is_some() {
            return None;
        }
        self.in_flight = self.pending.pop_front();
        self.in_flight
    }

    /// Retire the in-flight command, whether it completed or timed out. A
    /// retired command never completes later; any straggling reply bytes
    /// are flushed by the transport resync.
    pub fn retire(&mut self) -> Option<Command> {
        self.in_flight.take()
    }

    pub fn in_flight(&self) -> Option<Command> {
        self.in_flight
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none()
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

/// A completed exchange, as seen by callers draining the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Accepted(CommandKind),
    /// The device refused a set command. Non-fatal: it keeps its previous
    /// setting and the queue moves on.
    Rejected(CommandKind),
    Measurement(MeasureResult),
}

/// Queued protocol driver. Same wire behaviour as [`crate::proto::Tracer`],
/// but callers may stage several commands before any is transmitted.
pub struct QueuedTracer<S> {
    io: LineIo<S>,
    queue: CommandQueue,
}

impl<S: Read + Write> QueuedTracer<S> {
    pub fn new(link: S) -> Self {
        Self {
            io: LineIo::new(link),
            queue: CommandQueue::new(),
        }
    }

    pub fn enqueue(&mut self, cmd: Command) {
        self.queue.push(cmd);
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Transmit the front command if nothing is in flight. Returns whether
    /// a command actually went out.
    pub fn transmit_next(&mut self) -> Result<bool, S::Error> {
        let Some(cmd) = self.queue.begin_transmit() else {
            return Ok(false);
        };
        if let Err(err) = self.io.write_line(&cmd.wire()) {
            self.queue.retire();
            return Err(err);
        }
        Ok(true)
    }

    /// Block for the in-flight command's reply. The command is retired
    /// whatever the outcome; a timeout additionally resynchronizes the
    /// transport so its late reply cannot be matched to a later command.
    pub fn poll_response(&mut self) -> Result<Option<Reply>, S::Error> {
        let Some(cmd) = self.queue.in_flight() else {
            return Ok(None);
        };
        let outcome = self.read_reply(cmd);
        self.queue.retire();
        match outcome {
            Ok(reply) => Ok(cmd.report.then_some(reply)),
            Err(err) => {
                self.io.discard_input();
                Err(err)
            }
        }
    }

    fn read_reply(&mut self, cmd: Command) -> Result<Reply, S::Error> {
        // A rejected command answers with the error line alone, so the
        // status is checked before the remaining reply lines are awaited.
        let status = self.io.read_line()?;
        if status.starts_with(ERROR_MARKER) {
            if cmd.kind == CommandKind::Measure {
                return Err(Error::DeviceRejected(status));
            }
            warn!("device rejected {}: {status:?}", cmd.wire());
            return Ok(Reply::Rejected(cmd.kind));
        }

        let mut readings = Vec::new();
        for _ in 1..cmd.kind.response_lines() {
            readings.push(self.io.read_line()?);
        }
        match cmd.kind {
            CommandKind::Measure => {
                let base_v = readings
                    .first()
                    .and_then(|l| parse_reading(l))
                    .ok_or(Error::MalformedResponse)?;
                let emitter_v = readings
                    .get(1)
                    .and_then(|l| parse_reading(l))
                    .ok_or(Error::MalformedResponse)?;
                Ok(Reply::Measurement(MeasureResult {
                    valid: true,
                    base_v,
                    emitter_v,
                }))
            }
            _ => Ok(Reply::Accepted(cmd.kind)),
        }
    }

    /// Run the queue dry, collecting every reply in completion order.
    pub fn drain(&mut self) -> Result<Vec<Reply>, S::Error> {
        let mut replies = Vec::new();
        while !self.queue.is_idle() {
            self.transmit_next()?;
            if let Some(reply) = self.poll_response()? {
                replies.push(reply);
            }
        }
        Ok(replies)
    }

    pub fn into_inner(self) -> S {
        self.io.into_inner()
    }
}

impl<S> CurveTracer for QueuedTracer<S>
where
    S: Read + Write + Send,
    S::Error: Send,
{
    type Err = Error<S::Error>;

    fn set_base_current(&mut self, amps: f64) -> core::result::Result<(), Self::Err> {
        self.enqueue(Command::set_base(amps));
        self.drain().map(|_| ())
    }

    fn set_collector_voltage(&mut self, volts: f64) -> core::result::Result<(), Self::Err> {
        self.enqueue(Command::set_collector(volts));
        self.drain().map(|_| ())
    }

    fn set_diode_current(&mut self, amps: f64) -> core::result::Result<(), Self::Err> {
        self.enqueue(Command::set_diode(amps));
        self.drain().map(|_| ())
    }

    fn measure(&mut self) -> MeasureResult {
        self.enqueue(Command::measure());
        match self.drain() {
            Ok(replies) => replies
                .into_iter()
                .find_map(|reply| match reply {
                    Reply::Measurement(m) => Some(m),
                    Reply::Accepted(_) | Reply::Rejected(_) => None,
                })
                .unwrap_or(MeasureResult::INVALID),
            Err(err) => {
                warn!("queued measurement failed: {err}");
                MeasureResult::INVALID
            }
        }
    }
}
