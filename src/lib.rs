//! Driver core for a microcontroller-based transistor curve tracer on a
//! serial link.
//!
//! The device speaks a small line-oriented ASCII protocol: `B<µA>` programs
//! the base/diode current, `C<mV>` the collector voltage, and `M` requests
//! a measurement of the base node and emitter shunt voltages. This crate
//! turns declarative sweep requests into that command sequence on a worker
//! thread and streams measured points back over a channel, tolerating
//! timeouts, line noise, and malformed replies.
//!
//! The serial port should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! Typical use: open a [`port::SerialLink`], wrap it in a
//! [`proto::Tracer`] (or [`queue::QueuedTracer`]), hand that to a
//! [`sweep::SweepEngine`], and poll [`SweepEngine::events`] from the
//! consumer side.
//!
//! [`SweepEngine::events`]: sweep::SweepEngine::events

pub mod channel;
pub mod error;
pub mod export;
pub mod port;
pub mod proto;
pub mod queue;
pub mod sink;
pub mod sweep;
pub mod transport;
pub mod units;

#[cfg(test)]
mod mock_serial;

pub use error::{Error, OpenError};
pub use proto::{CurveTracer, ProtocolVariant, Tracer, TracerConfig};
pub use queue::QueuedTracer;
pub use sink::{TraceRecorder, TraceSink};
pub use sweep::{DataPoint, SweepEngine, SweepEvent, SweepKind, SweepOutcome, SweepSpec};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::MockSerial;

    /// End-to-end: a diode sweep against a scripted device, through the
    /// real protocol stack.
    #[test]
    fn diode_sweep_end_to_end() {
        let mut mock = MockSerial::new();
        // Three points: a set acknowledge plus a three-line measurement
        // reply each, then the two quiesce acknowledges.
        for _ in 0..3 {
            mock.queue_line("0");
            mock.queue_line("0");
            mock.queue_line("1000");
            mock.queue_line("500");
        }
        mock.queue_line("0");
        mock.queue_line("0");

        let mut engine = SweepEngine::new(Tracer::new(mock));
        let events = engine.events();
        engine
            .start(SweepSpec {
                kind: SweepKind::Diode {
                    start_a: 0.0,
                    stop_a: 5.0e-3,
                },
                points: 3,
            })
            .unwrap();
        engine.join();

        let mut points = Vec::new();
        let mut outcome = None;
        while let Some(event) = events.try_pop() {
            match event {
                SweepEvent::Point(p) => points.push(p),
                SweepEvent::Finished { outcome: o } => outcome = Some(o),
                SweepEvent::Started(_) => {}
            }
        }

        assert_eq!(outcome, Some(SweepOutcome::Completed));
        assert_eq!(points.len(), 3);
        let commanded: Vec<f64> = points.iter().map(|p| p.base_current).collect();
        assert_eq!(commanded, vec![0.0, 2.5e-3, 5.0e-3]);
        for p in &points {
            assert_eq!(p.emitter_current, 500.0 / units::EMITTER_SHUNT_OHMS);
            assert_eq!(p.base_voltage, 500.0);
        }
    }

    /// A rejected set command mid-sweep is logged and skipped over; the
    /// sweep still runs to completion with every point.
    #[test]
    fn rejected_set_does_not_truncate_a_sweep() {
        let mut mock = MockSerial::new();
        // Point 0: set acknowledged, measurement valid.
        mock.queue_line("0");
        mock.queue_line("0");
        mock.queue_line("1000");
        mock.queue_line("500");
        // Point 1: the set is rejected, the measurement still valid.
        mock.queue_line("-1");
        mock.queue_line("0");
        mock.queue_line("1000");
        mock.queue_line("500");
        // Point 2 and the quiesce acknowledges.
        mock.queue_line("0");
        mock.queue_line("0");
        mock.queue_line("1000");
        mock.queue_line("500");
        mock.queue_line("0");
        mock.queue_line("0");

        let mut engine = SweepEngine::new(Tracer::new(mock));
        let events = engine.events();
        engine
            .start(SweepSpec {
                kind: SweepKind::Diode {
                    start_a: 0.0,
                    stop_a: 5.0e-3,
                },
                points: 3,
            })
            .unwrap();
        engine.join();

        let mut points = 0;
        let mut outcome = None;
        while let Some(event) = events.try_pop() {
            match event {
                SweepEvent::Point(_) => points += 1,
                SweepEvent::Finished { outcome: o } => outcome = Some(o),
                SweepEvent::Started(_) => {}
            }
        }
        assert_eq!(outcome, Some(SweepOutcome::Completed));
        assert_eq!(points, 3);
    }

    /// The same sweep through the queued protocol variant produces the
    /// same wire traffic and the same points.
    #[test]
    fn diode_sweep_end_to_end_queued() {
        let mut mock = MockSerial::new();
        for _ in 0..3 {
            mock.queue_line("0");
            mock.queue_line("0");
            mock.queue_line("1000");
            mock.queue_line("500");
        }
        mock.queue_line("0");
        mock.queue_line("0");

        let mut engine = SweepEngine::new(QueuedTracer::new(mock));
        let events = engine.events();
        engine
            .start(SweepSpec {
                kind: SweepKind::Diode {
                    start_a: 0.0,
                    stop_a: 5.0e-3,
                },
                points: 3,
            })
            .unwrap();
        engine.join();

        let mut points = 0;
        let mut outcome = None;
        while let Some(event) = events.try_pop() {
            match event {
                SweepEvent::Point(_) => points += 1,
                SweepEvent::Finished { outcome: o } => outcome = Some(o),
                SweepEvent::Started(_) => {}
            }
        }
        assert_eq!(outcome, Some(SweepOutcome::Completed));
        assert_eq!(points, 3);
    }
}
