//! Sweep engine: runs one characteristic-curve sweep on a worker thread,
//! streaming points into an [`EventQueue`] as they are measured.
//!
//! One sweep owns the tracer for its whole duration; starting a new sweep
//! first joins the previous worker, so two sweeps can never interleave
//! their commands on the wire. Every exit path, completed, cancelled or
//! aborted, drives both outputs back to zero before the worker finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use log::{info, warn};
use thiserror::Error;

use crate::channel::EventQueue;
use crate::proto::CurveTracer;
use crate::units;

/// What a sweep steps and what it holds fixed. All quantities are physical
/// units; encoding to device codes happens in the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepKind {
    /// Hold the base current, step the collector voltage. One output curve
    /// of a transistor; run repeatedly at different base currents for a
    /// full family.
    Collector {
        base_current_a: f64,
        start_v: f64,
        stop_v: f64,
    },
    /// Hold the collector voltage, step the base current.
    Base {
        collector_voltage_v: f64,
        start_a: f64,
        stop_a: f64,
    },
    /// Step the current through a two-terminal device.
    Diode { start_a: f64, stop_a: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSpec {
    pub kind: SweepKind,
    pub points: u16,
}

/// One measured point of a sweep. Drive values are the commanded setpoints;
/// voltages are the device's readback in its native units.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub base_current: f64,
    pub collector_voltage: f64,
    pub base_voltage: f64,
    pub emitter_voltage: f64,
    pub emitter_current: f64,
    /// Curve label, set on the final point of a sweep only.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed,
    /// Stopped early on request; points already emitted remain valid.
    Cancelled,
    /// Stopped early because a measurement came back invalid.
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent {
    Started(SweepSpec),
    Point(DataPoint),
    Finished { outcome: SweepOutcome },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SweepError {
    /// A sweep interpolates between two endpoints, which takes at least two
    /// points.
    #[error("a sweep needs at least 2 points, got {points}")]
    TooFewPoints { points: u16 },
}

/// Linear interpolation with exact endpoints: `t = 0` yields `start` and
/// `t = 1` yields `stop` with no floating-point drift.
pub fn interpolate(start: f64, stop: f64, index: u16, points: u16) -> f64 {
    let t = f64::from(index) / f64::from(points - 1);
    start * (1.0 - t) + stop * t
}

fn lock_tracer<T>(tracer: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-sweep poisons the mutex; the device state is recovered by
    // the next quiesce, so keep going with the inner value.
    tracer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SweepEngine<T> {
    tracer: Arc<Mutex<T>>,
    events: EventQueue<SweepEvent>,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<T: CurveTracer + 'static> SweepEngine<T> {
    pub fn new(tracer: T) -> Self {
        Self {
            tracer: Arc::new(Mutex::new(tracer)),
            events: EventQueue::new(),
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// A consumer-side handle onto the event stream.
    pub fn events(&self) -> EventQueue<SweepEvent> {
        self.events.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the current sweep to stop after the point in progress.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Block until the current sweep's worker has finished.
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            // The worker holds no locks at exit; join fails only if it
            // panicked, and the poisoned-mutex path already covers that.
            let _ = worker.join();
        }
    }

    /// Start a sweep on a fresh worker thread. If a sweep is still running
    /// this blocks until it has fully finished, so sweeps never overlap.
    pub fn start(&mut self, spec: SweepSpec) -> Result<(), SweepError> {
        if spec.points < 2 {
            return Err(SweepError::TooFewPoints {
                points: spec.points,
            });
        }
        self.join();
        self.cancel.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);

        let tracer = Arc::clone(&self.tracer);
        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        let cancel = Arc::clone(&self.cancel);
        self.worker = Some(std::thread::spawn(move || {
            run_sweep(&tracer, spec, &events, &cancel);
            running.store(false, Ordering::Release);
        }));
        Ok(())
    }
}

impl<T> Drop for SweepEngine<T> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_sweep<T: CurveTracer>(
    tracer: &Mutex<T>,
    spec: SweepSpec,
    events: &EventQueue<SweepEvent>,
    cancel: &AtomicBool,
) {
    let mut dev = lock_tracer(tracer);
    info!("sweep started: {spec:?}");
    events.push(SweepEvent::Started(spec));

    let outcome = drive_sweep(&mut *dev, spec, events, cancel);

    // Unconditional: the device must never be left sourcing power after a
    // sweep, however it ended.
    dev.quiesce();
    info!("sweep finished: {outcome:?}");
    events.push(SweepEvent::Finished { outcome });
}

fn drive_sweep<T: CurveTracer>(
    dev: &mut T,
    spec: SweepSpec,
    events: &EventQueue<SweepEvent>,
    cancel: &AtomicBool,
) -> SweepOutcome {
    // Program the held setpoint once, up front.
    let fixed = match spec.kind {
        SweepKind::Collector { base_current_a, .. } => dev.set_base_current(base_current_a),
        SweepKind::Base {
            collector_voltage_v,
            ..
        } => dev.set_collector_voltage(collector_voltage_v),
        SweepKind::Diode { .. } => Ok(()),
    };
    // Set errors are transport failures; device rejections are absorbed
    // (and logged) inside the protocol layer and do not end the sweep.
    if let Err(err) = fixed {
        warn!("sweep aborted, fixed setpoint failed: {err}");
        return SweepOutcome::Aborted;
    }

    for index in 0..spec.points {
        if cancel.load(Ordering::Acquire) {
            return SweepOutcome::Cancelled;
        }

        let (base_current, collector_voltage, step) = match spec.kind {
            SweepKind::Collector {
                base_current_a,
                start_v,
                stop_v,
            } => {
                let v = interpolate(start_v, stop_v, index, spec.points);
                (base_current_a, v, dev.set_collector_voltage(v))
            }
            SweepKind::Base {
                collector_voltage_v,
                start_a,
                stop_a,
            } => {
                let a = interpolate(start_a, stop_a, index, spec.points);
                (a, collector_voltage_v, dev.set_base_current(a))
            }
            SweepKind::Diode { start_a, stop_a } => {
                let a = interpolate(start_a, stop_a, index, spec.points);
                (a, 0.0, dev.set_diode_current(a))
            }
        };
        if let Err(err) = step {
            warn!("sweep aborted at point {index}: {err}");
            return SweepOutcome::Aborted;
        }

        let measured = dev.measure();
        if !measured.valid {
            warn!("sweep aborted at point {index}: invalid measurement");
            return SweepOutcome::Aborted;
        }

        let label = (index == spec.points - 1).then(|| curve_label(spec.kind));
        events.push(SweepEvent::Point(DataPoint {
            base_current,
            collector_voltage,
            base_voltage: measured.base_v - measured.emitter_v,
            emitter_voltage: measured.emitter_v,
            emitter_current: units::emitter_current(measured.emitter_v),
            label,
        }));
    }
    SweepOutcome::Completed
}

/// Legend text attached to a finished curve.
fn curve_label(kind: SweepKind) -> String {
    match kind {
        SweepKind::Collector { base_current_a, .. } => {
            format!("Ib {:.1} \u{b5}A", base_current_a * 1.0e6)
        }
        SweepKind::Base {
            collector_voltage_v,
            ..
        } => format!("Vce {collector_voltage_v:.2} V"),
        SweepKind::Diode { .. } => "diode".to_owned(),
    }
}
