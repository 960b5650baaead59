//! Demo driver: sweeps a family of transistor output curves and writes the
//! recorded traces to `traces.json`.
//!
//! Pass the serial port path as the first argument, or pick one
//! interactively. `--queued` selects the queued protocol variant.

use std::env;
use std::time::Duration;

use inquire::Select;
use log::info;

use curvetrace::export;
use curvetrace::port::{self, SerialLink};
use curvetrace::proto::{CurveTracer, ProtocolVariant, Tracer, TracerConfig};
use curvetrace::queue::QueuedTracer;
use curvetrace::sink::{EventRouter, TraceRecorder};
use curvetrace::sweep::{SweepEngine, SweepEvent, SweepKind, SweepSpec};

/// Consumer-side poll cadence, matching a UI timer tick.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SWEEP_POINTS: u16 = 50;
const COLLECTOR_STOP_V: f64 = 10.0;

/// Base currents for the curve family, one sweep each.
const BASE_CURRENTS_A: [f64; 5] = [1.0e-3, 2.0e-3, 3.0e-3, 4.0e-3, 5.0e-3];

fn main() {
    env_logger::init();

    let queued = env::args().any(|arg| arg == "--queued");
    let port_name = env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .unwrap_or_else(pick_port);
    println!("Using port: {port_name}");

    let config = TracerConfig::default().with_variant(if queued {
        ProtocolVariant::Queued
    } else {
        ProtocolVariant::Synchronous
    });
    let link = SerialLink::open_with(&port_name, config.baud, config.read_timeout)
        .expect("failed to open serial port");

    let recorder = match config.variant {
        ProtocolVariant::Synchronous => run_family(SweepEngine::new(Tracer::new(link))),
        ProtocolVariant::Queued => run_family(SweepEngine::new(QueuedTracer::new(link))),
    };

    let file = std::fs::File::create("traces.json").expect("failed to create traces.json");
    export::write_traces(file, &recorder).expect("failed to write traces.json");
    println!("wrote {} traces to traces.json", recorder.traces().len());
}

fn pick_port() -> String {
    let ports = port::available_ports();
    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }
    Select::new("Select a serial port:", ports)
        .prompt()
        .expect("failed to select port")
}

/// One collector sweep per base current, polled at the consumer cadence.
/// A multi-level family is just repeated single-level sweeps; the engine
/// serializes them by joining each worker before starting the next.
fn run_family<T: CurveTracer + 'static>(mut engine: SweepEngine<T>) -> TraceRecorder {
    let events = engine.events();
    let mut recorder = TraceRecorder::new();
    let mut router = EventRouter::new();

    for base_current_a in BASE_CURRENTS_A {
        let spec = SweepSpec {
            kind: SweepKind::Collector {
                base_current_a,
                start_v: 0.0,
                stop_v: COLLECTOR_STOP_V,
            },
            points: SWEEP_POINTS,
        };
        if let Err(err) = engine.start(spec) {
            eprintln!("sweep rejected: {err}");
            break;
        }

        while engine.is_running() || events.has_items() {
            while let Some(event) = events.try_pop() {
                if let SweepEvent::Point(point) = &event {
                    info!(
                        "Vce {:.3} V -> Ie {:.6} A",
                        point.collector_voltage, point.emitter_current
                    );
                }
                router.route(&mut recorder, &event);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    recorder
}
