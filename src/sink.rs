//! The plotting collaborator interface.
//!
//! A [`TraceSink`] is whatever consumes curves: a plot widget, a file
//! recorder, a test double. The crate never renders anything itself; it
//! routes sweep events into the sink and leaves presentation to the
//! implementation. [`TraceRecorder`] is the built-in in-memory sink, used
//! by the JSON export and by tests.

use crate::sweep::{DataPoint, SweepEvent, SweepKind};

/// Operations a curve consumer exposes. Mirrors the shape of an XY plot
/// widget: traces are created, selected, appended to, and labelled.
pub trait TraceSink {
    /// Open a new trace, select it, and return its index.
    fn new_trace(&mut self) -> usize;
    /// Append a point to the selected trace.
    fn add_data_point(&mut self, x: f64, y: f64);
    /// Label the selected trace (legend text), anchored at a plot
    /// coordinate.
    fn add_label(&mut self, label: &str, anchor: (f64, f64));
    /// Make an existing trace the selected one. Out-of-range indices are
    /// ignored.
    fn select_trace(&mut self, index: usize);
    /// Drop all traces and labels.
    fn clear_data(&mut self);
    /// Axis unit annotations for subsequent traces.
    fn set_unit_strings(&mut self, x_unit: &str, y_unit: &str);
}

/// Which measured quantities a sweep kind plots, as `(x, y)`.
pub fn plot_coords(kind: SweepKind, point: &DataPoint) -> (f64, f64) {
    match kind {
        // Forward voltage against drive current.
        SweepKind::Diode { .. } => (point.base_voltage, point.base_current),
        SweepKind::Base { .. } => (point.base_current, point.emitter_current),
        SweepKind::Collector { .. } => (point.collector_voltage, point.emitter_current),
    }
}

/// Axis unit annotations per sweep kind, as `(x, y)`.
pub fn unit_strings(kind: SweepKind) -> (&'static str, &'static str) {
    match kind {
        SweepKind::Diode { .. } => ("mV", "A"),
        SweepKind::Base { .. } => ("A", "A"),
        SweepKind::Collector { .. } => ("V", "A"),
    }
}

/// Routes [`SweepEvent`]s into a [`TraceSink`], remembering the running
/// sweep's kind so each point lands on the right axes.
#[derive(Debug, Default)]
pub struct EventRouter {
    kind: Option<SweepKind>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, sink: &mut dyn TraceSink, event: &SweepEvent) {
        match event {
            SweepEvent::Started(spec) => {
                self.kind = Some(spec.kind);
                let (x_unit, y_unit) = unit_strings(spec.kind);
                sink.set_unit_strings(x_unit, y_unit);
                sink.new_trace();
            }
            SweepEvent::Point(point) => {
                let Some(kind) = self.kind else { return };
                let (x, y) = plot_coords(kind, point);
                sink.add_data_point(x, y);
                if let Some(label) = &point.label {
                    sink.add_label(label, (x, y));
                }
            }
            SweepEvent::Finished { .. } => {
                self.kind = None;
            }
        }
    }
}

/// One recorded trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub points: Vec<(f64, f64)>,
    pub label: Option<String>,
    pub label_anchor: Option<(f64, f64)>,
}

/// In-memory [`TraceSink`]. Backs the JSON export and stands in for a plot
/// widget in tests.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    traces: Vec<Trace>,
    selected: usize,
    units: (String, String),
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn units(&self) -> (&str, &str) {
        (&self.units.0, &self.units.1)
    }

    fn selected_mut(&mut self) -> Option<&mut Trace> {
        self.traces.get_mut(self.selected)
    }
}

impl TraceSink for TraceRecorder {
    fn new_trace(&mut self) -> usize {
        self.traces.push(Trace::default());
        self.selected = self.traces.len() - 1;
        self.selected
    }

    fn add_data_point(&mut self, x: f64, y: f64) {
        if let Some(trace) = self.selected_mut() {
            trace.points.push((x, y));
        }
    }

    fn add_label(&mut self, label: &str, anchor: (f64, f64)) {
        if let Some(trace) = self.selected_mut() {
            trace.label = Some(label.to_owned());
            trace.label_anchor = Some(anchor);
        }
    }

    fn select_trace(&mut self, index: usize) {
        if index < self.traces.len() {
            self.selected = index;
        }
    }

    fn clear_data(&mut self) {
        self.traces.clear();
        self.selected = 0;
    }

    fn set_unit_strings(&mut self, x_unit: &str, y_unit: &str) {
        self.units = (x_unit.to_owned(), y_unit.to_owned());
    }
}
