//! JSON export of recorded traces.
//!
//! Layout: a single object mapping `"trace1"`, `"trace2"`, ... to arrays
//! of `[x, y]` pairs, in recording order. No schema version field; the
//! layout is the schema.

use serde_json::{json, Map, Value};

use crate::sink::TraceRecorder;

/// Build the export object from everything the recorder holds.
pub fn traces_json(recorder: &TraceRecorder) -> Value {
    let mut root = Map::new();
    for (index, trace) in recorder.traces().iter().enumerate() {
        let pairs: Vec<Value> = trace
            .points
            .iter()
            .map(|&(x, y)| json!([x, y]))
            .collect();
        root.insert(format!("trace{}", index + 1), Value::Array(pairs));
    }
    Value::Object(root)
}

/// Serialize the traces to a writer, pretty-printed.
pub fn write_traces<W: std::io::Write>(
    writer: W,
    recorder: &TraceRecorder,
) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(writer, &traces_json(recorder))
}
