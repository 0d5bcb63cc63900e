//! Traceback and diagnostics.
//!
//! The traceback is a structured event log: one event per processed
//! line plus free-form notes and the terminal error. On failure it is
//! rendered to text (for stderr) followed by ordered dumps of the
//! memory compartments and the schema registry, then cleared. A JSON
//! dump of the same state is available for machine consumers.

use serde::Serialize;
use serde_json::json;

use crate::memory::Memory;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceEvent {
    /// A source line, tagged with its step id (0 for structural lines).
    Line { id: u64, source: String },
    Note(String),
    Error(String),
}

/// Append-only event log scoped to one engine.
#[derive(Debug, Default)]
pub struct Traceback {
    events: Vec<TraceEvent>,
}

impl Traceback {
    pub fn new() -> Self {
        Traceback::default()
    }

    pub fn line(&mut self, id: u64, source: &str) {
        self.events.push(TraceEvent::Line {
            id,
            source: source.to_string(),
        });
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.events.push(TraceEvent::Note(message.into()));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.events.push(TraceEvent::Error(message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Render the buffer as text, one event per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            match event {
                TraceEvent::Line { id, source } => {
                    out.push_str(&format!(" +{id}  {source}\n"));
                }
                TraceEvent::Note(msg) => out.push_str(&format!(" .   {msg}\n")),
                TraceEvent::Error(msg) => out.push_str(&format!(" [!] {msg}\n")),
            }
        }
        out
    }

    /// Full failure report: traceback, then ordered dumps of IN, TMP,
    /// ACK, OUT and the schema registry. The buffer is cleared by the
    /// caller after the report is taken.
    pub fn failure_report(&self, memory: Option<&Memory>, schemas: &[String]) -> String {
        let mut out = self.render();
        if let Some(mem) = memory {
            out.push_str(&format!(" [D] IN: {}\n", dump_json(&mem.input_json())));
            out.push_str(&format!(" [D] TMP: {}\n", dump_json(&mem.tmp_json())));
            out.push_str(&format!(" [D] ACK: {}\n", dump_json(&mem.ack_json())));
            out.push_str(&format!(" [D] OUT: {}\n", dump_json(&mem.out_json())));
        }
        out.push_str(&format!(" [D] schemas: {}\n", dump_json(&json!(schemas))));
        out
    }

    /// Machine-readable dump of the same failure state.
    pub fn debug_dump(&self, memory: Option<&Memory>, schemas: &[String]) -> serde_json::Value {
        let events = serde_json::to_value(&self.events).unwrap_or_default();
        let mut dump = json!({ "traceback": events, "schemas": schemas });
        if let Some(mem) = memory {
            dump["IN"] = mem.input_json();
            dump["TMP"] = mem.tmp_json();
            dump["ACK"] = mem.ack_json();
            dump["OUT"] = mem.out_json();
        }
        dump
    }
}

fn dump_json(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_orders_events() {
        let mut trace = Traceback::new();
        trace.line(1, "Given I am 'Alice'");
        trace.note("loading scenario");
        trace.error("boom");
        let text = trace.render();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Given I am 'Alice'"));
        assert!(lines[1].contains("loading scenario"));
        assert!(lines[2].contains("boom"));
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut trace = Traceback::new();
        trace.line(1, "x");
        trace.clear();
        assert!(trace.is_empty());
        assert_eq!(trace.render(), "");
    }

    #[test]
    fn test_failure_report_lists_schemas() {
        let trace = Traceback::new();
        let report = trace.failure_report(None, &["identity".to_string()]);
        assert!(report.contains("schemas"));
        assert!(report.contains("identity"));
    }

    #[test]
    fn test_debug_dump_shape() {
        let mut trace = Traceback::new();
        trace.error("bad");
        let dump = trace.debug_dump(None, &[]);
        assert!(dump["traceback"].as_array().is_some());
    }
}
