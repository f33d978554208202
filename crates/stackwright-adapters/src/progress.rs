//! Progress sinks for stack events.

use std::io::Write;
use std::sync::Mutex;

use stackwright_core::application::ProgressSink;
use stackwright_core::domain::StackEvent;

/// Keeps every event it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<StackEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in arrival order.
    pub fn events(&self) -> Vec<StackEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for CollectingSink {
    fn on_event(&self, event: &StackEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Writes one progress line per event.
///
/// Write failures are dropped: losing a progress line must not abort a
/// deployment.
pub struct LineWriterSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> LineWriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl LineWriterSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ProgressSink for LineWriterSink<W> {
    fn on_event(&self, event: &StackEvent) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", event.progress_line());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, status: &str) -> StackEvent {
        StackEvent::new(id, "AWS::Logs::LogGroup", "LogGroup", status)
    }

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.on_event(&event("1", "CREATE_IN_PROGRESS"));
        sink.on_event(&event("2", "CREATE_COMPLETE"));

        let ids: Vec<_> = sink.events().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn line_writer_emits_one_line_per_event() {
        let sink = LineWriterSink::new(Vec::new());
        sink.on_event(&event("1", "CREATE_COMPLETE"));
        sink.on_event(&event("2", "CREATE_FAILED").with_reason("boom"));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("LogGroup"));
        assert!(lines[1].ends_with("boom"));
    }
}
