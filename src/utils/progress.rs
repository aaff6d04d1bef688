//! Progress reporting
//!
//! The observability sink is an append-only stream of human-readable progress
//! events threaded explicitly through each pipeline component. Nothing in the
//! pipeline ever reads it back.

use parking_lot::Mutex;
use std::sync::Arc;

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A complete, human-readable progress line
    Line(String),
    /// A partial fragment of streamed model output
    Fragment(String),
}

/// Append-only progress sink. Implementations must accept concurrent writers.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn line(&self, message: &str) {
        self.emit(ProgressEvent::Line(message.to_string()));
    }

    fn fragment(&self, text: &str) {
        self.emit(ProgressEvent::Fragment(text.to_string()));
    }
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn ProgressSink>;

/// Forwards progress to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Line(line) => tracing::info!(target: "deepdive::progress", "{}", line),
            ProgressEvent::Fragment(text) => {
                tracing::trace!(target: "deepdive::progress", fragment = %text)
            }
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Line(line) => Some(line.clone()),
                ProgressEvent::Fragment(_) => None,
            })
            .collect()
    }

    /// Concatenation of all fragments, in arrival order
    pub fn streamed_text(&self) -> String {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Fragment(text) => Some(text.as_str()),
                ProgressEvent::Line(_) => None,
            })
            .collect()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_separates_lines_and_fragments() {
        let sink = MemorySink::new();
        sink.line("Generating plan");
        sink.fragment("Hel");
        sink.fragment("lo");
        sink.line("done");

        assert_eq!(sink.lines(), vec!["Generating plan", "done"]);
        assert_eq!(sink.streamed_text(), "Hello");
        assert_eq!(sink.events().len(), 4);
    }

    #[tokio::test]
    async fn test_memory_sink_concurrent_writers() {
        let sink = Arc::new(MemorySink::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    sink.line(&format!("{}-{}", i, j));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(sink.lines().len(), 200);
    }
}
