//! Telemetry reconciliation.
//!
//! Folds stream events into a log buffer and a progress view. Progress during
//! a clean is an estimate: the stream reports per-file completion with no
//! running total, so each file advances the bar by `100 / known_total` and the
//! bar holds at 99 until the control-plane response lands. Correctness lives
//! in the terminal response; telemetry is best-effort enrichment.

use crate::model::{ProgressView, SessionEvent, TelemetryEvent};

#[derive(Debug, Default)]
pub struct ProgressReconciler {
    view: ProgressView,
    logs: Vec<String>,
}

impl ProgressReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &ProgressView {
        &self.view
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Clear everything. Runs synchronously on operation entry, before the
    /// request goes out, so events from a previous operation cannot be
    /// misattributed to the new one.
    pub fn reset(&mut self) {
        self.view = ProgressView::default();
        self.logs.clear();
    }

    /// Seed a marker line (operation start/completion).
    pub fn push_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Fold one event; returns the presentation-facing change, if any.
    ///
    /// `known_total` is the file count from the most recent successful scan.
    /// Zero or absent both mean "unknown" and fall back to 100 steps, which
    /// also keeps the divisor non-zero.
    pub fn ingest(
        &mut self,
        event: TelemetryEvent,
        known_total: Option<u64>,
    ) -> Option<SessionEvent> {
        match event {
            TelemetryEvent::Log { message } => {
                self.logs.push(message.clone());
                Some(SessionEvent::Log(message))
            }
            TelemetryEvent::Progress { filename, category: _ } => {
                self.view.current_file = filename;
                let total = known_total.filter(|t| *t > 0).unwrap_or(100);
                self.view.percent = (self.view.percent + 100.0 / total as f64).min(99.0);
                Some(SessionEvent::Progress(self.view.clone()))
            }
            TelemetryEvent::ScanProgress { count, current_file } => {
                self.view.scan_count = count;
                self.view.current_file = current_file;
                Some(SessionEvent::Progress(self.view.clone()))
            }
            TelemetryEvent::Unknown => None,
        }
    }

    /// The terminal clean response, not the stream, is the authoritative
    /// completion signal.
    pub fn finish_clean(&mut self) {
        self.view.percent = 100.0;
    }
}
