//! Session state machine.
//!
//! The single source of truth behind the presentation layer. Owns the mode,
//! the operation state, the stats, and (through the reconciler) the log
//! buffer and progress view. Execution is single-threaded, so guard checks
//! before each transition substitute for locking.

use crate::model::{
    CleanOutcome, Mode, OperationState, ProgressView, ScanOutcome, SessionEvent, SessionSnapshot,
    Stats, TelemetryEvent, WorkerError,
};
use crate::orchestrator::progress::ProgressReconciler;
use thiserror::Error;

pub const CLEAN_START_MARKER: &str = "Starting cleaning process...";
pub const CLEAN_COMPLETE_MARKER: &str = "Cleaning Complete!";

/// Why a requested transition was refused. Refusal keeps the session exactly
/// as it was; no request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionDenied {
    #[error("an operation is already running")]
    Busy,
    #[error("worker is unavailable")]
    WorkerUnavailable,
    #[error("path is empty")]
    EmptyPath,
    #[error("clean requires a successful scan first")]
    NoScanYet,
}

pub struct OrchestrationState {
    mode: Mode,
    state: OperationState,
    stats: Option<Stats>,
    reconciler: ProgressReconciler,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestrationState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Unknown,
            state: OperationState::Idle,
            stats: None,
            reconciler: ProgressReconciler::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    pub fn progress(&self) -> &ProgressView {
        self.reconciler.view()
    }

    pub fn logs(&self) -> &[String] {
        self.reconciler.logs()
    }

    /// Record the probe verdict. The mode is set exactly once per session;
    /// later calls are ignored.
    pub fn resolve_mode(&mut self, mode: Mode) {
        if self.mode == Mode::Unknown {
            self.mode = mode;
        }
    }

    fn guard_entry(&self, path: &str) -> Result<(), TransitionDenied> {
        if self.mode != Mode::Available {
            return Err(TransitionDenied::WorkerUnavailable);
        }
        if self.state != OperationState::Idle {
            return Err(TransitionDenied::Busy);
        }
        if path.trim().is_empty() {
            return Err(TransitionDenied::EmptyPath);
        }
        Ok(())
    }

    /// Enter `Scanning`. Clears the log buffer and progress view before the
    /// caller issues the request.
    pub fn begin_scan(&mut self, path: &str) -> Result<(), TransitionDenied> {
        self.guard_entry(path)?;
        self.state = OperationState::Scanning;
        self.reconciler.reset();
        Ok(())
    }

    /// Enter `Cleaning`. Requires a prior successful scan. Seeds the log
    /// buffer with the start marker.
    pub fn begin_clean(&mut self, path: &str) -> Result<(), TransitionDenied> {
        self.guard_entry(path)?;
        if self.stats.is_none() {
            return Err(TransitionDenied::NoScanYet);
        }
        self.state = OperationState::Cleaning;
        self.reconciler.reset();
        self.reconciler.push_log(CLEAN_START_MARKER);
        Ok(())
    }

    /// Fold the terminal scan result. Success replaces the stats wholesale;
    /// failure leaves prior stats untouched. Either way the session returns
    /// to `Idle`.
    pub fn complete_scan(
        &mut self,
        result: Result<ScanOutcome, WorkerError>,
    ) -> Result<(), String> {
        debug_assert_eq!(self.state, OperationState::Scanning);
        self.state = OperationState::Idle;
        match result {
            Ok(outcome) => {
                self.stats = Some(Stats {
                    total_files: outcome.total_files,
                    space_saved_mb: outcome.total_size_mb,
                    duplicates_removed: 0,
                });
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Fold the terminal clean result. Success forces the progress bar to
    /// exactly 100, replaces the stats (the prior scan count is no longer
    /// meaningful post-clean, so `total_files` resets to 0), and appends the
    /// completion marker. Failure returns to `Idle` without forcing percent.
    pub fn complete_clean(
        &mut self,
        result: Result<CleanOutcome, WorkerError>,
    ) -> Result<(), String> {
        debug_assert_eq!(self.state, OperationState::Cleaning);
        self.state = OperationState::Idle;
        match result {
            Ok(outcome) => {
                self.reconciler.finish_clean();
                self.stats = Some(Stats {
                    total_files: 0,
                    space_saved_mb: outcome.space_saved_mb,
                    duplicates_removed: outcome.duplicates_removed,
                });
                self.reconciler.push_log(CLEAN_COMPLETE_MARKER);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Fold one telemetry event; returns the presentation-facing change, if
    /// any. Events are processed strictly in arrival order.
    pub fn ingest(&mut self, event: TelemetryEvent) -> Option<SessionEvent> {
        let known_total = self.stats.as_ref().map(|s| s.total_files);
        self.reconciler.ingest(event, known_total)
    }

    /// Read-only snapshot for the presentation boundary.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            state: self.state,
            stats: self.stats.clone(),
            progress: self.reconciler.view().clone(),
            logs: self.reconciler.logs().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn available_session() -> OrchestrationState {
        let mut s = OrchestrationState::new();
        s.resolve_mode(Mode::Available);
        s
    }

    fn scan_outcome(total_files: u64, total_size_mb: f64) -> ScanOutcome {
        ScanOutcome {
            total_files,
            total_size_mb,
            categories: BTreeMap::new(),
        }
    }

    fn progress_event(file: &str) -> TelemetryEvent {
        TelemetryEvent::Progress {
            filename: file.into(),
            category: None,
        }
    }

    #[test]
    fn mode_is_set_exactly_once() {
        let mut s = OrchestrationState::new();
        assert_eq!(s.mode(), Mode::Unknown);
        s.resolve_mode(Mode::Unavailable);
        s.resolve_mode(Mode::Available);
        assert_eq!(s.mode(), Mode::Unavailable);
    }

    #[test]
    fn scan_is_never_invokable_when_unavailable() {
        let mut s = OrchestrationState::new();
        s.resolve_mode(Mode::Unavailable);
        assert_eq!(
            s.begin_scan("/tmp/x"),
            Err(TransitionDenied::WorkerUnavailable)
        );
        assert_eq!(s.state(), OperationState::Idle);
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut s = available_session();
        assert_eq!(s.begin_scan(""), Err(TransitionDenied::EmptyPath));
        assert_eq!(s.begin_scan("   "), Err(TransitionDenied::EmptyPath));
    }

    #[test]
    fn entry_is_rejected_while_busy() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        assert_eq!(s.begin_scan("/tmp/x"), Err(TransitionDenied::Busy));
        assert_eq!(s.begin_clean("/tmp/x"), Err(TransitionDenied::Busy));
    }

    #[test]
    fn clean_requires_a_successful_scan() {
        let mut s = available_session();
        assert_eq!(s.begin_clean("/tmp/x"), Err(TransitionDenied::NoScanYet));
    }

    #[test]
    fn successful_scan_stores_stats_and_returns_to_idle() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        s.complete_scan(Ok(scan_outcome(120, 340.5))).unwrap();
        assert_eq!(s.state(), OperationState::Idle);
        assert_eq!(
            s.stats(),
            Some(&Stats {
                total_files: 120,
                space_saved_mb: 340.5,
                duplicates_removed: 0,
            })
        );
    }

    #[test]
    fn failed_scan_leaves_prior_stats_untouched() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        s.complete_scan(Ok(scan_outcome(120, 340.5))).unwrap();

        s.begin_scan("/tmp/x").unwrap();
        let err = s
            .complete_scan(Err(WorkerError::OperationRejected("Path not found".into())))
            .unwrap_err();
        assert!(err.contains("Path not found"));
        assert_eq!(s.state(), OperationState::Idle);
        assert_eq!(s.stats().unwrap().total_files, 120);
    }

    #[test]
    fn clean_entry_seeds_start_marker_and_resets_progress() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        s.ingest(TelemetryEvent::ScanProgress {
            count: 37,
            current_file: "IMG_0012.jpg".into(),
        });
        s.complete_scan(Ok(scan_outcome(120, 340.5))).unwrap();

        s.begin_clean("/tmp/x").unwrap();
        assert_eq!(s.logs(), [CLEAN_START_MARKER]);
        assert_eq!(s.progress(), &ProgressView::default());
    }

    #[test]
    fn clean_success_replaces_stats_forces_100_and_appends_marker() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        s.complete_scan(Ok(scan_outcome(120, 340.5))).unwrap();

        s.begin_clean("/tmp/x").unwrap();
        s.ingest(TelemetryEvent::Log {
            message: "Removing duplicate: a.jpg".into(),
        });
        s.ingest(progress_event("a.jpg"));
        assert!(s.progress().percent < 100.0);

        s.complete_clean(Ok(CleanOutcome {
            space_saved_mb: 12.3,
            duplicates_removed: 9,
        }))
        .unwrap();

        assert_eq!(
            s.stats(),
            Some(&Stats {
                total_files: 0,
                space_saved_mb: 12.3,
                duplicates_removed: 9,
            })
        );
        assert_eq!(s.progress().percent, 100.0);
        assert_eq!(s.logs().last().map(String::as_str), Some(CLEAN_COMPLETE_MARKER));
        assert_eq!(s.state(), OperationState::Idle);
    }

    #[test]
    fn failed_clean_does_not_force_percent() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        s.complete_scan(Ok(scan_outcome(4, 1.0))).unwrap();

        s.begin_clean("/tmp/x").unwrap();
        s.ingest(progress_event("a.jpg"));
        let before = s.progress().percent;

        s.complete_clean(Err(WorkerError::OperationRejected(
            "Invalid folder path".into(),
        )))
        .unwrap_err();
        assert_eq!(s.progress().percent, before);
        assert_eq!(s.state(), OperationState::Idle);
        // Stats still reflect the scan.
        assert_eq!(s.stats().unwrap().total_files, 4);
    }

    #[test]
    fn clean_progress_steps_by_last_scan_total() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        s.complete_scan(Ok(scan_outcome(4, 1.0))).unwrap();

        s.begin_clean("/tmp/x").unwrap();
        s.ingest(progress_event("a.jpg"));
        assert_eq!(s.progress().percent, 25.0);
        assert_eq!(s.progress().current_file, "a.jpg");
    }

    #[test]
    fn log_events_accumulate_in_arrival_order_during_scan() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        for msg in ["alpha", "beta", "gamma"] {
            s.ingest(TelemetryEvent::Log {
                message: msg.into(),
            });
        }
        assert_eq!(s.logs(), ["alpha", "beta", "gamma"]);
    }

    #[test]
    fn snapshot_reflects_owned_state() {
        let mut s = available_session();
        s.begin_scan("/tmp/x").unwrap();
        s.complete_scan(Ok(scan_outcome(2, 5.0))).unwrap();
        let snap = s.snapshot();
        assert_eq!(snap.mode, Mode::Available);
        assert_eq!(snap.state, OperationState::Idle);
        assert_eq!(snap.stats.unwrap().total_files, 2);
        assert!(snap.logs.is_empty());
    }
}
