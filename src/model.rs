use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Worker reachability, resolved exactly once per session by the health probe.
///
/// `Unavailable` is a legitimate mode (demo-only presentation), not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Unknown,
    Unavailable,
    Available,
}

/// Which operation, if any, is currently in flight. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationState {
    Idle,
    Scanning,
    Cleaning,
}

/// Aggregate figures from the most recent successful operation.
///
/// Replaced wholesale on each success; never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_files: u64,
    pub space_saved_mb: f64,
    pub duplicates_removed: u64,
}

/// Live progress derived from telemetry, recomputed on every event.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ProgressView {
    /// In [0, 100]. Monotonically non-decreasing during a clean, clamped at 99
    /// until the terminal response forces exactly 100.
    pub percent: f64,
    pub current_file: String,
    /// Exact running count reported by the worker during a scan.
    pub scan_count: u64,
}

/// Options forwarded verbatim to the worker's clean endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CleanOptions {
    pub simulate: bool,
    pub ai_mode: bool,
    pub remove_empty: bool,
}

/// Session-wide configuration assembled from CLI arguments.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub path: String,
    pub options: CleanOptions,
    pub health_timeout: std::time::Duration,
}

/// One inbound frame on the telemetry channel.
///
/// The worker tags frames with a `type` discriminant; discriminants we don't
/// know yet fold into `Unknown` and are skipped rather than treated as fatal.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Log {
        message: String,
    },
    Progress {
        filename: String,
        #[serde(default)]
        category: Option<String>,
    },
    ScanProgress {
        count: u64,
        current_file: String,
    },
    #[serde(other)]
    Unknown,
}

// --- control-plane wire types ---

#[derive(Debug, Serialize)]
pub struct ScanRequest<'a> {
    pub path: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ScanResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    // The worker has shipped both spellings of this field.
    #[serde(rename = "totalFiles", alias = "total_files", default)]
    pub total_files: u64,
    #[serde(default)]
    pub total_size_mb: f64,
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct CleanRequest<'a> {
    pub path: &'a str,
    pub simulate: bool,
    pub ai_mode: bool,
    pub remove_empty: bool,
}

#[derive(Debug, Deserialize)]
pub struct CleanResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stats: Option<CleanResponseStats>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanResponseStats {
    #[serde(default)]
    pub space_saved_mb: f64,
    #[serde(default)]
    pub duplicates_removed: u64,
}

/// Terminal result of a successful scan, lifted out of the wire shape.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub total_files: u64,
    pub total_size_mb: f64,
    pub categories: BTreeMap<String, u64>,
}

/// Terminal result of a successful clean.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub space_saved_mb: f64,
    pub duplicates_removed: u64,
}

/// Failure taxonomy for control-plane calls. Single attempt, never retried here.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The request never produced a well-formed worker response.
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// The worker answered, but its own payload signals failure.
    #[error("worker rejected the operation: {0}")]
    OperationRejected(String),
}

/// State changes emitted by the controller and folded by presentation layers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ModeResolved(Mode),
    StateChanged(OperationState),
    StatsUpdated(Option<Stats>),
    Log(String),
    Progress(ProgressView),
    /// Full scan result, including the category histogram that `Stats` does
    /// not carry.
    ScanCompleted(ScanOutcome),
    OperationFailed {
        op: OperationState,
        message: String,
    },
    /// The telemetry connection dropped; terminal results still finalize state.
    TelemetryLost,
}

/// Read-only view of the whole session, for snapshot-style consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub state: OperationState,
    pub stats: Option<Stats>,
    pub progress: ProgressView,
    pub logs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_log_frame_parses() {
        let ev: TelemetryEvent =
            serde_json::from_str(r#"{"type":"log","message":"hashing files"}"#).unwrap();
        assert_eq!(
            ev,
            TelemetryEvent::Log {
                message: "hashing files".into()
            }
        );
    }

    #[test]
    fn telemetry_progress_frame_keeps_optional_category() {
        let ev: TelemetryEvent = serde_json::from_str(
            r#"{"type":"progress","filename":"IMG_0012.jpg","category":"Images"}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            TelemetryEvent::Progress {
                filename: "IMG_0012.jpg".into(),
                category: Some("Images".into()),
            }
        );

        let ev: TelemetryEvent =
            serde_json::from_str(r#"{"type":"progress","filename":"a.txt"}"#).unwrap();
        assert_eq!(
            ev,
            TelemetryEvent::Progress {
                filename: "a.txt".into(),
                category: None,
            }
        );
    }

    #[test]
    fn telemetry_scan_progress_frame_parses() {
        let ev: TelemetryEvent = serde_json::from_str(
            r#"{"type":"scan_progress","count":37,"current_file":"IMG_0012.jpg"}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            TelemetryEvent::ScanProgress {
                count: 37,
                current_file: "IMG_0012.jpg".into(),
            }
        );
    }

    #[test]
    fn unknown_discriminant_is_not_fatal() {
        let ev: TelemetryEvent = serde_json::from_str(r#"{"type":"heartbeat","seq":9}"#).unwrap();
        assert_eq!(ev, TelemetryEvent::Unknown);
    }

    #[test]
    fn scan_response_accepts_both_field_spellings() {
        let camel: ScanResponse =
            serde_json::from_str(r#"{"status":"success","totalFiles":120,"total_size_mb":340.5}"#)
                .unwrap();
        assert_eq!(camel.total_files, 120);
        assert_eq!(camel.total_size_mb, 340.5);

        let snake: ScanResponse = serde_json::from_str(
            r#"{"status":"success","total_files":120,"total_size_mb":340.5,"categories":{"Images":80}}"#,
        )
        .unwrap();
        assert_eq!(snake.total_files, 120);
        assert_eq!(snake.categories.get("Images"), Some(&80));
    }

    #[test]
    fn clean_response_parses_nested_stats() {
        let resp: CleanResponse = serde_json::from_str(
            r#"{"status":"success","message":"Cleaning complete","stats":{"space_saved_mb":12.3,"duplicates_removed":9}}"#,
        )
        .unwrap();
        let stats = resp.stats.unwrap();
        assert_eq!(stats.space_saved_mb, 12.3);
        assert_eq!(stats.duplicates_removed, 9);
    }
}
