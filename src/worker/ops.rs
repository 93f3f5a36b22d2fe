//! Control-plane operations: single-shot scan and clean requests.

use super::WorkerEndpoints;
use crate::model::{
    CleanOptions, CleanOutcome, CleanRequest, CleanResponse, ScanOutcome, ScanRequest,
    ScanResponse, WorkerError,
};

/// Issues the two control-plane requests. Exactly one attempt per call; there
/// is no retry and no client-enforced timeout, since a large tree can
/// legitimately take minutes and the transport default applies.
#[derive(Clone)]
pub struct OperationClient {
    http: reqwest::Client,
    endpoints: WorkerEndpoints,
}

impl OperationClient {
    pub fn new(http: reqwest::Client, endpoints: WorkerEndpoints) -> Self {
        Self { http, endpoints }
    }

    /// Read-only on the worker side.
    pub async fn scan(&self, path: &str) -> Result<ScanOutcome, WorkerError> {
        let body: ScanResponse = self
            .http
            .post(self.endpoints.scan.clone())
            .json(&ScanRequest { path })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.status != "success" {
            return Err(WorkerError::OperationRejected(
                body.message.unwrap_or_else(|| "scan failed".into()),
            ));
        }
        Ok(ScanOutcome {
            total_files: body.total_files,
            total_size_mb: body.total_size_mb,
            categories: body.categories,
        })
    }

    /// Mutates the worker's file system unless `options.simulate` is set.
    pub async fn clean(
        &self,
        path: &str,
        options: CleanOptions,
    ) -> Result<CleanOutcome, WorkerError> {
        let body: CleanResponse = self
            .http
            .post(self.endpoints.clean.clone())
            .json(&CleanRequest {
                path,
                simulate: options.simulate,
                ai_mode: options.ai_mode,
                remove_empty: options.remove_empty,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.status != "success" {
            return Err(WorkerError::OperationRejected(
                body.message.unwrap_or_else(|| "clean failed".into()),
            ));
        }
        let stats = body.stats.ok_or_else(|| {
            WorkerError::OperationRejected("clean response missing stats".into())
        })?;
        Ok(CleanOutcome {
            space_saved_mb: stats.space_saved_mb,
            duplicates_removed: stats.duplicates_removed,
        })
    }
}
