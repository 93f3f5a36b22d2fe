//! Worker reachability probe.

use super::WorkerEndpoints;
use crate::model::Mode;
use std::time::Duration;

/// Resolve the session mode. Runs once per session.
///
/// A non-local worker short-circuits to `Unavailable` without any network
/// call; there is nothing to probe when no worker can be assumed reachable.
/// Otherwise a single bounded-timeout GET decides: any 2xx is `Available`,
/// and timeout, refusal, or a non-success status is `Unavailable`. An
/// unreachable worker is a mode, never an error.
pub async fn check_health(
    client: &reqwest::Client,
    endpoints: &WorkerEndpoints,
    timeout: Duration,
) -> Mode {
    if !endpoints.is_local() {
        return Mode::Unavailable;
    }
    match client
        .get(endpoints.health.clone())
        .timeout(timeout)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => Mode::Available,
        _ => Mode::Unavailable,
    }
}
