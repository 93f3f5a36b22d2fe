//! Worker-facing transport: endpoint resolution, health probe, control-plane
//! operations, and the telemetry stream.

mod ops;
mod probe;
mod telemetry;

pub use ops::OperationClient;
pub use probe::check_health;
pub use telemetry::{ChannelEvent, TelemetryChannel};

use anyhow::{anyhow, Context, Result};
use reqwest::Url;

/// Resolved endpoints for one worker, derived once from the base URL.
#[derive(Debug, Clone)]
pub struct WorkerEndpoints {
    pub health: Url,
    pub scan: Url,
    pub clean: Url,
    pub telemetry: Url,
    local: bool,
}

impl WorkerEndpoints {
    pub fn new(base_url: &str) -> Result<Self> {
        let base =
            Url::parse(base_url).with_context(|| format!("invalid worker URL: {base_url}"))?;
        let local = is_loopback_host(&base);

        let health = base.join("api/health").context("resolve health endpoint")?;
        let scan = base.join("api/scan").context("resolve scan endpoint")?;
        let clean = base.join("api/clean").context("resolve clean endpoint")?;

        let mut telemetry = base.join("ws/progress").context("resolve telemetry endpoint")?;
        let scheme = match telemetry.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        telemetry
            .set_scheme(scheme)
            .map_err(|_| anyhow!("cannot derive WebSocket scheme for {base_url}"))?;

        Ok(Self {
            health,
            scan,
            clean,
            telemetry,
            local,
        })
    }

    /// A non-local worker is never probed; the session runs in showcase mode.
    pub fn is_local(&self) -> bool {
        self.local
    }
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host_str() {
        Some(host) => {
            if host.eq_ignore_ascii_case("localhost") {
                return true;
            }
            host.trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<std::net::IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false)
        }
        None => false,
    }
}

/// One shared HTTP client for the probe and both operations.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("smartclean-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_under_api_base() {
        let ep = WorkerEndpoints::new("http://127.0.0.1:8000").unwrap();
        assert_eq!(ep.health.as_str(), "http://127.0.0.1:8000/api/health");
        assert_eq!(ep.scan.as_str(), "http://127.0.0.1:8000/api/scan");
        assert_eq!(ep.clean.as_str(), "http://127.0.0.1:8000/api/clean");
        assert_eq!(ep.telemetry.as_str(), "ws://127.0.0.1:8000/ws/progress");
    }

    #[test]
    fn https_base_derives_wss_telemetry() {
        let ep = WorkerEndpoints::new("https://localhost:8000").unwrap();
        assert_eq!(ep.telemetry.scheme(), "wss");
    }

    #[test]
    fn loopback_hosts_are_local() {
        for base in [
            "http://localhost:8000",
            "http://127.0.0.1:8000",
            "http://[::1]:8000",
        ] {
            assert!(WorkerEndpoints::new(base).unwrap().is_local(), "{base}");
        }
    }

    #[test]
    fn remote_hosts_are_not_local() {
        for base in ["http://worker.example.com", "http://10.1.2.3:8000"] {
            assert!(!WorkerEndpoints::new(base).unwrap().is_local(), "{base}");
        }
    }
}
