//! Node health probing.
//!
//! A node is healthy once `GET /health` answers `200 OK`. Bring-up polls
//! at a fixed interval until that happens or a ceiling is reached.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{sleep_or_cancel, NodeError, NodeResult};

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint returned 200.
    Healthy,
    /// The endpoint answered with anything else.
    Unhealthy,
    /// The probe could not be executed (connection refused, timeout).
    Failed,
}

/// Perform one `GET http://{address}{path}` with a per-request timeout.
pub async fn http_probe(
    http: &reqwest::Client,
    address: &str,
    path: &str,
    timeout: Duration,
) -> ProbeResult {
    let uri = format!("http://{address}{path}");
    match http.get(&uri).timeout(timeout).send().await {
        Ok(resp) if resp.status() == StatusCode::OK => ProbeResult::Healthy,
        Ok(resp) => {
            debug!(status = %resp.status(), %uri, "health probe not ok");
            ProbeResult::Unhealthy
        }
        Err(e) => {
            debug!(error = %e, %uri, "health probe failed");
            ProbeResult::Failed
        }
    }
}

/// Poll `address` every `interval` until healthy.
///
/// Fails with [`NodeError::Connection`] once `timeout` has elapsed.
pub async fn wait_healthy(
    cancel: &CancellationToken,
    address: &str,
    interval: Duration,
    timeout: Duration,
) -> NodeResult<()> {
    let http = reqwest::Client::builder()
        .user_agent("automation-cli")
        .build()
        .map_err(|e| NodeError::Connection(e.to_string()))?;
    let started = Instant::now();
    let probe_timeout = interval.max(Duration::from_secs(1));
    loop {
        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NodeError::Cancelled),
            probe = http_probe(&http, address, "/health", probe_timeout) => probe,
        };
        if probe == ProbeResult::Healthy {
            info!(%address, elapsed_ms = started.elapsed().as_millis() as u64, "node is healthy");
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(NodeError::Connection(format!(
                "node at {address} not healthy after {}s",
                timeout.as_secs()
            )));
        }
        sleep_or_cancel(cancel, interval).await?;
    }
}
