//! Telemetry collector access.
//!
//! The [`TelemetryCollector`] trait abstracts the collector HTTP API so the
//! exercise engine can be tested against scripted snapshots. Snapshots are
//! keyed by the correlation ID stamped onto exercise requests, which isolates
//! one case's telemetry from every other case sharing the collector.

use std::future::Future;

use tracegrid_core::error::VerifyError;
use tracegrid_core::types::TelemetrySnapshot;

/// Read access to captured telemetry.
pub trait TelemetryCollector: Send + Sync + 'static {
    /// Fetches the snapshot for a correlation ID.
    ///
    /// Returns `Ok(None)` while the collector has not yet received matching
    /// telemetry; callers poll with backoff. Transport and protocol errors
    /// are infrastructure failures, never behavioral ones.
    fn fetch_snapshot(
        &self,
        correlation_id: &str,
    ) -> impl Future<Output = Result<Option<TelemetrySnapshot>, VerifyError>> + Send;

    /// Checks collector reachability.
    ///
    /// Used as a run precondition alongside the platform ping.
    fn ping(&self) -> impl Future<Output = Result<(), VerifyError>> + Send;
}

/// Production collector client over HTTP.
///
/// Expects the collector to expose `GET /snapshots/{correlation_id}`
/// returning a JSON [`TelemetrySnapshot`], with 404 meaning "nothing
/// captured yet".
pub struct HttpTelemetryCollector {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTelemetryCollector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

impl TelemetryCollector for HttpTelemetryCollector {
    async fn fetch_snapshot(
        &self,
        correlation_id: &str,
    ) -> Result<Option<TelemetrySnapshot>, VerifyError> {
        let url = format!("{}/snapshots/{correlation_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| VerifyError::Collector(format!("GET {url}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(VerifyError::Collector(format!(
                "GET {url}: unexpected status {}",
                response.status()
            )));
        }

        let snapshot = response
            .json::<TelemetrySnapshot>()
            .await
            .map_err(|e| VerifyError::Collector(format!("GET {url}: malformed snapshot: {e}")))?;
        Ok(Some(snapshot))
    }

    async fn ping(&self) -> Result<(), VerifyError> {
        let url = format!("{}/healthcheck", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| VerifyError::Collector(format!("GET {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(VerifyError::Collector(format!(
                "collector healthcheck returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
