use crate::models::{
    DeviceRecord, DevicesEnvelope, ScanStatus, ScanStatusEnvelope, StatsEnvelope, StatsSummary,
};
use std::time::Duration;
use tracing::debug;

/// Failure modes for a single data-source fetch. Malformed JSON surfaces as
/// a transport-level `reqwest` error and therefore folds into `Network`.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("api error: {0}")]
    Api(String),
}

/// The three data sources a refresh cycle fans out to. `ApiClient` is the
/// production implementation; tests substitute their own.
#[allow(async_fn_in_trait)]
pub trait DataSource {
    async fn fetch_statistics(&self) -> Result<StatsSummary, FetchError>;
    async fn fetch_recent_devices(&self, window_hours: u32)
        -> Result<Vec<DeviceRecord>, FetchError>;
    async fn fetch_scan_status(&self) -> Result<ScanStatus, FetchError>;
}

/// Thin request/parse wrapper over the monitoring backend. No retries; a
/// failed source is skipped for the cycle and retried naturally on the next.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Full inventory, used by export and the devices table.
    pub async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>, FetchError> {
        let url = self.url("/api/devices");
        debug!(%url, "fetching devices");
        let env: DevicesEnvelope = self.http.get(&url).send().await?.json().await?;
        if !env.success {
            return Err(FetchError::Api(describe(env.error)));
        }
        env.devices
            .ok_or_else(|| FetchError::Api("response missing devices".to_string()))
    }
}

impl DataSource for ApiClient {
    async fn fetch_statistics(&self) -> Result<StatsSummary, FetchError> {
        let url = self.url("/api/stats");
        debug!(%url, "fetching statistics");
        let env: StatsEnvelope = self.http.get(&url).send().await?.json().await?;
        if !env.success {
            return Err(FetchError::Api(describe(env.error)));
        }
        env.stats
            .ok_or_else(|| FetchError::Api("response missing stats".to_string()))
    }

    async fn fetch_recent_devices(
        &self,
        window_hours: u32,
    ) -> Result<Vec<DeviceRecord>, FetchError> {
        let url = self.url("/api/devices/active");
        debug!(%url, window_hours, "fetching recent devices");
        let env: DevicesEnvelope = self
            .http
            .get(&url)
            .query(&[("hours", window_hours)])
            .send()
            .await?
            .json()
            .await?;
        if !env.success {
            return Err(FetchError::Api(describe(env.error)));
        }
        env.devices
            .ok_or_else(|| FetchError::Api("response missing devices".to_string()))
    }

    async fn fetch_scan_status(&self) -> Result<ScanStatus, FetchError> {
        let url = self.url("/api/scan/status");
        debug!(%url, "fetching scan status");
        let env: ScanStatusEnvelope = self.http.get(&url).send().await?.json().await?;
        if !env.success {
            return Err(FetchError::Api(describe(env.error)));
        }
        let scan_in_progress = env
            .scan_in_progress
            .ok_or_else(|| FetchError::Api("response missing scan_in_progress".to_string()))?;
        Ok(ScanStatus {
            scan_in_progress,
            recent_scans: env.recent_scans,
        })
    }
}

fn describe(error: Option<String>) -> String {
    error.unwrap_or_else(|| "unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.url("/api/stats"), "http://localhost:5000/api/stats");
    }

    #[test]
    fn api_error_carries_backend_message() {
        let err = FetchError::Api(describe(Some("scan table missing".to_string())));
        assert_eq!(err.to_string(), "api error: scan table missing");
        let err = FetchError::Api(describe(None));
        assert_eq!(err.to_string(), "api error: unknown error");
    }
}
