//! Provider endpoints for asynchronous dataset snapshots.
//!
//! Three calls make up a job: `trigger` starts collection and hands back a
//! snapshot id, `progress` reports its status, and `snapshot` returns the
//! collected records once the status is `ready`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;

use super::error::{Result, SnapshotError};
use super::types::{
    JobRequest, ProgressEnvelope, SnapshotFormat, SnapshotId, SnapshotRecord, TriggerEnvelope,
};

pub const DEFAULT_BASE_URL: &str = "https://api.brightdata.com/datasets/v3";

#[async_trait]
pub trait SnapshotApi: Send + Sync {
    /// Submit a job and return the provider's id for it.
    async fn trigger(&self, request: &JobRequest) -> Result<SnapshotId>;

    /// Read the current status of a job.
    async fn progress(&self, id: &SnapshotId) -> Result<ProgressEnvelope>;

    /// Fetch the records of a completed job.
    async fn snapshot(&self, id: &SnapshotId, format: SnapshotFormat)
    -> Result<Vec<SnapshotRecord>>;
}

/// reqwest-backed implementation talking to the provider over HTTPS.
pub struct HttpSnapshotApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpSnapshotApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|source| SnapshotError::Transport {
                endpoint: "client",
                source,
            })?;

        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn trigger_query(request: &JobRequest) -> Vec<(&'static str, &str)> {
        let mut query = vec![
            ("dataset_id", request.dataset_id.as_str()),
            ("include_errors", "true"),
        ];
        if let Some(discovery) = &request.discovery {
            query.push(("type", discovery.kind.as_str()));
            query.push(("discover_by", discovery.discover_by.as_str()));
        }
        query
    }
}

#[async_trait]
impl SnapshotApi for HttpSnapshotApi {
    async fn trigger(&self, request: &JobRequest) -> Result<SnapshotId> {
        const ENDPOINT: &str = "trigger";

        let url = format!("{}/trigger", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .query(&Self::trigger_query(request))
            .json(&request.to_payload())
            .send()
            .await
            .map_err(|source| SnapshotError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        let envelope: TriggerEnvelope = decode(ENDPOINT, resp).await?;
        if envelope.snapshot_id.is_empty() {
            return Err(SnapshotError::MalformedResponse {
                endpoint: ENDPOINT,
                reason: "empty snapshot_id".to_string(),
            });
        }

        Ok(SnapshotId::new(envelope.snapshot_id))
    }

    async fn progress(&self, id: &SnapshotId) -> Result<ProgressEnvelope> {
        const ENDPOINT: &str = "progress";

        let url = format!("{}/progress/{}", self.base_url, id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| SnapshotError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        decode(ENDPOINT, resp).await
    }

    async fn snapshot(
        &self,
        id: &SnapshotId,
        format: SnapshotFormat,
    ) -> Result<Vec<SnapshotRecord>> {
        const ENDPOINT: &str = "snapshot";

        let url = format!("{}/snapshot/{}", self.base_url, id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("format", format.as_str())])
            .send()
            .await
            .map_err(|source| SnapshotError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        decode(ENDPOINT, resp).await
    }
}

/// Reject non-2xx responses, then decode the body as `T`.
async fn decode<T: DeserializeOwned>(endpoint: &'static str, resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SnapshotError::ProviderStatus {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|source| SnapshotError::Transport { endpoint, source })?;

    serde_json::from_slice(&bytes).map_err(|e| SnapshotError::MalformedResponse {
        endpoint,
        reason: e.to_string(),
    })
}
