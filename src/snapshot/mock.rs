use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::api::SnapshotApi;
use super::error::{Result, SnapshotError};
use super::types::{JobRequest, ProgressEnvelope, SnapshotFormat, SnapshotId, SnapshotRecord};

/// Scripted provider for tests.
///
/// Progress responses are served in order; the last one repeats forever.
/// An `Err(status)` entry is reported as a provider status error.
pub struct MockSnapshotApi {
    snapshot_id: String,
    trigger_error: Option<u16>,
    progress: Mutex<VecDeque<std::result::Result<Value, u16>>>,
    records: Value,
    progress_delay: Option<Duration>,
    triggered: Mutex<Vec<JobRequest>>,
    downloaded: Mutex<Vec<SnapshotId>>,
    progress_calls: AtomicUsize,
}

impl Default for MockSnapshotApi {
    fn default() -> Self {
        Self {
            snapshot_id: "s_mock".to_string(),
            trigger_error: None,
            progress: Mutex::new(VecDeque::from([Ok(json!({ "status": "ready" }))])),
            records: json!([]),
            progress_delay: None,
            triggered: Mutex::new(Vec::new()),
            downloaded: Mutex::new(Vec::new()),
            progress_calls: AtomicUsize::new(0),
        }
    }
}

impl MockSnapshotApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_id(mut self, id: &str) -> Self {
        self.snapshot_id = id.to_string();
        self
    }

    pub fn with_trigger_error(mut self, status: u16) -> Self {
        self.trigger_error = Some(status);
        self
    }

    pub fn with_statuses<'a>(self, statuses: impl IntoIterator<Item = &'a str>) -> Self {
        self.with_progress(
            statuses
                .into_iter()
                .map(|status| Ok(json!({ "status": status })))
                .collect(),
        )
    }

    pub fn with_progress(self, progress: Vec<std::result::Result<Value, u16>>) -> Self {
        *self.progress.lock().unwrap() = progress.into();
        self
    }

    pub fn with_records(mut self, records: Value) -> Self {
        self.records = records;
        self
    }

    /// Make every progress call take `delay` before answering.
    pub fn with_progress_delay(mut self, delay: Duration) -> Self {
        self.progress_delay = Some(delay);
        self
    }

    pub fn progress_calls(&self) -> usize {
        self.progress_calls.load(Ordering::SeqCst)
    }

    pub fn triggered(&self) -> Vec<JobRequest> {
        self.triggered.lock().unwrap().clone()
    }

    pub fn downloaded(&self) -> Vec<SnapshotId> {
        self.downloaded.lock().unwrap().clone()
    }

    fn next_progress(&self) -> std::result::Result<Value, u16> {
        let mut queue = self.progress.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Err(500))
        } else {
            queue.front().cloned().unwrap_or(Err(500))
        }
    }
}

fn status_error(endpoint: &'static str, status: u16) -> SnapshotError {
    SnapshotError::ProviderStatus {
        endpoint,
        status,
        body: String::new(),
    }
}

fn malformed(endpoint: &'static str, e: serde_json::Error) -> SnapshotError {
    SnapshotError::MalformedResponse {
        endpoint,
        reason: e.to_string(),
    }
}

#[async_trait]
impl SnapshotApi for MockSnapshotApi {
    async fn trigger(&self, request: &JobRequest) -> Result<SnapshotId> {
        if let Some(status) = self.trigger_error {
            return Err(status_error("trigger", status));
        }
        self.triggered.lock().unwrap().push(request.clone());
        Ok(SnapshotId::new(self.snapshot_id.clone()))
    }

    async fn progress(&self, _id: &SnapshotId) -> Result<ProgressEnvelope> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.progress_delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_progress() {
            Ok(body) => serde_json::from_value(body).map_err(|e| malformed("progress", e)),
            Err(status) => Err(status_error("progress", status)),
        }
    }

    async fn snapshot(
        &self,
        id: &SnapshotId,
        _format: SnapshotFormat,
    ) -> Result<Vec<SnapshotRecord>> {
        self.downloaded.lock().unwrap().push(id.clone());
        serde_json::from_value(self.records.clone()).map_err(|e| malformed("snapshot", e))
    }
}
