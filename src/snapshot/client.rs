use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use super::api::SnapshotApi;
use super::error::{Result, SnapshotError};
use super::persist;
use super::types::{JobRequest, SnapshotFormat, SnapshotId, SnapshotResult, SnapshotStatus};

/// How `await_completion` paces and bounds its polling.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay between two status polls
    pub interval: Duration,
    /// Give up once this much time has passed since the first poll
    pub timeout: Duration,
    /// Consecutive transient poll failures tolerated before giving up.
    /// Zero propagates the first failure.
    pub transport_retries: u32,
    /// Delay before the first retry, doubled for each further one
    pub retry_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            transport_retries: 0,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Drives one provider job from trigger to downloaded records.
///
/// ```text
/// CREATED -> TRIGGERED -> POLLING* -> READY -> DOWNLOADED
///                             |
///                             +-> FAILED | TIMED_OUT | CANCELLED
/// ```
///
/// Each stage aborts the whole run on error. Nothing is retried across
/// stages and no intermediate state is kept.
#[derive(Clone)]
pub struct SnapshotJobClient {
    api: Arc<dyn SnapshotApi>,
    policy: PollPolicy,
    output_file: Option<PathBuf>,
}

impl SnapshotJobClient {
    pub fn new(api: Arc<dyn SnapshotApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            output_file: None,
        }
    }

    /// Also write every downloaded snapshot to `path`.
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub async fn trigger(&self, request: &JobRequest) -> Result<SnapshotId> {
        let id = self.api.trigger(request).await?;
        tracing::info!(snapshot_id = %id, dataset_id = %request.dataset_id, "Triggered snapshot");
        Ok(id)
    }

    /// Poll until the snapshot is `ready`, has `failed`, the timeout passes,
    /// or `cancel` fires.
    pub async fn await_completion(
        &self,
        id: &SnapshotId,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut polls: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            let progress = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(id, polls)),
                progress = self.api.progress(id) => progress,
                _ = sleep_until(deadline) => return Err(self.timed_out(id, start, polls)),
            };
            polls += 1;

            let wake = match progress {
                Ok(envelope) => {
                    failures = 0;
                    match envelope.status() {
                        SnapshotStatus::Ready => {
                            tracing::info!(snapshot_id = %id, polls, elapsed = ?start.elapsed(), "Snapshot ready");
                            return Ok(());
                        }
                        SnapshotStatus::Failed => {
                            tracing::warn!(snapshot_id = %id, polls, "Snapshot failed");
                            return Err(SnapshotError::SnapshotFailed {
                                id: id.clone(),
                                diagnostics: envelope.diagnostics(),
                            });
                        }
                        SnapshotStatus::Pending(status) => {
                            tracing::debug!(snapshot_id = %id, %status, polls, "Snapshot still running");
                            Instant::now() + self.policy.interval
                        }
                    }
                }
                Err(e) if e.is_transient() && failures < self.policy.transport_retries => {
                    failures += 1;
                    let backoff = self.policy.backoff(failures);
                    tracing::warn!(
                        snapshot_id = %id,
                        error = %e,
                        attempt = failures,
                        ?backoff,
                        "Progress poll failed, retrying"
                    );
                    Instant::now() + backoff
                }
                Err(e) => return Err(e),
            };

            if Instant::now() >= deadline {
                return Err(self.timed_out(id, start, polls));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(id, polls)),
                _ = sleep_until(wake.min(deadline)) => {}
            }

            if Instant::now() >= deadline {
                return Err(self.timed_out(id, start, polls));
            }
        }
    }

    /// Fetch the records of a ready snapshot, writing them out when an
    /// output file is configured.
    pub async fn download(&self, id: &SnapshotId, format: SnapshotFormat) -> Result<SnapshotResult> {
        let records = self.api.snapshot(id, format).await?;
        tracing::info!(snapshot_id = %id, count = records.len(), "Downloaded snapshot");

        if let Some(path) = &self.output_file {
            persist::write_records(path, &records)?;
            tracing::info!(path = %path.display(), count = records.len(), "Saved snapshot records");
        }

        Ok(SnapshotResult::new(records))
    }

    /// trigger, then await completion, then download.
    pub async fn run_pipeline(
        &self,
        request: &JobRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<SnapshotResult> {
        let id = self.trigger(request).await?;
        self.await_completion(&id, timeout, cancel).await?;
        self.download(&id, SnapshotFormat::Json).await
    }

    fn cancelled(&self, id: &SnapshotId, polls: u32) -> SnapshotError {
        tracing::info!(snapshot_id = %id, polls, "Snapshot polling cancelled");
        SnapshotError::Cancelled { id: id.clone() }
    }

    fn timed_out(&self, id: &SnapshotId, start: Instant, polls: u32) -> SnapshotError {
        let elapsed = start.elapsed();
        tracing::warn!(snapshot_id = %id, polls, ?elapsed, "Snapshot polling timed out");
        SnapshotError::SnapshotTimeout {
            id: id.clone(),
            elapsed,
        }
    }
}
