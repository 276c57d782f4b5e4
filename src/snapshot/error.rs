use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use super::types::SnapshotId;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Provider request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Provider returned {status} from {endpoint}: {body}")]
    ProviderStatus {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        endpoint: &'static str,
        reason: String,
    },

    #[error("Snapshot {id} failed: {diagnostics}")]
    SnapshotFailed { id: SnapshotId, diagnostics: Value },

    #[error("Snapshot {id} not ready after {elapsed:?}")]
    SnapshotTimeout { id: SnapshotId, elapsed: Duration },

    #[error("Polling for snapshot {id} was cancelled")]
    Cancelled { id: SnapshotId },

    #[error("Failed to write snapshot to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    /// Non-2xx or undecodable responses, and transport failures.
    pub fn is_provider_request(&self) -> bool {
        matches!(
            self,
            SnapshotError::Transport { .. }
                | SnapshotError::ProviderStatus { .. }
                | SnapshotError::MalformedResponse { .. }
        )
    }

    /// Errors worth another poll: the request never got a verdict from the
    /// provider, or the provider asked us to back off.
    pub fn is_transient(&self) -> bool {
        match self {
            SnapshotError::Transport { .. } => true,
            SnapshotError::ProviderStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
