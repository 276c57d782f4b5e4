use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::response;
use crate::snapshot::SnapshotError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Snapshot had no answer: {0}")]
    EmptyAnswer(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Request processing timed out")]
    RequestTimeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Snapshot(err) if err.is_provider_request() => StatusCode::BAD_GATEWAY,
            AppError::Snapshot(err) => match err {
                SnapshotError::SnapshotTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                SnapshotError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SnapshotError::Persist { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::EmptyAnswer(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable label so callers can tell a failed provider
    /// job from a timeout from a transport problem.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Snapshot(err) if err.is_provider_request() => "provider_request_error",
            AppError::Snapshot(SnapshotError::SnapshotFailed { .. }) => "snapshot_failed",
            AppError::Snapshot(SnapshotError::SnapshotTimeout { .. }) => "snapshot_timeout",
            AppError::Snapshot(SnapshotError::Cancelled { .. }) => "cancelled",
            AppError::Snapshot(_) => "persist_error",
            AppError::EmptyAnswer(_) => "empty_answer",
            AppError::Store(_) => "store_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::RequestTimeout => "request_timeout",
            AppError::ConfigError(_) => "config_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "Request rejected");
        }

        response::error(status, self.kind(), self.to_string()).into_response()
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotId;
    use std::time::Duration;

    #[test]
    fn provider_outcomes_map_to_distinct_statuses() {
        let failed = AppError::from(SnapshotError::SnapshotFailed {
            id: SnapshotId::new("s"),
            diagnostics: serde_json::Value::Null,
        });
        let timed_out = AppError::from(SnapshotError::SnapshotTimeout {
            id: SnapshotId::new("s"),
            elapsed: Duration::from_secs(300),
        });
        let transport = AppError::from(SnapshotError::ProviderStatus {
            endpoint: "trigger",
            status: 401,
            body: "unauthorized".into(),
        });
        let malformed = AppError::from(SnapshotError::MalformedResponse {
            endpoint: "snapshot",
            reason: "expected a sequence".into(),
        });

        assert_eq!(failed.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(timed_out.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(transport.status_code(), StatusCode::BAD_GATEWAY);

        assert_eq!(failed.kind(), "snapshot_failed");
        assert_eq!(timed_out.kind(), "snapshot_timeout");
        assert_eq!(transport.kind(), "provider_request_error");
        assert_eq!(malformed.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(malformed.kind(), "provider_request_error");
    }
}
