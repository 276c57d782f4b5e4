use axum::{
    routing::{get, post},
    Router,
    extract::{rejection::QueryRejection, Json, Query, State},
    response::IntoResponse,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{CorsLayer, Any};

use crate::error::{Result, AppError};
use crate::api::models::{HealthStatus, QueryParams, ResultsParams};
use crate::api::response;
use crate::snapshot::JobRequest;
use crate::store::{PromptResult, ResultsPage};
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/query", post(query_handler))
        .route("/api/results", get(results_handler))
        .route("/health", get(health_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn query_handler(
    State(state): State<AppState>,
    params: std::result::Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<PromptResult>> {
    let Query(params) = params?;
    let prompt = params.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::BadRequest("prompt must not be empty".to_string()));
    }

    tracing::info!(prompt_len = prompt.len(), "Processing query");
    let start_time = std::time::Instant::now();

    // Polling stops as soon as this handler goes away, including when the
    // client disconnects and axum drops the future.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let result = tokio::time::timeout(
        state.config.request_timeout,
        process_query(&state, prompt, &cancel),
    )
    .await;

    let elapsed = start_time.elapsed();
    match result {
        Ok(Ok(record)) => {
            tracing::info!(id = record.id, ?elapsed, "Query answered");
            Ok(Json(record))
        }
        Ok(Err(err)) => {
            tracing::info!(?elapsed, kind = err.kind(), "Query failed");
            Err(err)
        }
        Err(_) => {
            tracing::warn!(?elapsed, "Query timed out");
            Err(AppError::RequestTimeout)
        }
    }
}

async fn process_query(
    state: &AppState,
    prompt: &str,
    cancel: &CancellationToken,
) -> Result<PromptResult> {
    let request = JobRequest::new(&state.config.target_url, prompt, &state.config.dataset_id);

    let snapshot = state
        .snapshots
        .run_pipeline(&request, state.snapshots.policy().timeout, cancel)
        .await?;

    let answer = match snapshot.first_answer() {
        Some(answer) => answer,
        None if snapshot.is_empty() => {
            return Err(AppError::EmptyAnswer("snapshot contained no records".to_string()));
        }
        None => {
            return Err(AppError::EmptyAnswer(
                "first record has no answer_text_markdown".to_string(),
            ));
        }
    };

    let record = state.store.insert(prompt, answer).await?;
    Ok(record)
}

async fn results_handler(
    State(state): State<AppState>,
    params: std::result::Result<Query<ResultsParams>, QueryRejection>,
) -> Result<Json<ResultsPage>> {
    let Query(params) = params?;
    let (page, page_size) = params.validate()?;
    let page = state.store.list_page(page, page_size).await?;
    tracing::debug!(page = page.page, count = page.results.len(), total = page.total, "Listed results");
    Ok(Json(page))
}

async fn health_handler() -> impl IntoResponse {
    response::success(HealthStatus { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::snapshot::{MockSnapshotApi, PollPolicy, SnapshotJobClient};
    use crate::store::ResultStore;

    async fn state_with(api: MockSnapshotApi) -> (AppState, Arc<MockSnapshotApi>) {
        let config = Config::from_lookup(|key| match key {
            "BRIGHTDATA_TOKEN" => Some("test-token".to_string()),
            "POLL_INTERVAL_SECS" => Some("1".to_string()),
            "POLL_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();

        let api = Arc::new(api);
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
            ..PollPolicy::default()
        };
        let state = AppState {
            config: Arc::new(config),
            snapshots: SnapshotJobClient::new(api.clone(), policy),
            store: ResultStore::in_memory().await.unwrap(),
        };
        (state, api)
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn query_stores_first_answer() {
        let (state, api) = state_with(
            MockSnapshotApi::new()
                .with_statuses(["running", "ready"])
                .with_records(json!([
                    { "answer_text_markdown": "# Five trends" },
                    { "answer_text_markdown": "ignored" },
                ])),
        )
        .await;
        let store = state.store.clone();

        let (status, body) = send(create_router(state), "POST", "/api/query?prompt=business%20trends").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prompt"], json!("business trends"));
        assert_eq!(body["results"], json!("# Five trends"));
        assert!(body["createdAt"].is_string());

        let triggered = api.triggered();
        assert_eq!(triggered[0].target_url, "https://chatgpt.com/");
        assert_eq!(triggered[0].dataset_id, "gd_m7aof0k82r803d5bjm");
        assert_eq!(store.list_page(1, 10).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn failed_snapshot_is_bad_gateway_and_not_stored() {
        let (state, _api) = state_with(MockSnapshotApi::new().with_statuses(["failed"])).await;
        let store = state.store.clone();

        let (status, body) = send(create_router(state), "POST", "/api/query?prompt=hi").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["meta"]["kind"], json!("snapshot_failed"));
        assert_eq!(store.list_page(1, 10).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn empty_snapshot_is_reported() {
        let (state, _api) = state_with(MockSnapshotApi::new().with_records(json!([]))).await;

        let (status, body) = send(create_router(state), "POST", "/api/query?prompt=hi").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["meta"]["kind"], json!("empty_answer"));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let (state, api) = state_with(MockSnapshotApi::new()).await;

        let (status, _) = send(create_router(state), "POST", "/api/query?prompt=%20%20").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(api.triggered().is_empty());
    }

    #[tokio::test]
    async fn missing_prompt_uses_error_envelope() {
        let (state, api) = state_with(MockSnapshotApi::new()).await;

        let (status, body) = send(create_router(state), "POST", "/api/query").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["meta"]["kind"], json!("bad_request"));
        assert!(body["data"].is_null());
        assert!(api.triggered().is_empty());
    }

    #[tokio::test]
    async fn unparsable_page_uses_error_envelope() {
        let (state, _api) = state_with(MockSnapshotApi::new()).await;

        let (status, body) = send(create_router(state), "GET", "/api/results?page=-1").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["meta"]["status"], json!("error"));
        assert_eq!(body["meta"]["kind"], json!("bad_request"));
    }

    #[tokio::test]
    async fn results_are_paginated() {
        let (state, _api) = state_with(MockSnapshotApi::new()).await;
        for i in 0..3 {
            state.store.insert(&format!("p{i}"), "a").await.unwrap();
        }

        let (status, body) = send(create_router(state), "GET", "/api/results?page=2&page_size=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], json!(3));
        assert_eq!(body["page"], json!(2));
        assert_eq!(body["page_size"], json!(2));
        assert_eq!(body["total_pages"], json!(2));
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn oversized_page_is_rejected() {
        let (state, _api) = state_with(MockSnapshotApi::new()).await;

        let (status, body) = send(create_router(state), "GET", "/api/results?page_size=500").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["meta"]["status"], json!("error"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _api) = state_with(MockSnapshotApi::new()).await;

        let (status, body) = send(create_router(state), "GET", "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("ok"));
    }
}
