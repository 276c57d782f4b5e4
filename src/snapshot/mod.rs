//! Client for the provider's asynchronous snapshot API.
//!
//! A job is submitted with `trigger`, polled with `await_completion` until
//! the provider reports a terminal status, and its records are fetched with
//! `download`. [`SnapshotJobClient::run_pipeline`] chains the three and is
//! what request handlers should call.
//!
//! ```rust,ignore
//! let api = HttpSnapshotApi::new(DEFAULT_BASE_URL, token)?;
//! let client = SnapshotJobClient::new(Arc::new(api), PollPolicy::default());
//!
//! let request = JobRequest::new("https://chatgpt.com/", "what's new in rust?", dataset_id);
//! let result = client
//!     .run_pipeline(&request, Duration::from_secs(300), &CancellationToken::new())
//!     .await?;
//! println!("{}", result.first_answer().unwrap_or_default());
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod mock;
pub mod persist;
pub mod types;

pub use api::{DEFAULT_BASE_URL, HttpSnapshotApi, SnapshotApi};
pub use client::{PollPolicy, SnapshotJobClient};
pub use error::SnapshotError;
pub use mock::MockSnapshotApi;
pub use types::{
    JobRequest, ProgressEnvelope, SnapshotFormat, SnapshotId, SnapshotRecord, SnapshotResult,
    SnapshotStatus,
};
