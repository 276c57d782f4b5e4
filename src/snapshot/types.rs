use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters for one scrape job on the provider.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub target_url: String,
    pub prompt: String,
    pub dataset_id: String,
    pub web_search_enabled: bool,
    pub extra_instructions: String,
    pub discovery: Option<Discovery>,
    /// Dataset-specific inputs (`location`, `check_in`, ...) merged into the
    /// trigger entry as-is.
    pub extra_inputs: Map<String, Value>,
}

/// Discovery mode for datasets that collect from a search input instead of
/// a fixed URL. Sent as `type` and `discover_by` on the trigger query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub kind: String,
    pub discover_by: String,
}

impl JobRequest {
    pub fn new(
        target_url: impl Into<String>,
        prompt: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            target_url: target_url.into(),
            prompt: prompt.into(),
            dataset_id: dataset_id.into(),
            web_search_enabled: false,
            extra_instructions: String::new(),
            discovery: None,
            extra_inputs: Map::new(),
        }
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search_enabled = enabled;
        self
    }

    pub fn with_extra_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.extra_instructions = instructions.into();
        self
    }

    pub fn with_discovery(mut self, kind: impl Into<String>, discover_by: impl Into<String>) -> Self {
        self.discovery = Some(Discovery {
            kind: kind.into(),
            discover_by: discover_by.into(),
        });
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_inputs.insert(key.into(), value.into());
        self
    }

    /// The single-element batch body the trigger endpoint expects.
    ///
    /// Collect-by-URL datasets get the prompt fields. Discovery datasets get
    /// only `url` plus their own inputs.
    pub fn to_payload(&self) -> Vec<TriggerInput<'_>> {
        let prompt_fields = self.discovery.is_none();
        vec![TriggerInput {
            url: &self.target_url,
            prompt: prompt_fields.then_some(self.prompt.as_str()),
            web_search: prompt_fields.then_some(if self.web_search_enabled { "true" } else { "false" }),
            additional_prompt: prompt_fields.then_some(self.extra_instructions.as_str()),
            extra: &self.extra_inputs,
        }]
    }
}

/// One entry of the trigger batch. The dataset wants `web_search` as a string.
#[derive(Debug, Serialize)]
pub struct TriggerInput<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_prompt: Option<&'a str>,
    #[serde(flatten)]
    pub extra: &'a Map<String, Value>,
}

/// Opaque handle for one asynchronous provider job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response body of the trigger endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerEnvelope {
    pub snapshot_id: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Response body of the progress endpoint. Anything besides `status` is
/// kept as diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEnvelope {
    pub status: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ProgressEnvelope {
    pub fn status(&self) -> SnapshotStatus {
        SnapshotStatus::from_raw(&self.status)
    }

    /// The whole envelope as JSON, for error reporting.
    pub fn diagnostics(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// Any non-terminal value (`running`, `starting`, `collecting`, ...).
    Pending(String),
    Ready,
    Failed,
}

impl SnapshotStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "ready" => SnapshotStatus::Ready,
            "failed" => SnapshotStatus::Failed,
            other => SnapshotStatus::Pending(other.to_string()),
        }
    }
}

/// Download formats supported by the snapshot endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Json,
}

impl SnapshotFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
        }
    }
}

/// One record of a downloaded snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotRecord(pub Map<String, Value>);

impl SnapshotRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn answer_text(&self) -> Option<&str> {
        self.get("answer_text_markdown").and_then(Value::as_str)
    }
}

/// Records of a completed snapshot, in provider order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotResult {
    pub records: Vec<SnapshotRecord>,
}

impl SnapshotResult {
    pub fn new(records: Vec<SnapshotRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `answer_text_markdown` of the first record, if any.
    pub fn first_answer(&self) -> Option<&str> {
        self.records.first().and_then(SnapshotRecord::answer_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_matches_trigger_batch_shape() {
        let request = JobRequest::new("https://chatgpt.com/", "what is rust?", "gd_abc")
            .with_extra_instructions("be brief");

        let body = serde_json::to_value(request.to_payload()).unwrap();

        assert_eq!(
            body,
            json!([{
                "url": "https://chatgpt.com/",
                "prompt": "what is rust?",
                "web_search": "false",
                "additional_prompt": "be brief",
            }])
        );
    }

    #[test]
    fn discovery_payload_carries_dataset_inputs_only() {
        let request = JobRequest::new("https://www.booking.com/", "", "gd_booking")
            .with_discovery("discover_new", "search_input")
            .with_input("location", "Lisbon")
            .with_input("check_in", "2025-06-01")
            .with_input("check_out", "2025-06-04")
            .with_input("adults", 2)
            .with_input("rooms", 1)
            .with_input("country", "PT")
            .with_input("currency", "EUR");

        let body = serde_json::to_value(request.to_payload()).unwrap();

        assert_eq!(
            body,
            json!([{
                "url": "https://www.booking.com/",
                "location": "Lisbon",
                "check_in": "2025-06-01",
                "check_out": "2025-06-04",
                "adults": 2,
                "rooms": 1,
                "country": "PT",
                "currency": "EUR",
            }])
        );
    }

    #[test]
    fn web_search_is_sent_as_string() {
        let request = JobRequest::new("u", "p", "d").with_web_search(true);
        let body = serde_json::to_value(request.to_payload()).unwrap();
        assert_eq!(body[0]["web_search"], json!("true"));
    }

    #[test]
    fn progress_keeps_unknown_fields_as_diagnostics() {
        let envelope: ProgressEnvelope = serde_json::from_value(json!({
            "status": "failed",
            "snapshot_id": "s_1",
            "error": "quota exceeded",
        }))
        .unwrap();

        assert_eq!(envelope.status(), SnapshotStatus::Failed);
        assert_eq!(envelope.rest["error"], json!("quota exceeded"));
        assert_eq!(envelope.diagnostics()["status"], json!("failed"));
    }

    #[test]
    fn unknown_status_is_pending() {
        let status = SnapshotStatus::from_raw("collecting");
        assert_eq!(status, SnapshotStatus::Pending("collecting".into()));
        assert_eq!(SnapshotStatus::from_raw("ready"), SnapshotStatus::Ready);
        assert_eq!(SnapshotStatus::from_raw("failed"), SnapshotStatus::Failed);
    }

    #[test]
    fn first_answer_reads_first_record_only() {
        let records: Vec<SnapshotRecord> = serde_json::from_value(json!([
            { "answer_text_markdown": "# first" },
            { "answer_text_markdown": "# second" },
        ]))
        .unwrap();

        assert_eq!(SnapshotResult::new(records).first_answer(), Some("# first"));
        assert_eq!(SnapshotResult::default().first_answer(), None);
    }
}
