use crate::billing::{ApiResponse, BillingApi};
use crate::core::error::{BillingError, SinkError};
use crate::core::models::Document;
use crate::core::schedule::Clock;
use crate::sink::{BulkSink, BulkSummary};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub fn should_skip_httpmock() -> bool {
    if std::net::TcpListener::bind(("127.0.0.1", 0)).is_ok() {
        return false;
    }
    eprintln!("skipping httpmock test: sandbox forbids binding to localhost");
    true
}

/// Canned billing API. Unknown endpoints answer 404.
#[derive(Default)]
pub struct FakeBillingApi {
    responses: Mutex<HashMap<String, ApiResponse>>,
    calls: Mutex<Vec<String>>,
}

impl FakeBillingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, endpoint: &str, status: u16, body: Value) -> Self {
        self.set(endpoint, ApiResponse::json(status, body));
        self
    }

    pub fn respond_text(self, endpoint: &str, status: u16, body: &str) -> Self {
        self.set(endpoint, ApiResponse::text(status, body));
        self
    }

    pub fn set(&self, endpoint: &str, response: ApiResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl BillingApi for FakeBillingApi {
    async fn get(&self, endpoint: &str) -> Result<ApiResponse, BillingError> {
        self.calls.lock().unwrap().push(endpoint.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| ApiResponse::text(404, "not found")))
    }
}

/// Keeps every batch it receives.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Document>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<Document>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BulkSink for RecordingSink {
    async fn bulk(&self, documents: &[Document]) -> Result<BulkSummary, SinkError> {
        self.batches.lock().unwrap().push(documents.to_vec());
        Ok(BulkSummary {
            submitted: documents.len(),
            failed: 0,
        })
    }
}

/// Rejects every batch as if the cluster answered 503.
#[derive(Default)]
pub struct FailingSink {
    attempts: Mutex<usize>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl BulkSink for FailingSink {
    async fn bulk(&self, _documents: &[Document]) -> Result<BulkSummary, SinkError> {
        *self.attempts.lock().unwrap() += 1;
        Err(SinkError::Status {
            status: 503,
            body: "cluster unavailable".to_string(),
        })
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
