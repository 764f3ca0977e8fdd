//! Elasticsearch `_bulk` writer.
//!
//! Documents are framed as NDJSON: one `{"index":{"_index":...}}` action line
//! followed by the source line, each terminated by `\n` (the trailing newline
//! is mandatory for `_bulk`). Large batches are split into several requests.

use crate::core::error::SinkError;
use crate::core::models::Document;
use crate::sink::{BulkSink, BulkSummary};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_CLOUD_PORT: &str = "443";

/// Resolves a cluster locator to the Elasticsearch base URL.
///
/// Accepts either a plain `http(s)://` URL or an Elastic Cloud id of the form
/// `name:base64(host[:port]$es_uuid$kibana_uuid)`.
pub fn resolve_cluster_url(locator: &str) -> Result<String, SinkError> {
    let locator = locator.trim();
    if locator.starts_with("http://") || locator.starts_with("https://") {
        return Ok(locator.trim_end_matches('/').to_string());
    }

    let encoded = match locator.split_once(':') {
        Some((_, encoded)) => encoded,
        None => locator,
    };

    let decoded = STANDARD
        .decode(encoded)
        .or_else(|_| STANDARD_NO_PAD.decode(encoded))
        .map_err(|e| SinkError::InvalidLocator(format!("cloud id is not base64: {e}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| SinkError::InvalidLocator("cloud id is not utf-8".to_string()))?;

    let mut parts = decoded.trim_end_matches('$').split('$');
    let host = parts.next().unwrap_or_default();
    let es_uuid = parts.next().unwrap_or_default();
    if host.is_empty() || es_uuid.is_empty() {
        return Err(SinkError::InvalidLocator(
            "cloud id does not contain a host and elasticsearch id".to_string(),
        ));
    }

    let (host, port) = match host.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (host, DEFAULT_CLOUD_PORT),
    };

    Ok(format!("https://{es_uuid}.{host}:{port}"))
}

#[derive(Serialize)]
struct BulkAction<'a> {
    index: BulkTarget<'a>,
}

#[derive(Serialize)]
struct BulkTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
}

/// Builds an NDJSON `_bulk` body for `documents`.
pub fn compose_bulk_body(documents: &[Document]) -> Result<String, SinkError> {
    let mut payload = String::new();
    for document in documents {
        let action = BulkAction {
            index: BulkTarget {
                index: document.index(),
            },
        };
        payload.push_str(&serde_json::to_string(&action).map_err(SinkError::Encode)?);
        payload.push('\n');
        payload.push_str(&serde_json::to_string(document.source()).map_err(SinkError::Encode)?);
        payload.push('\n');
    }
    Ok(payload)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl BulkItem {
    fn failed(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }
}

fn count_failures(response: &BulkResponse) -> usize {
    if !response.errors {
        return 0;
    }
    response
        .items
        .iter()
        .flat_map(|item| item.values())
        .filter(|item| item.failed())
        .count()
}

pub struct ElasticSink {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chunk_size: usize,
}

impl ElasticSink {
    pub fn connect(locator: &str, api_key: &str, chunk_size: usize) -> Result<Self, SinkError> {
        let base_url = resolve_cluster_url(locator)?;
        tracing::info!(url = %base_url, "Connecting to elasticsearch cluster");

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.to_string(),
            chunk_size: chunk_size.max(1),
        })
    }

    async fn send_chunk(&self, documents: &[Document]) -> Result<BulkSummary, SinkError> {
        let body = compose_bulk_body(documents)?;

        let response = self
            .http
            .post(format!("{}/_bulk", self.base_url))
            .header("Authorization", format!("ApiKey {}", self.api_key))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: BulkResponse = serde_json::from_str(&text).map_err(SinkError::Decode)?;
        Ok(BulkSummary {
            submitted: documents.len(),
            failed: count_failures(&parsed),
        })
    }
}

#[async_trait]
impl BulkSink for ElasticSink {
    async fn bulk(&self, documents: &[Document]) -> Result<BulkSummary, SinkError> {
        let mut summary = BulkSummary::default();

        for chunk in documents.chunks(self.chunk_size) {
            let result = self.send_chunk(chunk).await?;
            if result.failed > 0 {
                tracing::warn!(
                    failed = result.failed,
                    submitted = result.submitted,
                    "Some documents were rejected by the bulk api"
                );
            }
            summary.merge(result);
        }

        Ok(summary)
    }
}
