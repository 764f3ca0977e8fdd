use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub const TIMESTAMP_FIELD: &str = "@timestamp";
pub const INDEX_FIELD: &str = "_index";
pub const API_FIELD: &str = "api";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Formats the ingestion timestamp shared by every document produced in a tick.
pub fn ingestion_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// A JSON document bound for one destination index.
///
/// The index is carried next to the source rather than inside it, so the
/// bulk writer can put it on the action line. Serializing a `Document` yields
/// the source object with an extra `_index` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    #[serde(rename = "_index")]
    index: String,
    #[serde(flatten)]
    source: Map<String, Value>,
}

impl Document {
    pub fn new(
        index: impl Into<String>,
        timestamp: impl Into<String>,
        mut source: Map<String, Value>,
    ) -> Self {
        source.remove(INDEX_FIELD);
        source.insert(TIMESTAMP_FIELD.to_string(), Value::String(timestamp.into()));
        Self {
            index: index.into(),
            source,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.source.get(key)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.source.get(TIMESTAMP_FIELD).and_then(Value::as_str)
    }

    #[allow(dead_code)]
    pub fn api(&self) -> Option<&str> {
        self.source.get(API_FIELD).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_timestamp_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap()
            + chrono::Duration::microseconds(123);
        assert_eq!(ingestion_timestamp(now), "2024-03-01T12:00:05.000123Z");
    }

    #[test]
    fn test_timestamp_has_six_fractional_digits_at_zero() {
        let now = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(ingestion_timestamp(now), "2023-12-31T23:59:59.000000Z");
    }

    #[test]
    fn test_document_sets_timestamp_and_index() {
        let source = json!({ "total_cost": 12.5 }).as_object().cloned().unwrap();
        let doc = Document::new("ess.billing", "2024-03-01T12:00:05.000000Z", source);

        assert_eq!(doc.index(), "ess.billing");
        assert_eq!(doc.timestamp(), Some("2024-03-01T12:00:05.000000Z"));
        assert_eq!(doc.get("total_cost"), Some(&json!(12.5)));
    }

    #[test]
    fn test_document_serializes_with_index_key() {
        let source = json!({ "api": "/api/v1/billing/costs/42" })
            .as_object()
            .cloned()
            .unwrap();
        let doc = Document::new("ess.billing", "ts", source);

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "_index": "ess.billing",
                "api": "/api/v1/billing/costs/42",
                "@timestamp": "ts"
            })
        );
    }

    #[test]
    fn test_document_drops_stray_index_from_source() {
        let source = json!({ "_index": "other" }).as_object().cloned().unwrap();
        let doc = Document::new("ess.billing", "ts", source);

        assert!(doc.get("_index").is_none());
        assert_eq!(doc.index(), "ess.billing");
    }
}
