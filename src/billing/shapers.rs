//! Fetch-and-shape operations for the three billing tasks.
//!
//! Each `fetch_*` issues one request and hands the decoded body to the
//! matching `shape_*` function. The shaping half is pure: the same body and
//! timestamp always produce the same documents.

use crate::billing::{endpoints, BillingApi};
use crate::core::error::BillingError;
use crate::core::models::{Document, API_FIELD};
use serde_json::{Map, Value};

/// Line-item arrays in the itemized response that get keyed by SKU.
pub const SKU_KEYED_FIELDS: [&str; 2] = ["data_transfer_and_storage", "resources"];

pub async fn fetch_org_summary(
    api: &dyn BillingApi,
    org_id: &str,
    index: &str,
    timestamp: &str,
) -> Result<Document, BillingError> {
    tracing::info!(org_id, "Pulling organization summary");

    let endpoint = endpoints::org_costs(org_id);
    let body = api.get(&endpoint).await?.into_success(&endpoint)?;

    let document = shape_org_summary(body, org_id, index, &endpoint, timestamp)?;
    tracing::debug!(document = ?document, "Shaped organization summary");
    Ok(document)
}

pub async fn fetch_deployments(
    api: &dyn BillingApi,
    org_id: &str,
    index: &str,
    timestamp: &str,
) -> Result<Vec<Document>, BillingError> {
    tracing::info!(org_id, "Pulling deployment inventory");

    let endpoint = endpoints::deployments_costs(org_id);
    let response = api.get(&endpoint).await?;
    if !response.is_success() {
        tracing::error!(status = response.status, %endpoint, "Deployment inventory request failed");
    }
    let body = response.into_success(&endpoint)?;

    let documents = shape_deployments(body, index, &endpoint, timestamp)?;
    tracing::debug!(count = documents.len(), "Shaped deployment inventory");
    Ok(documents)
}

pub async fn fetch_itemized(
    api: &dyn BillingApi,
    org_id: &str,
    index: &str,
    deployment: &Document,
    timestamp: &str,
) -> Result<Document, BillingError> {
    let deployment = DeploymentRef::from_document(deployment)?;
    tracing::info!(org_id, deployment_id = %deployment.path_id(), "Pulling itemized costs");

    let endpoint = endpoints::deployment_items(org_id, &deployment.path_id());
    let body = api.get(&endpoint).await?.into_success(&endpoint)?;

    let document = shape_itemized(body, &deployment, index, &endpoint, timestamp)?;
    tracing::debug!(document = ?document, "Shaped itemized costs");
    Ok(document)
}

pub fn shape_org_summary(
    body: Value,
    org_id: &str,
    index: &str,
    endpoint: &str,
    timestamp: &str,
) -> Result<Document, BillingError> {
    let mut source = expect_object(body, endpoint, "response body")?;
    source.insert("org_id".to_string(), Value::String(org_id.to_string()));
    source.insert(API_FIELD.to_string(), Value::String(endpoint.to_string()));
    Ok(Document::new(index, timestamp, source))
}

pub fn shape_deployments(
    body: Value,
    index: &str,
    endpoint: &str,
    timestamp: &str,
) -> Result<Vec<Document>, BillingError> {
    let mut body = expect_object(body, endpoint, "response body")?;

    let deployments = match body.remove("deployments") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(unexpected(endpoint, "`deployments` is not an array")),
        None => return Err(unexpected(endpoint, "missing `deployments`")),
    };

    deployments
        .into_iter()
        .map(|item| {
            let mut source = expect_object(item, endpoint, "deployment entry")?;
            source.insert(API_FIELD.to_string(), Value::String(endpoint.to_string()));
            Ok(Document::new(index, timestamp, source))
        })
        .collect()
}

/// Builds the itemized document for one deployment.
///
/// The injected `deployment` object goes in first, so a top-level
/// `deployment` key in the response replaces it. `@timestamp` is always the
/// tick timestamp.
pub fn shape_itemized(
    body: Value,
    deployment: &DeploymentRef,
    index: &str,
    endpoint: &str,
    timestamp: &str,
) -> Result<Document, BillingError> {
    let body = expect_object(body, endpoint, "response body")?;

    let mut info = Map::new();
    info.insert("deployment_id".to_string(), deployment.id.clone());
    info.insert("deployment_name".to_string(), deployment.name.clone());
    info.insert(API_FIELD.to_string(), Value::String(endpoint.to_string()));

    let mut source = Map::new();
    source.insert("deployment".to_string(), Value::Object(info));
    for (key, value) in body {
        if SKU_KEYED_FIELDS.contains(&key.as_str()) {
            let keyed = rekey_by_sku(value, endpoint, &key)?;
            source.insert(key, Value::Object(keyed));
        } else {
            source.insert(key, value);
        }
    }

    Ok(Document::new(index, timestamp, source))
}

/// Turns an array of line items into an object keyed by each item's `sku`.
/// A repeated SKU keeps the last item.
pub fn rekey_by_sku(
    items: Value,
    endpoint: &str,
    field: &str,
) -> Result<Map<String, Value>, BillingError> {
    let Value::Array(items) = items else {
        return Err(unexpected(endpoint, format!("`{}` is not an array", field)));
    };

    let mut keyed = Map::new();
    for item in items {
        let sku = match item.get("sku") {
            Some(sku) if !sku.is_null() => key_text(sku),
            _ => {
                return Err(unexpected(
                    endpoint,
                    format!("`{}` entry without a sku", field),
                ))
            }
        };
        keyed.insert(sku, item);
    }

    Ok(keyed)
}

/// Identity of a deployment taken from an inventory document.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRef {
    pub id: Value,
    pub name: Value,
}

impl DeploymentRef {
    pub fn from_document(document: &Document) -> Result<Self, BillingError> {
        let id = document
            .get("deployment_id")
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or(BillingError::MissingField("deployment_id"))?;
        let name = document
            .get("deployment_name")
            .cloned()
            .ok_or(BillingError::MissingField("deployment_name"))?;

        Ok(Self { id, name })
    }

    pub fn path_id(&self) -> String {
        key_text(&self.id)
    }
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn expect_object(
    value: Value,
    endpoint: &str,
    what: &str,
) -> Result<Map<String, Value>, BillingError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(unexpected(endpoint, format!("{} is not an object", what))),
    }
}

fn unexpected(endpoint: &str, detail: impl Into<String>) -> BillingError {
    BillingError::UnexpectedShape {
        endpoint: endpoint.to_string(),
        detail: detail.into(),
    }
}
