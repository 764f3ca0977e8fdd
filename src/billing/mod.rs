mod client;
pub mod endpoints;
mod org;
pub mod shapers;

use crate::core::error::BillingError;
use async_trait::async_trait;
use serde_json::Value;

pub use client::BillingClient;
pub use org::resolve_org_id;
pub use shapers::{fetch_deployments, fetch_itemized, fetch_org_summary};

/// Authenticated read access to the billing API.
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// Issues a GET for `endpoint` (a path such as `/api/v1/account`).
    ///
    /// Non-2xx statuses are returned as a response, not an error. Only a
    /// transport failure or an undecodable 2xx body is an `Err`; an empty
    /// 2xx body decodes as JSON `null`.
    async fn get(&self, endpoint: &str) -> Result<ApiResponse, BillingError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    /// Raw text of a non-2xx response, kept for logging.
    Text(String),
}

impl ApiResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(body),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Text(body.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        match &self.body {
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Text(text) => text.clone(),
        }
    }

    /// Returns the JSON body of a 2xx response; anything else becomes
    /// `BillingError::Status` for `endpoint`.
    pub fn into_success(self, endpoint: &str) -> Result<Value, BillingError> {
        if !self.is_success() {
            return Err(BillingError::Status {
                endpoint: endpoint.to_string(),
                status: self.status,
                body: self.body_text(),
            });
        }

        match self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(text) => {
                serde_json::from_str(&text).map_err(|source| BillingError::Decode {
                    endpoint: endpoint.to_string(),
                    source,
                })
            }
        }
    }
}
