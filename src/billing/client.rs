use crate::billing::{ApiResponse, BillingApi};
use crate::core::error::BillingError;
use async_trait::async_trait;

pub struct BillingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BillingClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl BillingApi for BillingClient {
    async fn get(&self, endpoint: &str) -> Result<ApiResponse, BillingError> {
        tracing::info!(endpoint, "Calling billing api");

        let transport = |source: reqwest::Error| BillingError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = self
            .http
            .get(self.url_for(endpoint))
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            tracing::debug!(endpoint, status = status.as_u16(), "Billing api returned non-success");
            return Ok(ApiResponse::text(status.as_u16(), text));
        }

        // 204 and friends carry no body
        if text.trim().is_empty() {
            return Ok(ApiResponse::json(status.as_u16(), serde_json::Value::Null));
        }

        let body = serde_json::from_str(&text).map_err(|source| BillingError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;

        Ok(ApiResponse::json(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::should_skip_httpmock;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    #[test]
    fn test_url_joins_base_and_path() {
        let client = BillingClient::new("https://api.elastic-cloud.com/", "key");
        assert_eq!(
            client.url_for("/api/v1/account"),
            "https://api.elastic-cloud.com/api/v1/account"
        );
    }

    #[tokio::test]
    async fn test_get_sends_api_key_and_decodes_json() {
        if should_skip_httpmock() {
            return;
        }
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/account")
                    .header("authorization", "ApiKey secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "id": "org-1" }));
            })
            .await;

        let client = BillingClient::new(server.base_url(), "ApiKey secret");
        let response = client.get("/api/v1/account").await.unwrap();

        mock.assert_async().await;
        assert_eq!(response, ApiResponse::json(200, json!({ "id": "org-1" })));
    }

    #[tokio::test]
    async fn test_non_success_is_returned_not_raised() {
        if should_skip_httpmock() {
            return;
        }
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/billing/costs/org-1/deployments");
                then.status(404).body("not found");
            })
            .await;

        let client = BillingClient::new(server.base_url(), "key");
        let response = client
            .get("/api/v1/billing/costs/org-1/deployments")
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body_text(), "not found");
    }

    #[tokio::test]
    async fn test_undecodable_success_body_is_error() {
        if should_skip_httpmock() {
            return;
        }
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/account");
                then.status(200).body("<html>");
            })
            .await;

        let client = BillingClient::new(server.base_url(), "key");
        let err = client.get("/api/v1/account").await.unwrap_err();
        assert!(matches!(err, BillingError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        if should_skip_httpmock() {
            return;
        }
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/account");
                then.status(204);
            })
            .await;

        let client = BillingClient::new(server.base_url(), "key");
        let response = client.get("/api/v1/account").await.unwrap();
        assert_eq!(response, ApiResponse::json(204, json!(null)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = match std::net::TcpListener::bind(("127.0.0.1", 0)) {
            Ok(listener) => listener,
            Err(_) => return,
        };
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = BillingClient::new(format!("http://127.0.0.1:{port}"), "key");
        let err = client.get("/api/v1/account").await.unwrap_err();
        assert!(matches!(err, BillingError::Transport { .. }));
    }
}
