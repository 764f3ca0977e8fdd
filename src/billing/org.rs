use crate::billing::{endpoints, BillingApi};
use crate::core::error::BillingError;
use serde_json::Value;

/// Looks up the organization id from the account endpoint.
///
/// A non-2xx response is logged and yields `Ok(None)`; callers then carry on
/// with an empty id and the first cost request fails on the malformed path.
pub async fn resolve_org_id(api: &dyn BillingApi) -> Result<Option<String>, BillingError> {
    tracing::info!("Resolving organization id");

    let response = api.get(endpoints::ACCOUNT).await?;

    if !response.is_success() {
        tracing::error!(
            status = response.status,
            body = %response.body_text(),
            "Account lookup failed"
        );
        return Ok(None);
    }

    let body = response.into_success(endpoints::ACCOUNT)?;
    tracing::debug!(account = %body, "Account info");

    let org_id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or(BillingError::MissingField("id"))?;

    tracing::info!(org_id, "Resolved organization id");
    Ok(Some(org_id.to_string()))
}
