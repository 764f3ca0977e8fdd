//! Billing API paths. The organization id is interpolated as-is, so an empty
//! id yields paths like `/api/v1/billing/costs//deployments`.

pub const ACCOUNT: &str = "/api/v1/account";

pub fn org_costs(org_id: &str) -> String {
    format!("/api/v1/billing/costs/{}", org_id)
}

pub fn deployments_costs(org_id: &str) -> String {
    format!("/api/v1/billing/costs/{}/deployments", org_id)
}

pub fn deployment_items(org_id: &str, deployment_id: &str) -> String {
    format!(
        "/api/v1/billing/costs/{}/deployments/{}/items",
        org_id, deployment_id
    )
}
