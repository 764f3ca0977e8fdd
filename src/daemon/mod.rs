pub mod polling;

use crate::billing::{resolve_org_id, BillingApi, BillingClient};
use crate::core::schedule::SystemClock;
use crate::core::settings::{Secrets, Settings};
use crate::sink::{BulkSink, ElasticSink};
use anyhow::{Context, Result};
use std::sync::Arc;

pub use polling::{IngestLoop, TickReport};

/// Resolves the organization once and wires up the ingestion loop.
pub async fn build_loop(
    settings: &Settings,
    billing_api_key: &str,
    sink: Arc<dyn BulkSink>,
) -> Result<IngestLoop> {
    let api: Arc<dyn BillingApi> = Arc::new(BillingClient::new(
        settings.billing.base_url.as_str(),
        billing_api_key,
    ));

    let org_id = resolve_org_id(api.as_ref())
        .await
        .context("Failed to resolve organization id")?
        .unwrap_or_else(|| {
            tracing::warn!("No organization id resolved, billing requests will use an empty id");
            String::new()
        });

    Ok(IngestLoop::new(
        api,
        sink,
        Arc::new(SystemClock),
        org_id,
        settings,
    ))
}

pub async fn run(settings: Settings) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ess-billing-ingest");

    let secrets = Secrets::from_env()?;
    let sink = ElasticSink::connect(
        &secrets.cluster_locator,
        &secrets.cluster_api_key,
        settings.sink.chunk_size,
    )
    .context("Failed to set up elasticsearch sink")?;

    let ingest = build_loop(&settings, &secrets.billing_api_key, Arc::new(sink)).await?;
    ingest.run().await.context("Ingestion loop stopped")
}
