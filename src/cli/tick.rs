use crate::core::settings::{Secrets, Settings};
use crate::daemon::{build_loop, TickReport};
use crate::sink::{BulkSink, ElasticSink, StdoutSink};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Runs exactly one tick. With `dry_run`, documents go to stdout instead of
/// the cluster and only the billing key is required.
pub async fn run(settings: Settings, dry_run: bool) -> Result<()> {
    let (billing_api_key, sink): (String, Arc<dyn BulkSink>) = if dry_run {
        let sink: Arc<dyn BulkSink> = Arc::new(StdoutSink);
        (Secrets::billing_only_from_env()?, sink)
    } else {
        let secrets = Secrets::from_env()?;
        let sink: Arc<dyn BulkSink> = Arc::new(
            ElasticSink::connect(
                &secrets.cluster_locator,
                &secrets.cluster_api_key,
                settings.sink.chunk_size,
            )
            .context("Failed to set up elasticsearch sink")?,
        );
        (secrets.billing_api_key, sink)
    };

    let mut ingest = build_loop(&settings, &billing_api_key, sink).await?;
    let report = ingest.tick().await.context("Tick failed")?;

    log_report(&report, dry_run);
    Ok(())
}

fn log_report(report: &TickReport, dry_run: bool) {
    let (submitted, failed) = report
        .bulk
        .map(|summary| (summary.submitted, summary.failed))
        .unwrap_or_default();

    tracing::info!(
        timestamp = %report.timestamp,
        executed = ?report.executed,
        skipped = ?report.skipped,
        documents = report.documents,
        submitted,
        failed,
        dry_run,
        "Tick finished"
    );
}
