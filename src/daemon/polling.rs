use crate::billing::{fetch_deployments, fetch_itemized, fetch_org_summary, BillingApi};
use crate::core::error::{BillingError, IngestError};
use crate::core::models::{ingestion_timestamp, Document};
use crate::core::schedule::{Clock, Schedule, TaskKind};
use crate::core::settings::{FailurePolicy, IndexSettings, Settings};
use crate::sink::{BulkSink, BulkSummary};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub timestamp: String,
    pub executed: Vec<TaskKind>,
    pub skipped: Vec<TaskKind>,
    pub documents: usize,
    pub bulk: Option<BulkSummary>,
}

impl TickReport {
    fn new(timestamp: String) -> Self {
        Self {
            timestamp,
            executed: Vec::new(),
            skipped: Vec::new(),
            documents: 0,
            bulk: None,
        }
    }
}

/// The ingestion loop. Owns the schedule state and the last fetched
/// deployment inventory; the org id is fixed at construction.
pub struct IngestLoop {
    api: Arc<dyn BillingApi>,
    sink: Arc<dyn BulkSink>,
    clock: Arc<dyn Clock>,
    org_id: String,
    indices: IndexSettings,
    schedule: Schedule,
    policy: FailurePolicy,
    loop_delay: Duration,
    deployments: Option<Vec<Document>>,
}

impl IngestLoop {
    pub fn new(
        api: Arc<dyn BillingApi>,
        sink: Arc<dyn BulkSink>,
        clock: Arc<dyn Clock>,
        org_id: String,
        settings: &Settings,
    ) -> Self {
        Self {
            api,
            sink,
            clock,
            org_id,
            indices: settings.indices.clone(),
            schedule: Schedule::from_settings(&settings.schedule),
            policy: settings.schedule.on_fetch_error,
            loop_delay: settings.schedule.loop_delay(),
            deployments: None,
        }
    }

    #[allow(dead_code)]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Runs ticks until one fails fatally. Never returns `Ok`.
    pub async fn run(mut self) -> Result<(), IngestError> {
        tracing::info!(
            org_id = %self.org_id,
            delay = ?self.loop_delay,
            policy = ?self.policy,
            "Starting main loop"
        );

        loop {
            let report = self.tick().await?;
            tracing::debug!(
                executed = ?report.executed,
                skipped = ?report.skipped,
                documents = report.documents,
                "Tick complete"
            );
            tokio::time::sleep(self.loop_delay).await;
        }
    }

    /// Executes every due task, then writes the tick's batch in one bulk call.
    pub async fn tick(&mut self) -> Result<TickReport, IngestError> {
        let timestamp = ingestion_timestamp(self.clock.now());
        let mut report = TickReport::new(timestamp.clone());
        let mut batch: Vec<Document> = Vec::new();
        tracing::debug!(due = ?self.schedule.due_tasks(self.clock.now()), "Tick started");

        for kind in TaskKind::ORDER {
            let now = self.clock.now();
            let task = self.schedule.task(kind);
            if !task.is_due(now) {
                continue;
            }

            match task.elapsed(now) {
                Some(elapsed) => tracing::info!(
                    task = %kind,
                    elapsed_secs = elapsed.as_secs_f64(),
                    interval_secs = task.interval().as_secs(),
                    "Running task"
                ),
                None => tracing::info!(task = %kind, "Running task for the first time"),
            }

            match self.run_task(kind, &timestamp).await {
                Ok(documents) => {
                    batch.extend(documents);
                    self.schedule.mark_run(kind, self.clock.now());
                    report.executed.push(kind);
                }
                Err(err) if err.is_transport() => {
                    tracing::error!(task = %kind, error = %err, "Billing api unreachable");
                    return Err(err);
                }
                Err(err) => match self.policy {
                    FailurePolicy::Fatal => {
                        tracing::error!(task = %kind, error = %err, "Task failed");
                        return Err(err);
                    }
                    FailurePolicy::SkipTask => {
                        tracing::warn!(task = %kind, error = %err, "Task failed, skipping this tick");
                        report.skipped.push(kind);
                    }
                },
            }
        }

        report.documents = batch.len();
        if !batch.is_empty() {
            tracing::info!(documents = batch.len(), "Sending payload to bulk");
            let summary = self.sink.bulk(&batch).await?;
            report.bulk = Some(summary);
        }

        Ok(report)
    }

    async fn run_task(&mut self, kind: TaskKind, timestamp: &str) -> Result<Vec<Document>, IngestError> {
        match kind {
            TaskKind::DeploymentInventory => {
                let deployments = fetch_deployments(
                    self.api.as_ref(),
                    &self.org_id,
                    &self.indices.deployment,
                    timestamp,
                )
                .await?;
                self.deployments = Some(deployments.clone());
                Ok(deployments)
            }
            TaskKind::OrgSummary => {
                let summary = fetch_org_summary(
                    self.api.as_ref(),
                    &self.org_id,
                    &self.indices.org_summary,
                    timestamp,
                )
                .await?;
                Ok(vec![summary])
            }
            TaskKind::Itemized => {
                let deployments = self
                    .deployments
                    .as_deref()
                    .ok_or(IngestError::NoDeploymentInventory)?;
                let itemized = fetch_all_itemized(
                    self.api.as_ref(),
                    &self.org_id,
                    &self.indices.itemized,
                    deployments,
                    timestamp,
                )
                .await?;
                Ok(itemized)
            }
        }
    }
}

/// Fetches itemized costs for each deployment in order, stopping at the
/// first failure.
pub async fn fetch_all_itemized(
    api: &dyn BillingApi,
    org_id: &str,
    index: &str,
    deployments: &[Document],
    timestamp: &str,
) -> Result<Vec<Document>, BillingError> {
    let mut documents = Vec::with_capacity(deployments.len());
    for deployment in deployments {
        documents.push(fetch_itemized(api, org_id, index, deployment, timestamp).await?);
    }
    Ok(documents)
}
