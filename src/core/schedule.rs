use crate::core::settings::ScheduleSettings;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    DeploymentInventory,
    OrgSummary,
    Itemized,
}

impl TaskKind {
    /// Execution order within a tick. Inventory comes first so the itemized
    /// task sees the deployment list fetched in the same tick.
    pub const ORDER: [TaskKind; 3] = [
        TaskKind::DeploymentInventory,
        TaskKind::OrgSummary,
        TaskKind::Itemized,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::DeploymentInventory => "deployment_inventory",
            TaskKind::OrgSummary => "org_summary",
            TaskKind::Itemized => "itemized",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct TaskSchedule {
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
}

impl TaskSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[allow(dead_code)]
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// Time since the last run, or `None` if the task has never run.
    /// A clock that went backwards counts as zero elapsed.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_run
            .map(|last| now.signed_duration_since(last).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.elapsed(now) {
            Some(elapsed) => elapsed >= self.interval,
            None => true,
        }
    }

    pub fn mark_run(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    deployment_inventory: TaskSchedule,
    org_summary: TaskSchedule,
    itemized: TaskSchedule,
}

impl Schedule {
    pub fn new(org_summary: Duration, deployment_inventory: Duration, itemized: Duration) -> Self {
        Self {
            deployment_inventory: TaskSchedule::new(deployment_inventory),
            org_summary: TaskSchedule::new(org_summary),
            itemized: TaskSchedule::new(itemized),
        }
    }

    pub fn from_settings(settings: &ScheduleSettings) -> Self {
        Self::new(
            settings.org_summary_interval(),
            settings.deployment_inventory_interval(),
            settings.itemized_interval(),
        )
    }

    pub fn task(&self, kind: TaskKind) -> &TaskSchedule {
        match kind {
            TaskKind::DeploymentInventory => &self.deployment_inventory,
            TaskKind::OrgSummary => &self.org_summary,
            TaskKind::Itemized => &self.itemized,
        }
    }

    pub fn task_mut(&mut self, kind: TaskKind) -> &mut TaskSchedule {
        match kind {
            TaskKind::DeploymentInventory => &mut self.deployment_inventory,
            TaskKind::OrgSummary => &mut self.org_summary,
            TaskKind::Itemized => &mut self.itemized,
        }
    }

    pub fn is_due(&self, kind: TaskKind, now: DateTime<Utc>) -> bool {
        self.task(kind).is_due(now)
    }

    pub fn mark_run(&mut self, kind: TaskKind, at: DateTime<Utc>) {
        self.task_mut(kind).mark_run(at);
    }

    pub fn due_tasks(&self, now: DateTime<Utc>) -> Vec<TaskKind> {
        TaskKind::ORDER
            .into_iter()
            .filter(|kind| self.is_due(*kind, now))
            .collect()
    }
}
