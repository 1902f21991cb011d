//! Schedule reconciliation.
//!
//! Brings the external reminder schedule for each task into agreement with
//! the task's latest snapshot. The external scheduler cannot replace a
//! schedule atomically, so every (re)creation is delete-then-create and every
//! delete treats "not found" as already done. Both make reprocessing a
//! redelivered record harmless.
//!
//! ## Invariants
//! - At most one schedule per task, named `TaskReminder_<taskId>`.
//! - One record's failure never stops the rest of its batch.
//! - Concurrent records for the same task can still interleave their
//!   delete/create calls; the last create wins. No lock is taken.

pub mod classifier;

pub use classifier::{classify, Action, DeleteReason, IgnoreReason};

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::clients::{
    CreateScheduleRequest, FlexibleTimeWindow, ScheduleState, ScheduleTarget, SchedulerClient,
};
use crate::config::{Config, ReminderTarget};
use crate::schedule::{schedule_expression, schedule_name, schedule_payload, SCHEDULE_TIMEZONE};
use crate::task::record::TASK_ID_ATTR;
use crate::task::{string_attr, ChangeBatch, ChangeRecord, Image, MalformedRecord};

/// Source of the current time. Sampled once per record.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Which scheduler call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOperation {
    Create,
    Delete,
}

impl fmt::Display for ScheduleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A scheduler call failed for a reason other than "not found".
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{operation} of schedule {schedule_name} failed: {message}")]
pub struct SchedulerCallFailed {
    pub operation: ScheduleOperation,
    pub schedule_name: String,
    pub message: String,
}

/// Result of reconciling one change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No external call was made.
    Skipped {
        task_id: Option<String>,
        reason: IgnoreReason,
    },
    /// The task's schedule is gone. `existed` is false when there was
    /// nothing to delete.
    Deleted {
        task_id: String,
        schedule_name: String,
        reason: DeleteReason,
        existed: bool,
    },
    /// A fresh schedule was created. `replaced` is true when a stale one was
    /// cleared first.
    Scheduled {
        task_id: String,
        schedule_name: String,
        fire_at: DateTime<Utc>,
        replaced: bool,
    },
    Failed {
        task_id: String,
        error: SchedulerCallFailed,
    },
}

impl ReconcileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome of one record within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    /// Position of the record in the batch.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub outcome: ReconcileOutcome,
}

/// Per-record outcomes plus totals for one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub scheduled: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            scheduled: 0,
            deleted: 0,
            skipped: 0,
            failed: 0,
            records: Vec::new(),
        }
    }

    fn push(&mut self, index: usize, event_id: Option<String>, outcome: ReconcileOutcome) {
        match &outcome {
            ReconcileOutcome::Scheduled { .. } => self.scheduled += 1,
            ReconcileOutcome::Deleted { .. } => self.deleted += 1,
            ReconcileOutcome::Skipped { .. } => self.skipped += 1,
            ReconcileOutcome::Failed { .. } => self.failed += 1,
        }
        self.records.push(RecordReport {
            index,
            event_id,
            outcome,
        });
    }
}

/// Owns every create/delete call against the external scheduler.
pub struct Reconciler {
    scheduler: Arc<dyn SchedulerClient>,
    target: ReminderTarget,
    offset: Duration,
    clock: Clock,
}

impl Reconciler {
    pub fn new(config: &Config, scheduler: Arc<dyn SchedulerClient>) -> Self {
        Self {
            scheduler,
            target: config.target.clone(),
            offset: config.reminder_offset,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Reconcile every record of a batch, in order, isolating failures.
    pub async fn reconcile_batch(&self, records: &[ChangeRecord]) -> BatchReport {
        self.run_batch(records.iter().map(Ok).collect()).await
    }

    /// Reconcile a raw feed batch. Entries that cannot be parsed are
    /// reported as skipped and the rest of the batch still runs.
    pub async fn reconcile_feed(&self, batch: &ChangeBatch) -> BatchReport {
        let parsed = batch.parse_records();
        self.run_batch(parsed.iter().map(Result::as_ref).collect()).await
    }

    async fn run_batch(
        &self,
        entries: Vec<Result<&ChangeRecord, &MalformedRecord>>,
    ) -> BatchReport {
        let mut report = BatchReport::new();
        let span = tracing::info_span!("batch", batch_id = %report.batch_id, size = entries.len());

        async {
            for (index, entry) in entries.into_iter().enumerate() {
                match entry {
                    Ok(record) => {
                        let outcome = self.reconcile(record).await;
                        report.push(index, record.event_id.clone(), outcome);
                    }
                    Err(malformed) => {
                        tracing::warn!(
                            index,
                            event_id = ?malformed.event_id,
                            error = %malformed.message,
                            "Skipping unreadable change record"
                        );
                        let outcome = ReconcileOutcome::Skipped {
                            task_id: malformed.task_id.clone(),
                            reason: IgnoreReason::MalformedRecord,
                        };
                        report.push(index, malformed.event_id.clone(), outcome);
                    }
                }
            }
            tracing::info!(
                scheduled = report.scheduled,
                deleted = report.deleted,
                skipped = report.skipped,
                failed = report.failed,
                "Processed change batch"
            );
        }
        .instrument(span)
        .await;

        report
    }

    /// Reconcile one record against the current time.
    pub async fn reconcile(&self, record: &ChangeRecord) -> ReconcileOutcome {
        let now = (self.clock)();
        self.reconcile_at(record, now).await
    }

    /// Reconcile one record as of `now`.
    pub async fn reconcile_at(
        &self,
        record: &ChangeRecord,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        match classify(record, now, self.offset) {
            Action::Ignore(reason) => {
                let task_id = record_task_id(record);
                match &reason {
                    IgnoreReason::MissingTaskId | IgnoreReason::MissingNewImage => {
                        tracing::warn!(
                            event = %record.event_kind,
                            event_id = ?record.event_id,
                            ?reason,
                            "Skipping malformed change record"
                        );
                    }
                    _ => {
                        tracing::debug!(task_id = ?task_id, ?reason, "No schedule change needed");
                    }
                }
                ReconcileOutcome::Skipped { task_id, reason }
            }
            Action::DeleteOnly { task_id, reason } => {
                let name = schedule_name(&task_id);
                match self.delete_if_present(&name).await {
                    Ok(existed) => {
                        tracing::info!(
                            task_id = %task_id,
                            ?reason,
                            existed,
                            "Removed reminder schedule"
                        );
                        ReconcileOutcome::Deleted {
                            task_id,
                            schedule_name: name,
                            reason,
                            existed,
                        }
                    }
                    Err(error) => self.failed(task_id, error),
                }
            }
            Action::CreateOrReplace { task_id, fire_at } => {
                // Only reachable with a new image present.
                let Some(image) = record.new_image() else {
                    return ReconcileOutcome::Skipped {
                        task_id: Some(task_id),
                        reason: IgnoreReason::MissingNewImage,
                    };
                };
                self.replace(task_id, fire_at, image).await
            }
        }
    }

    async fn replace(
        &self,
        task_id: String,
        fire_at: DateTime<Utc>,
        image: &Image,
    ) -> ReconcileOutcome {
        let name = schedule_name(&task_id);

        // A failed clearing delete would make the create collide, so stop here.
        let replaced = match self.delete_if_present(&name).await {
            Ok(existed) => existed,
            Err(error) => return self.failed(task_id, error),
        };

        let request = self.create_request(&name, fire_at, image);
        if let Err(e) = self.scheduler.create_schedule(&request).await {
            return self.failed(
                task_id,
                SchedulerCallFailed {
                    operation: ScheduleOperation::Create,
                    schedule_name: name,
                    message: e.to_string(),
                },
            );
        }

        tracing::info!(
            task_id = %task_id,
            schedule = %name,
            fire_at = %fire_at,
            replaced,
            "Created reminder schedule"
        );
        ReconcileOutcome::Scheduled {
            task_id,
            schedule_name: name,
            fire_at,
            replaced,
        }
    }

    /// Delete a schedule, treating "not found" as success. Returns whether a
    /// schedule actually existed.
    async fn delete_if_present(&self, name: &str) -> Result<bool, SchedulerCallFailed> {
        match self.scheduler.delete_schedule(name).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::debug!(schedule = %name, "No schedule to delete");
                Ok(false)
            }
            Err(e) => Err(SchedulerCallFailed {
                operation: ScheduleOperation::Delete,
                schedule_name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn create_request(
        &self,
        name: &str,
        fire_at: DateTime<Utc>,
        image: &Image,
    ) -> CreateScheduleRequest {
        let input = serde_json::Value::Object(schedule_payload(image)).to_string();

        CreateScheduleRequest {
            name: name.to_string(),
            group_name: self.target.group_name.clone(),
            schedule_expression: schedule_expression(fire_at),
            schedule_expression_timezone: SCHEDULE_TIMEZONE.to_string(),
            state: ScheduleState::Enabled,
            flexible_time_window: FlexibleTimeWindow::off(),
            target: ScheduleTarget {
                arn: self.target.dispatcher_arn.clone(),
                role_arn: self.target.role_arn.clone(),
                input,
            },
        }
    }

    fn failed(&self, task_id: String, error: SchedulerCallFailed) -> ReconcileOutcome {
        tracing::error!(task_id = %task_id, error = %error, "Schedule reconciliation failed");
        ReconcileOutcome::Failed { task_id, error }
    }
}

fn record_task_id(record: &ChangeRecord) -> Option<String> {
    record
        .new_image()
        .or_else(|| record.old_image())
        .and_then(|image| string_attr(image, TASK_ID_ATTR))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
