//! Reminder dispatch.
//!
//! Invoked by the scheduler when a reminder fires. The schedule payload is a
//! snapshot from creation time and may be stale, so only its `taskId` is
//! trusted: status, assignee and deadline are re-read from the task store
//! before anything is sent.
//!
//! Nothing here retries or cleans up. The scheduler removes one-shot
//! schedules itself once they fire.

pub mod compose;

pub use compose::{compose, format_offset, Notification, REMINDER_SUBJECT};

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clients::{DeliveryChannel, Directory, TaskStore};
use crate::config::Config;

/// Body the scheduler delivers at fire time: the payload captured when the
/// schedule was created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FireRequest {
    #[serde(rename = "taskId", default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Remaining payload attributes. Informational only.
    #[serde(flatten)]
    pub advisory: serde_json::Map<String, serde_json::Value>,
}

impl FireRequest {
    /// The task id, if present and non-empty. Used byte for byte, exactly as
    /// the schedule was keyed.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Why a fired reminder was not sent. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TaskNotFound,
    NotActive,
    /// The task lost its assignee or deadline since scheduling.
    IncompleteTask,
    NoContact,
}

/// A collaborator call failed while dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "source", content = "message", rename_all = "snake_case")]
pub enum DispatchFailure {
    #[error("task lookup failed: {0}")]
    TaskStore(String),
    #[error("contact lookup failed: {0}")]
    Directory(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Result of one dispatch invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent {
        task_id: String,
        address: String,
    },
    Skipped {
        task_id: String,
        reason: SkipReason,
    },
    Failed {
        task_id: String,
        error: DispatchFailure,
    },
}

/// Re-validates a fired reminder and delivers it.
pub struct Dispatcher {
    tasks: Arc<dyn TaskStore>,
    directory: Arc<dyn Directory>,
    delivery: Arc<dyn DeliveryChannel>,
    offset: Duration,
}

impl Dispatcher {
    pub fn new(
        config: &Config,
        tasks: Arc<dyn TaskStore>,
        directory: Arc<dyn Directory>,
        delivery: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            tasks,
            directory,
            delivery,
            offset: config.reminder_offset,
        }
    }

    /// Dispatch the reminder for `task_id` based on the task's current state.
    pub async fn dispatch(&self, task_id: &str) -> DispatchOutcome {
        tracing::info!(task_id = %task_id, "Processing reminder");

        let skipped = |reason: SkipReason| DispatchOutcome::Skipped {
            task_id: task_id.to_string(),
            reason,
        };
        let failed = |error: DispatchFailure| {
            tracing::error!(task_id = %task_id, error = %error, "Reminder dispatch failed");
            DispatchOutcome::Failed {
                task_id: task_id.to_string(),
                error,
            }
        };

        let task = match self.tasks.get_task(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::warn!(task_id = %task_id, "Task not found");
                return skipped(SkipReason::TaskNotFound);
            }
            Err(e) => return failed(DispatchFailure::TaskStore(e.to_string())),
        };

        if !task.is_active() {
            tracing::warn!(
                task_id = %task_id,
                status = task.status.as_deref().unwrap_or("unknown"),
                "Task is no longer active"
            );
            return skipped(SkipReason::NotActive);
        }

        let (Some(assignee_id), Some(deadline)) =
            (task.assignee_id.as_deref(), task.deadline.as_deref())
        else {
            tracing::warn!(task_id = %task_id, "Task has no assignee or deadline");
            return skipped(SkipReason::IncompleteTask);
        };

        let address = match self.directory.get_contact_address(assignee_id).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                tracing::warn!(
                    task_id = %task_id,
                    assignee_id = %assignee_id,
                    "No contact address for assignee"
                );
                return skipped(SkipReason::NoContact);
            }
            Err(e) => return failed(DispatchFailure::Directory(e.to_string())),
        };

        let notification = compose(task.title_or_default(), &task.task_id, deadline, self.offset);
        if let Err(e) = self.delivery.send(&address, &notification).await {
            return failed(DispatchFailure::Delivery(e.to_string()));
        }

        tracing::info!(task_id = %task_id, address = %address, "Reminder sent");
        DispatchOutcome::Sent {
            task_id: task_id.to_string(),
            address,
        }
    }
}
