//! Decides what a single change record means for its task's schedule.
//!
//! The decision depends only on the record's content, `now`, and the
//! reminder offset. No cursor or prior state is consulted, so redelivered
//! and reordered records are classified exactly like fresh ones.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::schedule::{is_past, reminder_time};
use crate::task::record::{ASSIGNEE_ATTR, DEADLINE_ATTR, STATUS_ATTR, TASK_ID_ATTR};
use crate::task::{is_active_status, string_attr, ChangeRecord, EventKind, Image};

/// Why a record needs no external call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Deletions and unknown event kinds are not acted on.
    UnsupportedEvent { event: String },
    MissingNewImage,
    MissingTaskId,
    /// A modification that touched neither the deadline nor the assignee.
    Unchanged,
    /// The feed entry could not be read as a change record.
    MalformedRecord,
}

/// Why a task's schedule must be removed rather than (re)created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    NotActive,
    NoDeadline,
    InvalidDeadline,
    ReminderInPast,
}

/// Reconciliation action for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Ignore(IgnoreReason),
    DeleteOnly {
        task_id: String,
        reason: DeleteReason,
    },
    CreateOrReplace {
        task_id: String,
        fire_at: DateTime<Utc>,
    },
}

/// Classify a change record.
pub fn classify(record: &ChangeRecord, now: DateTime<Utc>, offset: Duration) -> Action {
    let kind = &record.event_kind;
    if !kind.is_actionable() {
        return Action::Ignore(IgnoreReason::UnsupportedEvent {
            event: kind.to_string(),
        });
    }

    let Some(new_image) = record.new_image() else {
        return Action::Ignore(IgnoreReason::MissingNewImage);
    };

    let Some(task_id) = string_attr(new_image, TASK_ID_ATTR).filter(|id| !id.is_empty()) else {
        return Action::Ignore(IgnoreReason::MissingTaskId);
    };
    let task_id = task_id.to_string();

    let delete = |reason| Action::DeleteOnly {
        task_id: task_id.clone(),
        reason,
    };

    if !is_active_status(string_attr(new_image, STATUS_ATTR)) {
        return delete(DeleteReason::NotActive);
    }

    let Some(deadline) = string_attr(new_image, DEADLINE_ATTR) else {
        return delete(DeleteReason::NoDeadline);
    };
    let fire_at = match reminder_time(deadline, offset) {
        Ok(fire_at) => fire_at,
        Err(_) => return delete(DeleteReason::InvalidDeadline),
    };

    if *kind == EventKind::Modify && !reminder_fields_changed(record.old_image(), new_image) {
        return Action::Ignore(IgnoreReason::Unchanged);
    }

    if is_past(fire_at, now) {
        return delete(DeleteReason::ReminderInPast);
    }

    Action::CreateOrReplace { task_id, fire_at }
}

/// Whether the deadline or assignee differs between the two images.
/// A missing old image counts every field as absent.
fn reminder_fields_changed(old_image: Option<&Image>, new_image: &Image) -> bool {
    [DEADLINE_ATTR, ASSIGNEE_ATTR].iter().any(|key| {
        let old = old_image.and_then(|image| string_attr(image, key));
        old != string_attr(new_image, key)
    })
}
