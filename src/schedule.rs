//! Schedule naming and fire-time derivation.
//!
//! Everything here is pure: the same task always maps to the same schedule
//! name, and the same deadline and offset always map to the same fire time.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::task::{AttributeValue, Image};

/// Prefix of every reminder schedule name.
pub const SCHEDULE_NAME_PREFIX: &str = "TaskReminder_";

/// Time zone the scheduler evaluates `at(...)` expressions in.
pub const SCHEDULE_TIMEZONE: &str = "UTC";

#[derive(Debug, Error)]
pub enum DeadlineError {
    #[error("invalid deadline {value:?}: {reason}")]
    Invalid { value: String, reason: String },
}

/// Name of the single schedule owned by a task.
pub fn schedule_name(task_id: &str) -> String {
    format!("{SCHEDULE_NAME_PREFIX}{task_id}")
}

/// Parse a deadline as a strict RFC 3339 offset date-time
/// (`2025-05-01T10:00:00+00:00`, `2025-05-01T10:00:00Z`).
pub fn parse_deadline(text: &str) -> Result<DateTime<FixedOffset>, DeadlineError> {
    let invalid = |reason: String| DeadlineError::Invalid {
        value: text.to_string(),
        reason,
    };

    // chrono also accepts a space or lowercase `t` between date and time.
    if text.as_bytes().get(10) != Some(&b'T') {
        return Err(invalid("expected 'T' between date and time".to_string()));
    }

    DateTime::parse_from_rfc3339(text).map_err(|e| invalid(e.to_string()))
}

/// Fire time for a deadline: `deadline - offset`, normalised to UTC.
pub fn reminder_time(deadline: &str, offset: Duration) -> Result<DateTime<Utc>, DeadlineError> {
    let deadline = parse_deadline(deadline)?;
    Ok(deadline.with_timezone(&Utc) - offset)
}

/// A reminder due at or before `now` can no longer be scheduled.
pub fn is_past(reminder_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    reminder_time <= now
}

/// One-shot scheduler expression for a fire time, in [`SCHEDULE_TIMEZONE`].
pub fn schedule_expression(fire_at: DateTime<Utc>) -> String {
    format!("at({})", fire_at.format("%Y-%m-%dT%H:%M:%S"))
}

/// Payload stored with a schedule and handed back to the dispatcher.
///
/// String attributes are forwarded as plain strings. Other attributes keep
/// their typed wire form so nothing is silently dropped.
pub fn schedule_payload(image: &Image) -> serde_json::Map<String, Value> {
    image
        .iter()
        .map(|(key, value)| {
            let value = match value {
                AttributeValue::String(s) => Value::String(s.clone()),
                other => other.to_typed_json(),
            };
            (key.clone(), value)
        })
        .collect()
}
