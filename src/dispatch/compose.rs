//! Reminder message composition.

use chrono::Duration;
use serde::Serialize;

pub const REMINDER_SUBJECT: &str = "Task Reminder";

/// An outbound reminder message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Build the reminder for a task due `offset` from now.
pub fn compose(title: &str, task_id: &str, deadline: &str, offset: Duration) -> Notification {
    Notification {
        subject: REMINDER_SUBJECT.to_string(),
        body: format!(
            "Reminder: Task '{}' (ID: {}) is due in {} at {}.",
            title,
            task_id,
            format_offset(offset),
            deadline
        ),
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" })
}

/// Human-readable lead time, e.g. `1 hour` or `1 day 2 hours`.
pub fn format_offset(offset: Duration) -> String {
    let minutes = offset.num_minutes().max(0);

    if minutes < 60 {
        plural(minutes, "minute")
    } else if minutes < 24 * 60 {
        let hours = minutes / 60;
        let mins = minutes % 60;
        if mins > 0 {
            format!("{} {}", plural(hours, "hour"), plural(mins, "minute"))
        } else {
            plural(hours, "hour")
        }
    } else {
        let days = minutes / (24 * 60);
        let hours = (minutes % (24 * 60)) / 60;
        if hours > 0 {
            format!("{} {}", plural(days, "day"), plural(hours, "hour"))
        } else {
            plural(days, "day")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose() {
        let message = compose(
            "Complete Report",
            "task123",
            "2025-04-20T12:00:00Z",
            Duration::minutes(60),
        );
        assert_eq!(message.subject, "Task Reminder");
        assert_eq!(
            message.body,
            "Reminder: Task 'Complete Report' (ID: task123) is due in 1 hour at 2025-04-20T12:00:00Z."
        );
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(Duration::minutes(1)), "1 minute");
        assert_eq!(format_offset(Duration::minutes(30)), "30 minutes");
        assert_eq!(format_offset(Duration::minutes(60)), "1 hour");
        assert_eq!(format_offset(Duration::minutes(90)), "1 hour 30 minutes");
        assert_eq!(format_offset(Duration::minutes(120)), "2 hours");
        assert_eq!(format_offset(Duration::minutes(24 * 60)), "1 day");
        assert_eq!(format_offset(Duration::minutes(25 * 60)), "1 day 1 hour");
        assert_eq!(format_offset(Duration::minutes(2 * 24 * 60)), "2 days");
    }
}
