//! Reminder dispatch against in-memory collaborators.

use std::sync::Arc;

use deadline_reminders::dispatch::{DispatchFailure, DispatchOutcome, Dispatcher, SkipReason};
use deadline_reminders::task::image_from_strings;
use deadline_reminders::testing::{
    test_config, InMemoryDelivery, InMemoryDirectory, InMemoryTaskStore,
};

struct World {
    tasks: Arc<InMemoryTaskStore>,
    directory: Arc<InMemoryDirectory>,
    delivery: Arc<InMemoryDelivery>,
    dispatcher: Dispatcher,
}

fn world() -> World {
    let tasks = Arc::new(InMemoryTaskStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let delivery = Arc::new(InMemoryDelivery::new());
    let dispatcher = Dispatcher::new(
        &test_config(),
        tasks.clone(),
        directory.clone(),
        delivery.clone(),
    );
    World {
        tasks,
        directory,
        delivery,
        dispatcher,
    }
}

fn t1(status: &str) -> deadline_reminders::task::Image {
    image_from_strings([
        ("taskId", "t1"),
        ("status", status),
        ("deadline", "2025-05-01T10:00:00+00:00"),
        ("assigneeId", "u1"),
        ("title", "Quarterly review"),
    ])
}

#[tokio::test]
async fn active_task_is_reminded() {
    let w = world();
    w.tasks.insert(t1("active"));
    w.directory.insert("u1", "u1@example.com");

    let outcome = w.dispatcher.dispatch("t1").await;

    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            task_id: "t1".to_string(),
            address: "u1@example.com".to_string(),
        }
    );
    let sent = w.delivery.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.subject, "Task Reminder");
    assert_eq!(
        sent[0].1.body,
        "Reminder: Task 'Quarterly review' (ID: t1) is due in 1 hour at 2025-05-01T10:00:00+00:00."
    );
}

#[tokio::test]
async fn task_completed_after_scheduling_is_not_reminded() {
    let w = world();
    w.tasks.insert(t1("completed"));
    w.directory.insert("u1", "u1@example.com");

    let outcome = w.dispatcher.dispatch("t1").await;

    assert_eq!(
        outcome,
        DispatchOutcome::Skipped {
            task_id: "t1".to_string(),
            reason: SkipReason::NotActive,
        }
    );
    assert!(w.delivery.sent().is_empty());
}

#[tokio::test]
async fn assignee_without_contact_is_skipped() {
    let w = world();
    w.tasks.insert(t1("active"));

    let outcome = w.dispatcher.dispatch("t1").await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Skipped {
            reason: SkipReason::NoContact,
            ..
        }
    ));
    assert!(w.delivery.sent().is_empty());
}

#[tokio::test]
async fn directory_outage_is_a_failure() {
    let w = world();
    w.tasks.insert(t1("active"));
    w.directory.fail_with("directory unavailable");

    let outcome = w.dispatcher.dispatch("t1").await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Failed {
            error: DispatchFailure::Directory(_),
            ..
        }
    ));
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["outcome"], "failed");
    assert_eq!(json["error"]["source"], "directory");
}
