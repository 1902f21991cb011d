//! In-memory collaborators and fixtures for exercising the reconciler,
//! dispatcher and HTTP API without any external service.
//!
//! Each fake records the calls it receives and can be told to fail, so tests
//! can assert both on outcomes and on the exact traffic that was generated.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::clients::{
    ClientError, CreateScheduleRequest, DeliveryChannel, Directory, SchedulerClient,
    SchedulerError, TaskStore,
};
use crate::config::{Config, ReminderTarget, ServiceUrls};
use crate::dispatch::Notification;
use crate::reconcile::Clock;
use crate::task::record::TASK_ID_ATTR;
use crate::task::{string_attr, Image, Task};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Configuration with fixed identifiers and a one hour reminder offset.
pub fn test_config() -> Config {
    Config {
        reminder_offset: Duration::minutes(60),
        target: ReminderTarget {
            dispatcher_arn: "arn:test:dispatcher".to_string(),
            role_arn: "arn:test:scheduler-role".to_string(),
            group_name: "default".to_string(),
        },
        user_pool_id: "test-pool".to_string(),
        table_name: "tasks".to_string(),
        topic_arn: "arn:test:topic".to_string(),
        services: ServiceUrls {
            scheduler: "http://127.0.0.1:9".to_string(),
            task_store: "http://127.0.0.1:9".to_string(),
            directory: "http://127.0.0.1:9".to_string(),
            delivery: "http://127.0.0.1:9".to_string(),
            api_key: None,
        },
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

/// A clock frozen at `at`.
pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

/// A call received by [`InMemoryScheduler`], by schedule name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Create(String),
    Delete(String),
}

/// Scheduler with the same name semantics as the real one: creating an
/// existing name conflicts and deleting a missing name is "not found".
#[derive(Default)]
pub struct InMemoryScheduler {
    /// Seeded schedules have no request body.
    schedules: Mutex<HashMap<String, Option<CreateScheduleRequest>>>,
    calls: Mutex<Vec<SchedulerCall>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_creates: Mutex<HashSet<String>>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a schedule already exists, e.g. from an earlier run.
    pub fn seed(&self, name: &str) {
        lock(&self.schedules).insert(name.to_string(), None);
    }

    pub fn fail_deletes_for(&self, name: &str) {
        lock(&self.failing_deletes).insert(name.to_string());
    }

    pub fn fail_creates_for(&self, name: &str) {
        lock(&self.failing_creates).insert(name.to_string());
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<SchedulerCall> {
        lock(&self.calls).clone()
    }

    /// The request a live schedule was created with.
    pub fn schedule(&self, name: &str) -> Option<CreateScheduleRequest> {
        lock(&self.schedules).get(name).cloned().flatten()
    }

    pub fn exists(&self, name: &str) -> bool {
        lock(&self.schedules).contains_key(name)
    }

    /// Names of all live schedules, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.schedules).keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl SchedulerClient for InMemoryScheduler {
    async fn create_schedule(&self, request: &CreateScheduleRequest) -> Result<(), SchedulerError> {
        lock(&self.calls).push(SchedulerCall::Create(request.name.clone()));

        if lock(&self.failing_creates).contains(&request.name) {
            return Err(SchedulerError::Http {
                status: 500,
                body: "injected create failure".to_string(),
            });
        }

        let mut schedules = lock(&self.schedules);
        if schedules.contains_key(&request.name) {
            return Err(SchedulerError::Conflict(request.name.clone()));
        }
        schedules.insert(request.name.clone(), Some(request.clone()));
        Ok(())
    }

    async fn delete_schedule(&self, name: &str) -> Result<(), SchedulerError> {
        lock(&self.calls).push(SchedulerCall::Delete(name.to_string()));

        if lock(&self.failing_deletes).contains(name) {
            return Err(SchedulerError::Http {
                status: 500,
                body: "injected delete failure".to_string(),
            });
        }

        match lock(&self.schedules).remove(name) {
            Some(_) => Ok(()),
            None => Err(SchedulerError::NotFound(name.to_string())),
        }
    }
}

/// Task store keyed by `taskId`.
#[derive(Default)]
pub struct InMemoryTaskStore {
    items: Mutex<HashMap<String, Image>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an image under its `taskId`. Images without one are dropped.
    pub fn insert(&self, image: Image) {
        if let Some(id) = string_attr(&image, TASK_ID_ATTR).map(str::to_string) {
            lock(&self.items).insert(id, image);
        }
    }

    /// Make every subsequent lookup fail.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ClientError> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(ClientError::Http {
                service: "task store",
                status: 503,
                body: message,
            });
        }
        Ok(lock(&self.items).get(task_id).and_then(Task::from_image))
    }
}

/// Directory mapping assignee ids to contact addresses.
#[derive(Default)]
pub struct InMemoryDirectory {
    contacts: Mutex<HashMap<String, String>>,
    lookups: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, assignee_id: &str, address: &str) {
        lock(&self.contacts).insert(assignee_id.to_string(), address.to_string());
    }

    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    /// Assignee ids looked up so far.
    pub fn lookups(&self) -> Vec<String> {
        lock(&self.lookups).clone()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn get_contact_address(&self, assignee_id: &str) -> Result<Option<String>, ClientError> {
        lock(&self.lookups).push(assignee_id.to_string());
        if let Some(message) = lock(&self.failure).clone() {
            return Err(ClientError::Http {
                service: "directory",
                status: 503,
                body: message,
            });
        }
        Ok(lock(&self.contacts).get(assignee_id).cloned())
    }
}

/// Delivery channel that keeps every message it is asked to send.
#[derive(Default)]
pub struct InMemoryDelivery {
    sent: Mutex<Vec<(String, Notification)>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    /// `(address, notification)` pairs delivered so far.
    pub fn sent(&self) -> Vec<(String, Notification)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl DeliveryChannel for InMemoryDelivery {
    async fn send(&self, address: &str, notification: &Notification) -> Result<(), ClientError> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(ClientError::Http {
                service: "delivery",
                status: 503,
                body: message,
            });
        }
        lock(&self.sent).push((address.to_string(), notification.clone()));
        Ok(())
    }
}
