//! External service clients.
//!
//! Each collaborator sits behind a trait so the reconciler and dispatcher can
//! be driven against in-memory implementations (see [`crate::testing`]). The
//! HTTP implementations talk to plain REST resources with bearer auth.

mod delivery;
mod directory;
mod error;
mod http;
mod scheduler;
mod task_store;

pub use delivery::HttpDeliveryChannel;
pub use directory::{contact_address, HttpDirectory, UserAttribute, CONTACT_ATTRIBUTE};
pub use error::{ClientError, SchedulerError};
pub use http::ServiceEndpoint;
pub use scheduler::{
    CreateScheduleRequest, FlexibleTimeWindow, FlexibleTimeWindowMode, HttpSchedulerClient,
    ScheduleState, ScheduleTarget,
};
pub use task_store::HttpTaskStore;

use async_trait::async_trait;

use crate::dispatch::Notification;
use crate::task::Task;

/// The external time-triggered scheduler.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Create a one-shot schedule. Fails with [`SchedulerError::Conflict`]
    /// when a schedule with the same name already exists.
    async fn create_schedule(&self, request: &CreateScheduleRequest) -> Result<(), SchedulerError>;

    /// Delete a schedule by name. Fails with [`SchedulerError::NotFound`]
    /// when there is nothing to delete.
    async fn delete_schedule(&self, name: &str) -> Result<(), SchedulerError>;
}

/// Authoritative task state.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ClientError>;
}

/// Resolves an assignee to a contact address.
#[async_trait]
pub trait Directory: Send + Sync {
    /// `Ok(None)` when the user is unknown or has no usable contact.
    async fn get_contact_address(&self, assignee_id: &str) -> Result<Option<String>, ClientError>;
}

/// Outbound message delivery.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, address: &str, notification: &Notification) -> Result<(), ClientError>;
}
