//! # Deadline Reminders
//!
//! Keeps one reminder schedule per active task in an external time-triggered
//! scheduler, and delivers the reminder when that schedule fires.
//!
//! ## Architecture
//!
//! ```text
//!   task change feed                         external scheduler
//!          │                                          │
//!          ▼                                          │ fires at
//!  ┌──────────────────┐   create/delete    ┌──────────▼─────────┐
//!  │    Reconciler    │ ─────────────────▶ │     Dispatcher     │
//!  │ (classify, then  │  TaskReminder_<id> │ (re-read task,     │
//!  │  delete+create)  │                    │  resolve contact,  │
//!  └──────────────────┘                    │  send)             │
//!                                          └─────────┬──────────┘
//!                                                    ▼
//!                                  task store, directory, delivery
//! ```
//!
//! ## Modules
//! - `task`: task snapshots and change-feed records
//! - `schedule`: schedule naming, deadline parsing, fire-time derivation
//! - `reconcile`: change classification and schedule reconciliation
//! - `dispatch`: fire-time revalidation and notification delivery
//! - `clients`: traits and HTTP adapters for the external services
//! - `api`: HTTP endpoints for the change feed and the scheduler
//! - `testing`: in-memory collaborators (tests and the `testing` feature only)

pub mod api;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod reconcile;
pub mod schedule;
pub mod task;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::Config;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use reconcile::{BatchReport, ReconcileOutcome, Reconciler};
