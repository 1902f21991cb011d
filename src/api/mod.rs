//! HTTP API.
//!
//! Exposes the change-feed ingest and the reminder fire endpoint over `axum`.

mod routes;

pub use routes::{router, serve, AppState};
