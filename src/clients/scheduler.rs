//! REST client for the time-triggered scheduler service.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};

use super::error::SchedulerError;
use super::http::ServiceEndpoint;
use super::SchedulerClient;

/// Whether the scheduler should fire a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlexibleTimeWindowMode {
    Off,
    Flexible,
}

/// Window within which the scheduler may fire. Reminders always use `OFF`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlexibleTimeWindow {
    pub mode: FlexibleTimeWindowMode,
}

impl FlexibleTimeWindow {
    pub fn off() -> Self {
        Self {
            mode: FlexibleTimeWindowMode::Off,
        }
    }
}

/// What the scheduler invokes at fire time, and as whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleTarget {
    pub arn: String,
    pub role_arn: String,
    /// JSON document delivered to the target.
    pub input: String,
}

/// Body of a create-schedule call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateScheduleRequest {
    pub name: String,
    pub group_name: String,
    pub schedule_expression: String,
    pub schedule_expression_timezone: String,
    pub state: ScheduleState,
    pub flexible_time_window: FlexibleTimeWindow,
    pub target: ScheduleTarget,
}

impl CreateScheduleRequest {
    /// The target input decoded back into JSON.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.target.input)
    }
}

/// Scheduler client speaking the `/schedules/{name}` REST resource.
pub struct HttpSchedulerClient {
    endpoint: ServiceEndpoint,
    group_name: String,
}

impl HttpSchedulerClient {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>, group_name: &str) -> Self {
        Self {
            endpoint: ServiceEndpoint::new(client, base_url, api_key),
            group_name: group_name.to_string(),
        }
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn create_schedule(&self, request: &CreateScheduleRequest) -> Result<(), SchedulerError> {
        let url = self.endpoint.url(&["schedules", &request.name]);
        let resp = self
            .endpoint
            .request(Method::POST, url)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            return Err(SchedulerError::Conflict(request.name.clone()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SchedulerError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn delete_schedule(&self, name: &str) -> Result<(), SchedulerError> {
        let url = self.endpoint.url(&["schedules", name]);
        let resp = self
            .endpoint
            .request(Method::DELETE, url)
            .query(&[("groupName", self.group_name.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SchedulerError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SchedulerError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
