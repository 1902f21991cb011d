//! REST client for point lookups against the task store.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;

use super::error::ClientError;
use super::http::ServiceEndpoint;
use super::TaskStore;
use crate::task::{Image, Task};

const SERVICE: &str = "task store";

#[derive(Debug, Deserialize)]
struct GetItemResponse {
    #[serde(rename = "Item", default)]
    item: Option<Image>,
}

/// Task store client reading `/tables/{table}/items/{taskId}`.
pub struct HttpTaskStore {
    endpoint: ServiceEndpoint,
    table_name: String,
}

impl HttpTaskStore {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>, table_name: &str) -> Self {
        Self {
            endpoint: ServiceEndpoint::new(client, base_url, api_key),
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ClientError> {
        let url = self
            .endpoint
            .url(&["tables", &self.table_name, "items", task_id]);
        let resp = self
            .endpoint
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| ClientError::transport(SERVICE, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::transport(SERVICE, e))?;
        if !status.is_success() {
            return Err(ClientError::Http {
                service: SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GetItemResponse =
            serde_json::from_str(&text).map_err(|e| ClientError::decode(SERVICE, e))?;
        let Some(item) = parsed.item else {
            return Ok(None);
        };

        let task = Task::from_image(&item);
        if task.is_none() {
            tracing::warn!(task_id = %task_id, "Stored item has no usable taskId");
        }
        Ok(task)
    }
}
