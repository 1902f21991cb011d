//! REST client for the message delivery channel.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;

use super::error::ClientError;
use super::http::ServiceEndpoint;
use super::DeliveryChannel;
use crate::dispatch::Notification;

const SERVICE: &str = "delivery channel";

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    address: &'a str,
    subject: &'a str,
    message: &'a str,
}

/// Delivery client publishing to `/topics/{topic}/messages`.
pub struct HttpDeliveryChannel {
    endpoint: ServiceEndpoint,
    topic: String,
}

impl HttpDeliveryChannel {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>, topic: &str) -> Self {
        Self {
            endpoint: ServiceEndpoint::new(client, base_url, api_key),
            topic: topic.to_string(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for HttpDeliveryChannel {
    async fn send(&self, address: &str, notification: &Notification) -> Result<(), ClientError> {
        let url = self.endpoint.url(&["topics", &self.topic, "messages"]);
        let body = PublishRequest {
            address,
            subject: &notification.subject,
            message: &notification.body,
        };

        let resp = self
            .endpoint
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::transport(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                service: SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> Notification {
        Notification {
            subject: "Task Reminder".to_string(),
            body: "Reminder: Task 'Report' (ID: t1) is due in 1 hour at 2025-05-01T10:00:00+00:00."
                .to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_publishes_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/topics/reminders/messages"))
            .and(body_json(json!({
                "address": "user@example.com",
                "subject": "Task Reminder",
                "message": "Reminder: Task 'Report' (ID: t1) is due in 1 hour at 2025-05-01T10:00:00+00:00."
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let channel = HttpDeliveryChannel::new(Client::new(), &server.uri(), None, "reminders");
        channel.send("user@example.com", &notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let channel = HttpDeliveryChannel::new(Client::new(), &server.uri(), None, "reminders");
        let err = channel.send("user@example.com", &notification()).await.unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 500, .. }));
    }
}
