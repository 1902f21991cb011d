//! REST client for the user directory.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;

use super::error::ClientError;
use super::http::ServiceEndpoint;
use super::Directory;

const SERVICE: &str = "directory";

/// Attribute holding a user's contact address.
pub const CONTACT_ATTRIBUTE: &str = "email";

/// A single user attribute as returned by the directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetUserResponse {
    #[serde(rename = "UserAttributes", default)]
    user_attributes: Vec<UserAttribute>,
}

/// Pick the first non-empty contact attribute.
pub fn contact_address(attributes: &[UserAttribute]) -> Option<String> {
    attributes
        .iter()
        .filter(|attr| attr.name == CONTACT_ATTRIBUTE)
        .filter_map(|attr| attr.value.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Directory client reading `/pools/{pool}/users/{id}`.
pub struct HttpDirectory {
    endpoint: ServiceEndpoint,
    pool_id: String,
}

impl HttpDirectory {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>, pool_id: &str) -> Self {
        Self {
            endpoint: ServiceEndpoint::new(client, base_url, api_key),
            pool_id: pool_id.to_string(),
        }
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn get_contact_address(&self, assignee_id: &str) -> Result<Option<String>, ClientError> {
        let url = self
            .endpoint
            .url(&["pools", &self.pool_id, "users", assignee_id]);
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

        let user: GetUserResponse =
            serde_json::from_str(&text).map_err(|e| ClientError::decode(SERVICE, e))?;
        Ok(contact_address(&user.user_attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attr(name: &str, value: &str) -> UserAttribute {
        UserAttribute {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_contact_address_selection() {
        assert_eq!(
            contact_address(&[attr("sub", "u1"), attr("email", "user@example.com")]),
            Some("user@example.com".to_string())
        );
        assert_eq!(contact_address(&[attr("sub", "u1")]), None);
        assert_eq!(contact_address(&[attr("email", "  ")]), None);
        assert_eq!(contact_address(&[]), None);
    }

    #[tokio::test]
    async fn test_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pools/pool-1/users/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Username": "u1",
                "UserAttributes": [
                    {"Name": "sub", "Value": "u1"},
                    {"Name": "email", "Value": "user@example.com"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pools/pool-1/users/u2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Username": "u2",
                "UserAttributes": []
            })))
            .mount(&server)
            .await;

        let directory = HttpDirectory::new(Client::new(), &server.uri(), None, "pool-1");
        assert_eq!(
            directory.get_contact_address("u1").await.unwrap(),
            Some("user@example.com".to_string())
        );
        assert_eq!(directory.get_contact_address("u2").await.unwrap(), None);
        assert_eq!(directory.get_contact_address("u3").await.unwrap(), None);
    }
}
