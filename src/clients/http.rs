//! Shared plumbing for the REST service clients.

use reqwest::{Client, Method, RequestBuilder};

/// Base URL plus optional bearer credential for one external service.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ServiceEndpoint {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    /// Start a request with the service credentials attached.
    pub fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }
}
