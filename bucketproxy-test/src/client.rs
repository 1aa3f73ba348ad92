//! Client for talking to a running proxy

use reqwest::{Client, Method, Response};
use std::time::Duration;

/// Thin HTTP client bound to one proxy base URL
pub struct ProxyClient {
    base_url: String,
    client: Client,
}

impl ProxyClient {
    /// Create a new client
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    /// Download an object
    pub async fn get(&self, path: &str) -> Result<Response, ClientError> {
        self.request(Method::GET, path).await
    }

    /// Check whether an object exists
    pub async fn head(&self, path: &str) -> Result<Response, ClientError> {
        self.request(Method::HEAD, path).await
    }

    /// Upload an object with PUT
    pub async fn put(&self, path: &str, body: impl Into<reqwest::Body>) -> Result<Response, ClientError> {
        self.upload(Method::PUT, path, body, None).await
    }

    /// Upload an object with POST
    pub async fn post(&self, path: &str, body: impl Into<reqwest::Body>) -> Result<Response, ClientError> {
        self.upload(Method::POST, path, body, None).await
    }

    /// Upload an object with an explicit content type
    pub async fn upload(
        &self,
        method: Method,
        path: &str,
        body: impl Into<reqwest::Body>,
        content_type: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self.client.request(method, self.url(path)).body(body);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        Ok(request.send().await?)
    }

    /// Send a bodiless request with any method
    pub async fn request(&self, method: Method, path: &str) -> Result<Response, ClientError> {
        Ok(self.client.request(method, self.url(path)).send().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}
