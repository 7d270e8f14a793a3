//! Plain network fetching with reqwest.

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use super::{AsyncBackend, FetchRequest, DEFAULT_USER_AGENT};
use crate::error::{Error, Result};

/// Non-blocking HTTP backend.
///
/// Redirects are followed; the response body is returned whatever the
/// status code.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsyncBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes()).map_err(|_| {
            Error::Misconfigured(format!("unsupported HTTP method {:?}", request.method))
        })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.payload.is_empty() {
            builder = builder.form(&request.payload);
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(&request.url, e))?;
        debug!(status = response.status().as_u16(), url = %request.url, "response received");

        response
            .text()
            .await
            .map_err(|e| Error::transport(&request.url, e))
    }
}
