use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::error::TransportError;

/// Status and raw body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP used by the executor. Implemented over `reqwest` in
/// production and by stubs in tests.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// POST `body` as JSON. `bearer` adds an `Authorization: Bearer` header.
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError>;

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, TransportError>;
}

/// [`Transport`] backed by a single reused `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        let mut request = self
            .client
            .post(url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, TransportError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}
