//! HTTP seam between the session manager and the network
//!
//! The session manager builds fully signed [`HttpRequest`]s and hands them to
//! an [`HttpTransport`]. [`ReqwestTransport`] is the default; tests and
//! embedders can supply their own.

use std::time::Duration;

use async_trait::async_trait;
use indivo_domain::{IndivoError, ServerConfig};
use reqwest::Method;
use url::Url;

use crate::http::client::map_reqwest_error;
use crate::http::HttpClient;

/// A request ready to be sent
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: Vec::new(), body: None }
    }

    /// First header value with `name` (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 or 403
    #[must_use]
    pub fn is_authorization_rejection(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// Sends requests; timeouts and connection failures map to
/// `IndivoError::Network`
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute `request` and return the status and body
    ///
    /// # Errors
    /// Returns `IndivoError::Network` when no response was received
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, IndivoError>;
}

/// Default transport over [`HttpClient`]
#[derive(Clone)]
pub struct ReqwestTransport {
    client: HttpClient,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Transport with the configured request timeout
    ///
    /// # Errors
    /// Returns `IndivoError::Network` if the reqwest client cannot be built
    pub fn from_config(config: &ServerConfig) -> Result<Self, IndivoError> {
        let client =
            HttpClient::builder().timeout(Duration::from_secs(config.request_timeout_secs)).build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, IndivoError> {
        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = self.client.send(builder).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}
