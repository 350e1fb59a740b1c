//! HTTP transport seam.
//!
//! The executor talks to the network only through [`HttpTransport`], so
//! tests can script responses without a server.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::error::FetchCause;

/// A single GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Status and decoded body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one HTTP GET.
///
/// Implementations return `Ok` for any response that arrived, whatever its
/// status; only transport-level failures are `Err`.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, FetchCause>;
}

/// Configuration for the reqwest transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// User agent string sent with every request.
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: "rentwire/0.1 (+https://github.com/rentwire)".to_string(),
            max_bytes: 5 * 1024 * 1024,
            max_redirects: 5,
        }
    }
}

/// [`HttpTransport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    max_bytes: usize,
}

impl ReqwestTransport {
    /// Build the underlying client.
    pub fn new(config: &TransportConfig) -> Result<Self, FetchCause> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchCause::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, max_bytes: config.max_bytes })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, FetchCause> {
        let mut builder = self.http.get(request.url.as_str()).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(FetchCause::from)?;
        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.max_bytes
        {
            return Err(FetchCause::Body(format!("{len} bytes exceeds {}", self.max_bytes)));
        }

        let bytes = response.bytes().await.map_err(FetchCause::from)?;
        if bytes.len() > self.max_bytes {
            return Err(FetchCause::Body(format!("{} bytes exceeds {}", bytes.len(), self.max_bytes)));
        }

        Ok(HttpResponse { status, body: String::from_utf8_lossy(&bytes).into_owned() })
    }
}
