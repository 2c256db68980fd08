//! The outbound HTTP call, described as plain data behind the `Upstream`
//! trait so the relay can run against a real client or a test double.

use crate::config::Config;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::error::Error as StdError;
use std::future::Future;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// One outbound request. `method` is already upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// What the target answered, with the body already decoded as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request could not be built (bad method, header name or value).
    #[error("{0}")]
    InvalidRequest(String),

    /// Connecting, sending, or reading the body failed.
    #[error("{0}")]
    Transport(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

pub trait Upstream: Send + Sync + 'static {
    fn send(
        &self,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send;
}

/// `Upstream` backed by a shared `reqwest::Client`. No retries; redirects and
/// timeouts follow the client's configuration.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.upstream_user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| UpstreamError::Client(error_chain(&e)))?;
        Ok(Self::new(client))
    }
}

impl Upstream for HttpUpstream {
    fn send(
        &self,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send {
        async move {
            let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
                UpstreamError::InvalidRequest(format!("Invalid HTTP method: {}", request.method))
            })?;

            let mut request_builder = self.client.request(method, request.url);

            for (key, value) in &request.headers {
                let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    UpstreamError::InvalidRequest(format!("Invalid header name: {key}"))
                })?;
                let value = HeaderValue::from_str(value).map_err(|_| {
                    UpstreamError::InvalidRequest(format!("Invalid value for header {key}"))
                })?;
                request_builder = request_builder.header(name, value);
            }

            if let Some(body) = request.body {
                request_builder = request_builder.body(body);
            }

            let resp = request_builder
                .send()
                .await
                .map_err(|e| UpstreamError::Transport(error_chain(&e)))?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(key, value)| {
                    (key.to_string(), value.to_str().unwrap_or_default().to_string())
                })
                .collect();

            let body = resp
                .text()
                .await
                .map_err(|e| UpstreamError::Transport(error_chain(&e)))?;
            debug!(status, body_len = body.len(), "Read upstream response body");

            Ok(UpstreamResponse {
                status,
                headers,
                body,
            })
        }
    }
}

/// Joins an error with its sources; reqwest hides the useful part
/// (DNS, refused connection) in the source chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[test]
    fn content_type_lookup_ignores_case() {
        let response = UpstreamResponse {
            status: 200,
            headers: vec![
                ("x-other".to_string(), "1".to_string()),
                ("Content-Type".to_string(), "text/html".to_string()),
            ],
            body: String::new(),
        };
        assert_eq!(response.content_type(), Some("text/html"));
    }

    #[test]
    fn content_type_missing() {
        let response = UpstreamResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert_eq!(response.content_type(), None);
    }

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for Layer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.1.as_deref().map(|l| l as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn error_chain_appends_distinct_sources() {
        let err = Layer(
            "error sending request",
            Some(Box::new(Layer(
                "connection refused",
                Some(Box::new(Layer("refused", None))),
            ))),
        );
        assert_eq!(
            error_chain(&err),
            "error sending request: connection refused"
        );
    }

    #[test]
    fn invalid_method_is_rejected_before_sending() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let upstream = HttpUpstream::new(Client::new());
        let request = UpstreamRequest {
            method: "BAD METHOD".to_string(),
            url: Url::parse("http://127.0.0.1:9/").unwrap(),
            headers: Vec::new(),
            body: None,
        };
        let err = rt.block_on(upstream.send(request)).unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidRequest(_)));
    }
}
