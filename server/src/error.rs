use crate::models::RelayResponse;
use crate::upstream::UpstreamError;
use axum::http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Every way a relay invocation can end without a relayed upstream response.
///
/// Only the first three are told apart; anything else, client-side or
/// upstream, becomes `Unclassified` and surfaces as a 500.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("Missing 'url' in request body.")]
    MissingUrl,

    #[error("Invalid url. Must start with http(s)://.")]
    InvalidUrl,

    #[error("Method Not Allowed. Use POST.")]
    MethodNotAllowed,

    #[error("{0}")]
    Unclassified(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl | RelayError::InvalidUrl => StatusCode::BAD_REQUEST,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_relay_response(self) -> RelayResponse {
        let body = json!({ "error": self.to_string() }).to_string();
        RelayResponse::json(self.status(), body)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Unclassified(err.to_string())
    }
}

impl From<url::ParseError> for RelayError {
    fn from(err: url::ParseError) -> Self {
        RelayError::Unclassified(format!("Invalid URL: {err}"))
    }
}

impl From<UpstreamError> for RelayError {
    fn from(err: UpstreamError) -> Self {
        RelayError::Unclassified(err.to_string())
    }
}
