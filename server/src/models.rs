use crate::cors::apply_cors;
use crate::error::RelayError;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use tracing::warn;

pub const JSON_UTF8: &str = "application/json; charset=utf-8";
pub const DEFAULT_METHOD: &str = "POST";

/// The inbound relay instruction, decoded from the POST body.
///
/// Decoding goes through `serde_json::Value` rather than a derived struct so
/// that loosely typed clients keep working: falsy values fall back to the
/// defaults, and wrongly typed fields fail the way the relay has always
/// failed for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPayload {
    pub url: String,
    pub method: String,
    pub body: Option<String>,
    pub request_headers: Vec<(String, String)>,
}

impl RelayPayload {
    /// An empty body reads as `{}`.
    pub fn parse(raw: &[u8]) -> Result<Self, RelayError> {
        let value: Value = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(raw)?
        };
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, RelayError> {
        let fields = match value {
            Value::Object(fields) => fields,
            Value::Null => {
                return Err(RelayError::Unclassified(
                    "Cannot read properties of null (reading 'url')".to_string(),
                ))
            }
            _ => Map::new(),
        };

        let method = match fields.get("method") {
            Some(v) if !is_falsy(v) => match v {
                Value::String(s) => s.to_uppercase(),
                _ => {
                    return Err(RelayError::Unclassified(
                        "'method' must be a string".to_string(),
                    ))
                }
            },
            _ => DEFAULT_METHOD.to_string(),
        };

        let url = match fields.get("url") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(RelayError::MissingUrl),
        };

        let body = match fields.get("body") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        let request_headers = fields
            .get("requestHeaders")
            .map(header_pairs)
            .unwrap_or_default();

        Ok(Self {
            url,
            method,
            body,
            request_headers,
        })
    }
}

/// Flattens `requestHeaders` the way an object spread would: an object gives
/// its entries, arrays and strings give index-keyed entries, and scalars give
/// nothing. Values are coerced to text, `null` included.
fn header_pairs(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| (name.clone(), coerce_to_text(value)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), coerce_to_text(item)))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(index, c)| (index.to_string(), c.to_string()))
            .collect(),
        Value::Null | Value::Bool(_) | Value::Number(_) => Vec::new(),
    }
}

fn coerce_to_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce_to_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// What the relay sends back to the browser. Cross-origin headers are added
/// on conversion, so every response carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl RelayResponse {
    pub fn preflight() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: String::new(),
        }
    }

    pub fn json(status: StatusCode, body: String) -> Self {
        Self {
            status,
            content_type: Some(JSON_UTF8.to_string()),
            body,
        }
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        apply_cors(headers);
        if let Some(content_type) = self.content_type {
            match HeaderValue::from_str(&content_type) {
                Ok(value) => {
                    headers.insert(CONTENT_TYPE, value);
                }
                Err(_) => {
                    warn!("Dropping unrepresentable content-type: {:?}", content_type);
                }
            }
        }
        response
    }
}
