//! The relay handler: one inbound request in, at most one outbound call,
//! one JSON response back.

use crate::error::RelayError;
use crate::headers::sanitize_headers;
use crate::models::{RelayPayload, RelayResponse, JSON_UTF8};
use crate::upstream::{Upstream, UpstreamRequest};
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

pub struct AppState<U> {
    pub upstream: U,
}

/// Router entry point for every path and method.
///
/// A body axum refuses to buffer (over the size limit, aborted upload) still
/// gets the preflight and method answers, and otherwise a JSON 500.
pub async fn relay_handler<U: Upstream>(
    State(app_state): State<Arc<AppState<U>>>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("relay", %request_id, method = %method);
    let response = match body {
        Ok(body) => {
            handle(&app_state.upstream, &method, &body)
                .instrument(span)
                .await
        }
        Err(rejection) => span.in_scope(|| {
            gate(&method).unwrap_or_else(|| {
                fail(RelayError::Unclassified(rejection.body_text()))
            })
        }),
    };
    response.into_response()
}

pub async fn handle<U: Upstream>(upstream: &U, method: &Method, body: &[u8]) -> RelayResponse {
    if let Some(response) = gate(method) {
        return response;
    }

    match forward(upstream, body).await {
        Ok(response) => response,
        Err(e) => fail(e),
    }
}

/// Answers everything that is not a `POST`.
fn gate(method: &Method) -> Option<RelayResponse> {
    if *method == Method::OPTIONS {
        debug!("Answering preflight");
        return Some(RelayResponse::preflight());
    }

    if *method != Method::POST {
        warn!("Rejecting inbound method {}", method);
        return Some(RelayError::MethodNotAllowed.into_relay_response());
    }

    None
}

fn fail(e: RelayError) -> RelayResponse {
    match &e {
        RelayError::Unclassified(message) => error!("Relay failed: {}", message),
        other => warn!("Rejected relay request: {}", other),
    }
    e.into_relay_response()
}

async fn forward<U: Upstream>(upstream: &U, body: &[u8]) -> Result<RelayResponse, RelayError> {
    let payload = RelayPayload::parse(body)?;

    if !has_http_scheme(&payload.url) {
        return Err(RelayError::InvalidUrl);
    }
    let url = Url::parse(&payload.url)?;

    let headers = sanitize_headers(payload.request_headers);

    info!(
        "Forwarding {} {} with {} header(s)",
        payload.method,
        url,
        headers.len()
    );

    let resp = upstream
        .send(UpstreamRequest {
            method: payload.method,
            url,
            headers,
            body: payload.body,
        })
        .await?;

    let status = StatusCode::from_u16(resp.status).map_err(|_| {
        RelayError::Unclassified(format!("Upstream returned invalid status {}", resp.status))
    })?;
    info!("Upstream answered {}", status);

    let content_type = resp.content_type().map(str::to_string);
    let (content_type, body) = classify_body(content_type.as_deref(), resp.body);

    Ok(RelayResponse {
        status,
        content_type: Some(content_type),
        body,
    })
}

/// Case-insensitive `^https?://`.
pub fn has_http_scheme(url: &str) -> bool {
    ["http://", "https://"].iter().any(|prefix| {
        url.as_bytes()
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
    })
}

/// Picks the outgoing content type and body so the result is always JSON text.
///
/// A declared `application/json` passes through untouched. Otherwise a body
/// that parses as JSON is kept verbatim, and anything else is wrapped as
/// `{"data": <text>}`.
pub fn classify_body(content_type: Option<&str>, text: String) -> (String, String) {
    match content_type {
        Some(declared) if declared.contains("application/json") => (declared.to_string(), text),
        _ if serde_json::from_str::<Value>(&text).is_ok() => (JSON_UTF8.to_string(), text),
        _ => (JSON_UTF8.to_string(), json!({ "data": text }).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_check_is_case_insensitive() {
        assert!(has_http_scheme("http://a"));
        assert!(has_http_scheme("https://a/b?c"));
        assert!(has_http_scheme("HTTPS://A"));
        assert!(has_http_scheme("hTtP://a"));
    }

    #[test]
    fn scheme_check_rejects_other_schemes() {
        for url in [
            "not-a-url",
            "file:///etc/passwd",
            "gopher://x",
            "ftp://x",
            " https://leading-space",
            "https:/one-slash",
            "http",
            "",
            "ééééééééé",
        ] {
            assert!(!has_http_scheme(url), "{url}");
        }
    }

    #[test]
    fn declared_json_passes_through_with_its_content_type() {
        let (ct, body) = classify_body(Some("application/json"), r#"{"a":1}"#.to_string());
        assert_eq!(ct, "application/json");
        assert_eq!(body, r#"{"a":1}"#);
    }

    #[test]
    fn declared_json_is_not_validated() {
        let (ct, body) = classify_body(
            Some("application/json; charset=gbk"),
            "<html>oops</html>".to_string(),
        );
        assert_eq!(ct, "application/json; charset=gbk");
        assert_eq!(body, "<html>oops</html>");
    }

    #[test]
    fn undeclared_json_keeps_raw_text() {
        let raw = "[ 1, 2,\n 3 ]".to_string();
        let (ct, body) = classify_body(Some("text/plain"), raw.clone());
        assert_eq!(ct, JSON_UTF8);
        assert_eq!(body, raw);
    }

    #[test]
    fn plain_text_is_wrapped() {
        let (ct, body) = classify_body(Some("text/plain"), "hello".to_string());
        assert_eq!(ct, JSON_UTF8);
        assert_eq!(body, r#"{"data":"hello"}"#);
    }

    #[test]
    fn empty_body_without_content_type_is_wrapped() {
        let (ct, body) = classify_body(None, String::new());
        assert_eq!(ct, JSON_UTF8);
        assert_eq!(body, r#"{"data":""}"#);
    }

    #[test]
    fn content_type_match_is_case_sensitive() {
        let (ct, body) = classify_body(Some("Application/JSON"), "plain".to_string());
        assert_eq!(ct, JSON_UTF8);
        assert_eq!(body, r#"{"data":"plain"}"#);
    }
}
