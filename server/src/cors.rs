use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Cross-origin headers attached to every relay response, preflight included.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-headers", "Content-Type, Authorization"),
    ("access-control-allow-methods", "POST, OPTIONS"),
];

pub fn apply_cors(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}
