/// Header names never forwarded to the target. The outbound transport computes
/// `host` and `content-length` itself, and a forwarded `accept-encoding` would
/// hand back a compressed body that cannot be relayed as text.
pub const STRIPPED_HEADERS: [&str; 3] = ["host", "content-length", "accept-encoding"];

pub fn is_stripped(name: &str) -> bool {
    STRIPPED_HEADERS
        .iter()
        .any(|stripped| name.trim().eq_ignore_ascii_case(stripped))
}

/// Drops every stripped header regardless of casing. Remaining entries keep
/// their original name, value and order.
pub fn sanitize_headers(headers: Vec<(String, String)>) -> Vec<(String, String)> {
    headers
        .into_iter()
        .filter(|(name, _)| !is_stripped(name))
        .collect()
}
