//! A CORS relay: browsers POST a JSON description of an HTTP request, the
//! relay performs it server-side and returns the answer as JSON with
//! permissive cross-origin headers.

pub mod config;
pub mod cors;
pub mod error;
pub mod headers;
pub mod logging;
pub mod models;
pub mod relay;
pub mod upstream;

use axum::Router;
use relay::{relay_handler, AppState};
use std::sync::Arc;
use upstream::Upstream;

pub use config::Config;
pub use error::RelayError;
pub use models::{RelayPayload, RelayResponse};
pub use upstream::{HttpUpstream, UpstreamError, UpstreamRequest, UpstreamResponse};

/// Builds the router. Every path and every method lands on the relay handler.
pub fn app<U: Upstream>(upstream: U) -> Router {
    let app_state = Arc::new(AppState { upstream });
    Router::new()
        .fallback(relay_handler::<U>)
        .with_state(app_state)
}
