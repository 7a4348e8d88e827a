mod error;
mod rest;
mod types;

pub use error::ApiError;
pub use rest::{InboundPayload, RestApi};
pub use types::*;

use crate::relay::RelayWorkflow;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the relay's HTTP server: webhook, ping, health and stats routes
pub fn create_api_server(relay: Arc<RelayWorkflow>) -> Router {
    let rest_api = RestApi::new(relay);

    // The companion app calls the stats route from the browser
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    rest_api
        .router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
