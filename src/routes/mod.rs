//! Router assembly.

mod common;
mod models;
mod records;

pub use common::common_routes;
pub use models::model_routes;
pub use records::record_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Model administration and record routes nested under `/api`.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .nest("/api", model_routes().merge(record_routes()))
        .with_state(state)
}

/// The full application: `/health`, `/ready`, `/version`, and everything under `/api`.
pub fn app(state: AppState) -> Router {
    common_routes(state.clone())
        .merge(api_routes(state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}
