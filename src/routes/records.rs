//! Record CRUD routes. Parameterized paths: handlers resolve the model by path segment,
//! so models created at runtime are served without adding routes.

use crate::handlers::records::{create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route("/:path_segment/", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read).put(update).delete(delete_handler),
        )
}
