//! Model administration routes under `/models`.

use crate::handlers::models::{create_model, delete_model, get_model, get_models, models, update_model};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn model_routes() -> Router<AppState> {
    Router::new()
        .route("/models/create-model", post(create_model))
        .route("/models/update-model/:name", put(update_model))
        .route("/models/delete-model/:name", delete(delete_model))
        .route("/models/models", get(models))
        .route("/models/get-models", get(get_models))
        .route("/models/get-model/:name", get(get_model))
}
