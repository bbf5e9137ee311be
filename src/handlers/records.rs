//! Record CRUD handlers. The model is resolved from the path segment per request, so a
//! binding swapped in by a schema change is picked up without re-wiring routes.

use crate::error::AppError;
use crate::extractors::Caller;
use crate::response::{created, ok, success_many, Message};
use crate::service::RecordRoutes;
use crate::state::AppState;
use crate::storage::Record;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct DeletedId {
    id: i64,
}

fn routes_for(state: &AppState, segment: &str) -> Result<RecordRoutes, AppError> {
    let binding = state
        .registry
        .get_by_path(&segment.to_lowercase())
        .ok_or_else(|| AppError::NotFound(format!("no model served at /{}", segment)))?;
    Ok(state.routes.build(binding))
}

fn parse_id(id: &str) -> Result<i64, AppError> {
    id.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id)))
}

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let routes = routes_for(&state, &segment)?;
    Ok(success_many(routes.list_all(caller.role()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let routes = routes_for(&state, &segment)?;
    let record = body_to_record(body)?;
    Ok(created(routes.create(caller.role(), &record).await?))
}

pub async fn read(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let routes = routes_for(&state, &segment)?;
    let id = parse_id(&id)?;
    Ok(ok(routes.get_by_id(caller.role(), id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let routes = routes_for(&state, &segment)?;
    let id = parse_id(&id)?;
    let patch = body_to_record(body)?;
    Ok(ok(routes.update_by_id(caller.role(), id, &patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let routes = routes_for(&state, &segment)?;
    let id = parse_id(&id)?;
    routes.delete_by_id(caller.role(), id).await?;
    Ok(ok(Message {
        message: "Deleted",
        subject: DeletedId { id },
    }))
}
