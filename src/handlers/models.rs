//! Model administration: create, update, delete, list, inspect.

use crate::error::AppError;
use crate::extractors::Caller;
use crate::response::{ok, success_many, Message};
use crate::schema::{ModelDefinition, TableBinding};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const ADMIN: &[&str] = &["admin"];
const STAFF: &[&str] = &["admin", "manager", "viewer"];

#[derive(Serialize)]
struct ModelName {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelSummary {
    #[serde(flatten)]
    definition: ModelDefinition,
    exists_in_database: bool,
    table_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelDetail {
    definition: ModelDefinition,
    exists_in_database: bool,
    sample: Vec<serde_json::Map<String, Value>>,
}

pub async fn create_model(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(ADMIN)?;
    // The registry reload runs detached; the request does not wait for it.
    let created = state.mutator.create(body).await?;
    Ok(ok(Message {
        message: "Model created",
        subject: ModelName {
            name: created.definition.name,
        },
    }))
}

pub async fn update_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(ADMIN)?;
    let def = state.mutator.update(&name, body).await?;
    Ok(ok(def))
}

pub async fn delete_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(ADMIN)?;
    let def = state.mutator.delete(&name).await?;
    Ok(ok(Message {
        message: "Model deleted",
        subject: ModelName { name: def.name },
    }))
}

/// Raw persisted definitions.
pub async fn models(State(state): State<AppState>, caller: Caller) -> Result<impl IntoResponse, AppError> {
    caller.require_role(STAFF)?;
    Ok(success_many(state.store.list().await?))
}

/// Definitions with whether each table currently exists. Open to any authenticated caller.
pub async fn get_models(State(state): State<AppState>, _caller: Caller) -> Result<impl IntoResponse, AppError> {
    let defs = state.store.list().await?;
    let mut out = Vec::with_capacity(defs.len());
    for definition in defs {
        let table_name = definition.table_name();
        let exists_in_database = state.tables.table_exists(&table_name).await?;
        out.push(ModelSummary {
            definition,
            exists_in_database,
            table_name,
        });
    }
    Ok(success_many(out))
}

/// One definition plus a few sample rows when its table exists.
pub async fn get_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(STAFF)?;
    let definition = state.store.read(&name).await?;
    let exists_in_database = state.tables.table_exists(&definition.table_name()).await?;
    let sample = if exists_in_database {
        let binding = state
            .registry
            .get(&definition.name)
            .unwrap_or_else(|| Arc::new(TableBinding::from_definition(definition.clone())));
        state.tables.select_sample(&binding, state.sample_rows).await?
    } else {
        Vec::new()
    };
    Ok(ok(ModelDetail {
        definition,
        exists_in_database,
        sample,
    }))
}
