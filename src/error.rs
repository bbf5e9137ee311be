//! Typed errors and HTTP mapping.

use crate::storage::StorageError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Problems with a model definition itself. Always reported before anything is persisted.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("invalid model definition: {0}")]
    Malformed(String),
    #[error("invalid model name '{0}': use letters, digits and underscores, starting with a letter")]
    InvalidName(String),
    #[error("model name '{0}' is reserved")]
    ReservedName(String),
    #[error("field name must not be empty")]
    EmptyFieldName,
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("field '{0}' is managed by the table and cannot be declared")]
    ReservedField(String),
    #[error("field '{field}': default {value} is not a valid {expected}")]
    InvalidDefault { field: String, value: String, expected: String },
    #[error("model '{from}' cannot be renamed to '{to}'")]
    Rename { from: String, to: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => AppError::NotFound(format!("model {}", name)),
            other => AppError::Store(other),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Definition(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Storage(StorageError::Constraint(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "constraint_violation")
            }
            AppError::Storage(StorageError::InvalidValue(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_value"),
            AppError::Storage(StorageError::MissingTable(_)) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_store_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_body_carries_code_and_message_only() {
        let err = AppError::Definition(DefinitionError::InvalidDefault {
            field: "active".into(),
            value: "\"abc\"".into(),
            expected: "boolean".into(),
        });
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": {
                "code": "validation_error",
                "message": "field 'active': default \"abc\" is not a valid boolean"
            } })
        );
    }
}
