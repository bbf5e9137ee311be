//! Authenticated caller from an `Authorization: Bearer <jwt>` header.

use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token claims issued by the external auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct Caller {
    pub id: Value,
    pub username: String,
    pub role: Option<String>,
}

impl Caller {
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Administrative routes: the caller's role must be one of `allowed` (ASCII case-insensitive).
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), AppError> {
        match self.role() {
            Some(role) if allowed.iter().any(|a| a.eq_ignore_ascii_case(role.trim())) => Ok(()),
            Some(role) => Err(AppError::Forbidden(format!("role '{}' may not access this route", role))),
            None => Err(AppError::Forbidden("caller has no role".into())),
        }
    }
}

impl From<Claims> for Caller {
    fn from(c: Claims) -> Self {
        Caller {
            id: c.id,
            username: c.username,
            role: c.role.filter(|r| !r.trim().is_empty()),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("invalid Authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("Authorization header must use Bearer token format".into()))?;
    if token.is_empty() {
        return Err(AppError::Unauthorized("empty bearer token".into()));
    }
    Ok(token)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Caller, AppError> {
    if secret.is_empty() {
        return Err(AppError::Unauthorized("token verification is not configured".into()));
    }
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))?;
    Ok(data.claims.into())
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        verify_token(token, &state.jwt_secret)
    }
}
