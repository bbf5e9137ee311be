//! Generic record operations for one bound model. Every operation passes the permission gate
//! before touching storage.

use crate::error::AppError;
use crate::permission::PermissionGate;
use crate::schema::{Action, TableBinding};
use crate::storage::{Record, TableStore};
use std::sync::Arc;

/// Builds the record operations for a binding. Cheap to clone; holds only shared handles.
#[derive(Clone)]
pub struct RouteFactory {
    tables: Arc<dyn TableStore>,
    gate: PermissionGate,
}

impl RouteFactory {
    pub fn new(tables: Arc<dyn TableStore>, gate: PermissionGate) -> Self {
        RouteFactory { tables, gate }
    }

    pub fn build(&self, binding: Arc<TableBinding>) -> RecordRoutes {
        RecordRoutes {
            binding,
            tables: self.tables.clone(),
            gate: self.gate.clone(),
        }
    }
}

/// create, list_all, get_by_id, update_by_id, delete_by_id over one table binding.
pub struct RecordRoutes {
    binding: Arc<TableBinding>,
    tables: Arc<dyn TableStore>,
    gate: PermissionGate,
}

impl RecordRoutes {
    pub fn binding(&self) -> &TableBinding {
        &self.binding
    }

    async fn check(&self, action: Action, role: Option<&str>) -> Result<(), AppError> {
        self.gate.require(self.binding.model_name(), action, role).await
    }

    fn not_found(&self, id: i64) -> AppError {
        AppError::NotFound(format!("{} {}", self.binding.model_name(), id))
    }

    pub async fn create(&self, role: Option<&str>, record: &Record) -> Result<Record, AppError> {
        self.check(Action::Create, role).await?;
        let row = self.tables.insert(&self.binding, record).await?;
        tracing::debug!(model = %self.binding.model_name(), id = ?row.get("id"), "record created");
        Ok(row)
    }

    /// Every row, ordered by id. No paging.
    pub async fn list_all(&self, role: Option<&str>) -> Result<Vec<Record>, AppError> {
        self.check(Action::Read, role).await?;
        Ok(self.tables.select_all(&self.binding).await?)
    }

    pub async fn get_by_id(&self, role: Option<&str>, id: i64) -> Result<Record, AppError> {
        self.check(Action::Read, role).await?;
        self.tables
            .select_by_id(&self.binding, id)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    pub async fn update_by_id(&self, role: Option<&str>, id: i64, patch: &Record) -> Result<Record, AppError> {
        self.check(Action::Update, role).await?;
        self.tables
            .update_by_id(&self.binding, id, patch)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    pub async fn delete_by_id(&self, role: Option<&str>, id: i64) -> Result<Record, AppError> {
        self.check(Action::Delete, role).await?;
        let row = self
            .tables
            .delete_by_id(&self.binding, id)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::debug!(model = %self.binding.model_name(), id, "record deleted");
        Ok(row)
    }
}
