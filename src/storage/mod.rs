//! Relational storage behind model tables: DDL sync plus row CRUD.

mod memory;
mod postgres;

pub use memory::MemoryTableStore;
pub use postgres::{ensure_database_exists, PgTableStore};

use crate::schema::{ColumnType, TableBinding};
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A row as a JSON object keyed by column name.
pub type Record = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database: {0}")]
    Db(sqlx::Error),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("table {0} does not exist")]
    MissingTable(String),
    #[error("storage: {0}")]
    Other(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        // SQLSTATE class 23 is integrity constraint violation.
        if let sqlx::Error::Database(ref db) = e {
            if db.code().map(|c| c.starts_with("23")).unwrap_or(false) {
                return StorageError::Constraint(db.message().to_string());
            }
            // Class 22 is data exception (bad casts, out-of-range values).
            if db.code().map(|c| c.starts_with("22")).unwrap_or(false) {
                return StorageError::InvalidValue(db.message().to_string());
            }
            if db.code().as_deref() == Some("42P01") {
                return StorageError::MissingTable(db.message().to_string());
            }
        }
        StorageError::Db(e)
    }
}

/// A column as it currently exists in the physical table.
#[derive(Clone, Debug, PartialEq)]
pub struct ExistingColumn {
    pub name: String,
    /// None when the live type is not one this crate creates.
    pub column_type: Option<ColumnType>,
    pub nullable: bool,
    /// Default expression as the catalog renders it, e.g. `'abc'::character varying`.
    pub default: Option<String>,
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool, StorageError>;

    /// Live column layout, or None when the table does not exist.
    async fn describe_table(&self, table: &str) -> Result<Option<Vec<ExistingColumn>>, StorageError>;

    /// Create the table if missing, otherwise reconcile it with the binding. Idempotent.
    /// A failed reconciliation leaves the table as it was.
    async fn sync_table(&self, binding: &TableBinding) -> Result<(), StorageError>;

    async fn drop_table(&self, table: &str) -> Result<(), StorageError>;

    async fn insert(&self, binding: &TableBinding, record: &Record) -> Result<Record, StorageError>;

    async fn select_all(&self, binding: &TableBinding) -> Result<Vec<Record>, StorageError>;

    async fn select_sample(&self, binding: &TableBinding, limit: u32) -> Result<Vec<Record>, StorageError>;

    async fn select_by_id(&self, binding: &TableBinding, id: i64) -> Result<Option<Record>, StorageError>;

    /// Merge `patch` onto the row. Returns the updated row, or None when the id is absent.
    async fn update_by_id(
        &self,
        binding: &TableBinding,
        id: i64,
        patch: &Record,
    ) -> Result<Option<Record>, StorageError>;

    /// Returns the deleted row, or None when the id is absent.
    async fn delete_by_id(&self, binding: &TableBinding, id: i64) -> Result<Option<Record>, StorageError>;

    /// Cheap round trip used by the readiness check.
    async fn ping(&self) -> Result<(), StorageError>;
}
