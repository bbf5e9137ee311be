//! In-process table store with the same constraint behavior as the PostgreSQL store:
//! NOT NULL, UNIQUE, defaults, type coercion, and all-or-nothing reconciliation.

use crate::migration::{literal, plan_reconcile, ColumnChange};
use crate::schema::{parse_timestamp, ColumnSpec, ColumnType, TableBinding};
use crate::storage::{ExistingColumn, Record, StorageError, TableStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Clone, Debug)]
struct MemTable {
    columns: Vec<ColumnSpec>,
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

impl MemTable {
    fn new(binding: &TableBinding) -> Self {
        MemTable {
            columns: binding.columns.clone(),
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn describe(&self) -> Vec<ExistingColumn> {
        let system = |name: &str, t: ColumnType, default: &str| ExistingColumn {
            name: name.to_string(),
            column_type: Some(t),
            nullable: false,
            default: Some(default.to_string()),
        };
        let mut out = vec![system("id", ColumnType::Integer, "nextval")];
        out.extend(self.columns.iter().map(|c| ExistingColumn {
            name: c.name.clone(),
            column_type: Some(c.column_type),
            nullable: c.nullable,
            default: c.default.as_ref().map(literal),
        }));
        out.push(system("created_at", ColumnType::Timestamptz, "now()"));
        out.push(system("updated_at", ColumnType::Timestamptz, "now()"));
        out
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut ColumnSpec, StorageError> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| StorageError::Other(format!("column {} does not exist", name)))
    }

    fn apply(&mut self, change: &ColumnChange) -> Result<(), StorageError> {
        match change {
            ColumnChange::Add(spec) => {
                let fill = spec.default.clone().unwrap_or(Value::Null);
                if fill.is_null() && !spec.nullable && !self.rows.is_empty() {
                    return Err(StorageError::Constraint(format!(
                        "column \"{}\" contains null values",
                        spec.name
                    )));
                }
                let fill = coerce(&fill, spec.column_type)?;
                for row in self.rows.values_mut() {
                    row.insert(spec.name.clone(), fill.clone());
                }
                self.columns.push(spec.clone());
            }
            ColumnChange::AlterType { column, to } => {
                for row in self.rows.values_mut() {
                    if let Some(v) = row.get_mut(column) {
                        *v = coerce(v, *to)?;
                    }
                }
                self.column_mut(column)?.column_type = *to;
            }
            ColumnChange::SetNotNull(column) => {
                if self.rows.values().any(|r| r.get(column).map(Value::is_null).unwrap_or(true)) {
                    return Err(StorageError::Constraint(format!(
                        "column \"{}\" contains null values",
                        column
                    )));
                }
                self.column_mut(column)?.nullable = false;
            }
            ColumnChange::DropNotNull(column) => self.column_mut(column)?.nullable = true,
            ColumnChange::SetDefault { column, value } => self.column_mut(column)?.default = Some(value.clone()),
            ColumnChange::DropDefault(column) => self.column_mut(column)?.default = None,
            ColumnChange::Drop(column) => {
                self.columns.retain(|c| c.name != *column);
                for row in self.rows.values_mut() {
                    row.remove(column);
                }
            }
        }
        Ok(())
    }

    fn check_row(&self, id: i64, row: &Record) -> Result<(), StorageError> {
        for c in &self.columns {
            let v = row.get(&c.name).unwrap_or(&Value::Null);
            if v.is_null() {
                if !c.nullable {
                    return Err(StorageError::Constraint(format!(
                        "null value in column \"{}\" violates not-null constraint",
                        c.name
                    )));
                }
                continue;
            }
            if c.unique && self.rows.iter().any(|(other, r)| *other != id && r.get(&c.name) == Some(v)) {
                return Err(StorageError::Constraint(format!(
                    "duplicate key value violates unique constraint on \"{}\"",
                    c.name
                )));
            }
        }
        Ok(())
    }

    /// Row as the store reports it: id, bound columns, timestamps.
    fn project(&self, id: i64, row: &Record) -> Record {
        let mut out = Record::new();
        out.insert("id".into(), Value::Number(id.into()));
        for c in &self.columns {
            out.insert(c.name.clone(), row.get(&c.name).cloned().unwrap_or(Value::Null));
        }
        for k in ["created_at", "updated_at"] {
            out.insert(k.into(), row.get(k).cloned().unwrap_or(Value::Null));
        }
        out
    }
}

/// Tables live only as long as the store. Useful for tests and for running without a database.
#[derive(Default)]
pub struct MemoryTableStore {
    tables: Mutex<HashMap<String, MemTable>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, MemTable>) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| StorageError::Other("table store lock poisoned".into()))?;
        f(&mut guard)
    }

    fn with_table<T>(
        &self,
        binding: &TableBinding,
        f: impl FnOnce(&mut MemTable) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        self.with_tables(|tables| {
            let table = tables
                .get_mut(&binding.table_name)
                .ok_or_else(|| StorageError::MissingTable(binding.table_name.clone()))?;
            f(table)
        })
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        self.with_tables(|tables| Ok(tables.contains_key(table)))
    }

    async fn describe_table(&self, table: &str) -> Result<Option<Vec<ExistingColumn>>, StorageError> {
        self.with_tables(|tables| Ok(tables.get(table).map(MemTable::describe)))
    }

    async fn sync_table(&self, binding: &TableBinding) -> Result<(), StorageError> {
        self.with_tables(|tables| {
            let Some(current) = tables.get(&binding.table_name) else {
                tables.insert(binding.table_name.clone(), MemTable::new(binding));
                tracing::info!(table = %binding.table_name, "table created");
                return Ok(());
            };
            let plan = plan_reconcile(binding, &current.describe());
            if plan.is_empty() {
                return Ok(());
            }
            // Work on a copy so a failing step leaves the table untouched.
            let mut next = current.clone();
            for change in &plan {
                next.apply(change)?;
            }
            tables.insert(binding.table_name.clone(), next);
            tracing::info!(table = %binding.table_name, changes = plan.len(), "table reconciled");
            Ok(())
        })
    }

    async fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        self.with_tables(|tables| {
            tables.remove(table);
            Ok(())
        })
    }

    async fn insert(&self, binding: &TableBinding, record: &Record) -> Result<Record, StorageError> {
        self.with_table(binding, |table| {
            let mut row = Record::new();
            for c in &table.columns {
                let value = match record.get(&c.name) {
                    Some(v) => coerce(v, c.column_type)?,
                    None => match &c.default {
                        Some(d) => coerce(d, c.column_type)?,
                        None => Value::Null,
                    },
                };
                row.insert(c.name.clone(), value);
            }
            let id = table.next_id;
            table.check_row(id, &row)?;
            let now = Value::String(Utc::now().to_rfc3339());
            row.insert("created_at".into(), now.clone());
            row.insert("updated_at".into(), now);
            table.next_id += 1;
            let out = table.project(id, &row);
            table.rows.insert(id, row);
            Ok(out)
        })
    }

    async fn select_all(&self, binding: &TableBinding) -> Result<Vec<Record>, StorageError> {
        self.with_table(binding, |table| {
            Ok(table.rows.iter().map(|(id, row)| table.project(*id, row)).collect())
        })
    }

    async fn select_sample(&self, binding: &TableBinding, limit: u32) -> Result<Vec<Record>, StorageError> {
        self.with_table(binding, |table| {
            Ok(table
                .rows
                .iter()
                .take(limit as usize)
                .map(|(id, row)| table.project(*id, row))
                .collect())
        })
    }

    async fn select_by_id(&self, binding: &TableBinding, id: i64) -> Result<Option<Record>, StorageError> {
        self.with_table(binding, |table| Ok(table.rows.get(&id).map(|row| table.project(id, row))))
    }

    async fn update_by_id(
        &self,
        binding: &TableBinding,
        id: i64,
        patch: &Record,
    ) -> Result<Option<Record>, StorageError> {
        self.with_table(binding, |table| {
            let Some(current) = table.rows.get(&id) else { return Ok(None) };
            let mut row = current.clone();
            for c in &table.columns {
                if let Some(v) = patch.get(&c.name) {
                    row.insert(c.name.clone(), coerce(v, c.column_type)?);
                }
            }
            table.check_row(id, &row)?;
            row.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
            let out = table.project(id, &row);
            table.rows.insert(id, row);
            Ok(Some(out))
        })
    }

    async fn delete_by_id(&self, binding: &TableBinding, id: i64) -> Result<Option<Record>, StorageError> {
        self.with_table(binding, |table| {
            let removed = table.rows.remove(&id);
            Ok(removed.map(|row| table.project(id, &row)))
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Cast a JSON value to what a column of `t` would hold, the way `$n::type` does in PostgreSQL.
fn coerce(v: &Value, t: ColumnType) -> Result<Value, StorageError> {
    let invalid = || StorageError::InvalidValue(format!("invalid input for type {}: {}", t.cast(), v));
    if v.is_null() {
        return Ok(Value::Null);
    }
    Ok(match t {
        ColumnType::Varchar | ColumnType::Text => match v {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        },
        ColumnType::Integer => match v {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map(|i| Value::Number(i.into()))
                .ok_or_else(invalid)?,
            Value::String(s) => Value::Number(s.trim().parse::<i64>().map_err(|_| invalid())?.into()),
            _ => return Err(invalid()),
        },
        ColumnType::Double => {
            let f = match v {
                Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
                Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
                _ => return Err(invalid()),
            };
            serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(invalid)?
        }
        ColumnType::Boolean => match v {
            Value::Bool(b) => Value::Bool(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return Err(invalid()),
        },
        ColumnType::Timestamptz => {
            let s = v.as_str().ok_or_else(invalid)?;
            Value::String(parse_timestamp(s).ok_or_else(invalid)?.to_rfc3339())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ModelDefinition;
    use serde_json::json;

    fn binding(fields: Value) -> TableBinding {
        let def: ModelDefinition = serde_json::from_value(json!({ "name": "Book", "fields": fields })).unwrap();
        TableBinding::from_definition(def)
    }

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_applies_defaults_and_not_null() {
        let store = MemoryTableStore::new();
        let b = binding(json!([
            { "name": "title", "type": "string", "required": true },
            { "name": "stock", "type": "number", "default": 3 }
        ]));
        store.sync_table(&b).await.unwrap();
        let row = store.insert(&b, &record(json!({ "title": "Dune" }))).await.unwrap();
        assert_eq!(row["id"], json!(1));
        assert_eq!(row["stock"], json!(3));
        let err = store.insert(&b, &record(json!({ "stock": 1 }))).await.unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[tokio::test]
    async fn unique_columns_reject_duplicates() {
        let store = MemoryTableStore::new();
        let b = binding(json!([{ "name": "isbn", "type": "string", "unique": true }]));
        store.sync_table(&b).await.unwrap();
        store.insert(&b, &record(json!({ "isbn": "1" }))).await.unwrap();
        let err = store.insert(&b, &record(json!({ "isbn": "1" }))).await.unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[tokio::test]
    async fn failed_reconcile_leaves_table_unchanged() {
        let store = MemoryTableStore::new();
        let v1 = binding(json!([{ "name": "title", "type": "string" }]));
        store.sync_table(&v1).await.unwrap();
        store.insert(&v1, &record(json!({ "title": "Dune" }))).await.unwrap();

        let v2 = binding(json!([
            { "name": "title", "type": "text" },
            { "name": "isbn", "type": "string", "required": true }
        ]));
        let err = store.sync_table(&v2).await.unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
        let cols = store.describe_table("books").await.unwrap().unwrap();
        assert_eq!(cols.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["id", "title", "created_at", "updated_at"]);
        assert_eq!(cols[1].column_type, Some(ColumnType::Varchar));
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let store = MemoryTableStore::new();
        let b = binding(json!([{ "name": "title", "type": "string", "default": "untitled" }]));
        store.sync_table(&b).await.unwrap();
        let before = store.describe_table("books").await.unwrap();
        store.sync_table(&b).await.unwrap();
        assert_eq!(store.describe_table("books").await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_merges_and_missing_rows_are_none() {
        let store = MemoryTableStore::new();
        let b = binding(json!([
            { "name": "title", "type": "string" },
            { "name": "price", "type": "float" }
        ]));
        store.sync_table(&b).await.unwrap();
        store.insert(&b, &record(json!({ "title": "Dune", "price": 9.5 }))).await.unwrap();
        let row = store.update_by_id(&b, 1, &record(json!({ "price": "12" }))).await.unwrap().unwrap();
        assert_eq!(row["title"], json!("Dune"));
        assert_eq!(row["price"], json!(12.0));
        assert!(store.update_by_id(&b, 9, &Record::new()).await.unwrap().is_none());
        assert!(store.delete_by_id(&b, 1).await.unwrap().is_some());
        assert!(store.select_by_id(&b, 1).await.unwrap().is_none());
    }

    #[test]
    fn coerces_like_postgres_casts() {
        assert_eq!(coerce(&json!("42"), ColumnType::Integer).unwrap(), json!(42));
        assert_eq!(coerce(&json!(7), ColumnType::Varchar).unwrap(), json!("7"));
        assert_eq!(coerce(&json!("TRUE"), ColumnType::Boolean).unwrap(), json!(true));
        assert!(coerce(&json!("soon"), ColumnType::Timestamptz).is_err());
        assert_eq!(
            coerce(&json!("2024-05-01"), ColumnType::Timestamptz).unwrap(),
            json!("2024-05-01T00:00:00+00:00")
        );
    }
}
