//! Builds parameterized INSERT, SELECT, UPDATE, DELETE for a table binding.

use crate::migration::quote;
use crate::schema::{ColumnSpec, TableBinding, PK_COLUMN};
use crate::storage::Record;
use serde_json::Value;

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder with a cast to the column type so JSON values bind regardless of their shape.
    fn push_cast(&mut self, col: &ColumnSpec, v: Value) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, col.column_type.cast())
    }
}

/// SELECT list: system columns plus every bound column, in binding order.
fn select_column_list(binding: &TableBinding) -> String {
    let mut cols = vec![quote(PK_COLUMN)];
    cols.extend(binding.columns.iter().map(|c| quote(&c.name)));
    cols.push(quote("created_at"));
    cols.push(quote("updated_at"));
    cols.join(", ")
}

pub fn select_all(binding: &TableBinding) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        select_column_list(binding),
        quote(&binding.table_name),
        quote(PK_COLUMN)
    );
    q
}

pub fn select_sample(binding: &TableBinding, limit: u32) -> QueryBuf {
    let mut q = select_all(binding);
    q.sql.push_str(&format!(" LIMIT {}", limit));
    q
}

pub fn select_by_id(binding: &TableBinding, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::Number(id.into()));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        select_column_list(binding),
        quote(&binding.table_name),
        quote(PK_COLUMN),
        n
    );
    q
}

/// INSERT only the bound columns present in the record; the database fills defaults and
/// enforces NOT NULL for required fields. Unknown keys and system columns are ignored.
pub fn insert(binding: &TableBinding, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &binding.columns {
        let Some(val) = record.get(&c.name) else { continue };
        placeholders.push(q.push_cast(c, val.clone()));
        cols.push(quote(&c.name));
    }
    let table = quote(&binding.table_name);
    let returning = select_column_list(binding);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only bound columns present in the patch, always refreshing updated_at.
pub fn update(binding: &TableBinding, id: i64, patch: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &binding.columns {
        let Some(val) = patch.get(&c.name) else { continue };
        let rhs = q.push_cast(c, val.clone());
        sets.push(format!("{} = {}", quote(&c.name), rhs));
    }
    sets.push(format!("{} = NOW()", quote("updated_at")));
    let id_param = q.push_param(Value::Number(id.into()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        quote(&binding.table_name),
        sets.join(", "),
        quote(PK_COLUMN),
        id_param,
        select_column_list(binding)
    );
    q
}

pub fn delete(binding: &TableBinding, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::Number(id.into()));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${} RETURNING {}",
        quote(&binding.table_name),
        quote(PK_COLUMN),
        n,
        select_column_list(binding)
    );
    q
}
