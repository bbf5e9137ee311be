//! Table DDL for model bindings: CREATE, reconcile plan against a live table, DROP.
//! Existing rows are never rewritten beyond what a type cast does.

use crate::schema::{parse_timestamp, ColumnSpec, ColumnType, TableBinding, SYSTEM_COLUMNS};
use crate::storage::ExistingColumn;
use serde_json::Value;

pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// One structural change needed to bring a table in line with its binding.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnChange {
    Add(ColumnSpec),
    AlterType { column: String, to: ColumnType },
    SetNotNull(String),
    DropNotNull(String),
    SetDefault { column: String, value: Value },
    DropDefault(String),
    Drop(String),
}

/// Compare binding columns with the live table. An empty plan means nothing to do.
/// A type change drops the live default first and sets the declared one after the cast.
/// System columns are never touched.
pub fn plan_reconcile(binding: &TableBinding, existing: &[ExistingColumn]) -> Vec<ColumnChange> {
    let mut plan = Vec::new();
    for col in &binding.columns {
        let Some(live) = existing.iter().find(|e| e.name == col.name) else {
            plan.push(ColumnChange::Add(col.clone()));
            continue;
        };
        let set_default = |value: &Value| ColumnChange::SetDefault {
            column: col.name.clone(),
            value: value.clone(),
        };
        if live.column_type != Some(col.column_type) {
            if live.default.is_some() {
                plan.push(ColumnChange::DropDefault(col.name.clone()));
            }
            plan.push(ColumnChange::AlterType {
                column: col.name.clone(),
                to: col.column_type,
            });
            if let Some(value) = &col.default {
                plan.push(set_default(value));
            }
        } else {
            match (&col.default, &live.default) {
                (Some(value), Some(expr)) if default_matches(expr, value, col.column_type) => {}
                (Some(value), _) => plan.push(set_default(value)),
                (None, Some(_)) => plan.push(ColumnChange::DropDefault(col.name.clone())),
                (None, None) => {}
            }
        }
        if live.nullable && !col.nullable {
            plan.push(ColumnChange::SetNotNull(col.name.clone()));
        } else if !live.nullable && col.nullable {
            plan.push(ColumnChange::DropNotNull(col.name.clone()));
        }
    }
    for live in existing {
        if SYSTEM_COLUMNS.contains(&live.name.as_str()) {
            continue;
        }
        if binding.column(&live.name).is_none() {
            plan.push(ColumnChange::Drop(live.name.clone()));
        }
    }
    plan
}

pub fn create_table_sql(binding: &TableBinding) -> String {
    let mut col_defs = vec![format!("{} SERIAL PRIMARY KEY", quote("id"))];
    for c in &binding.columns {
        col_defs.push(column_definition(c));
    }
    col_defs.push(format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quote("created_at")));
    col_defs.push(format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quote("updated_at")));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quote(&binding.table_name),
        col_defs.join(",\n  ")
    )
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote(table))
}

pub fn change_sql(table: &str, change: &ColumnChange) -> String {
    let t = quote(table);
    match change {
        ColumnChange::Add(c) => format!("ALTER TABLE {} ADD COLUMN {}", t, column_definition(c)),
        ColumnChange::AlterType { column, to } => format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
            t,
            quote(column),
            to.sql(),
            quote(column),
            to.cast()
        ),
        ColumnChange::SetNotNull(column) => {
            format!("ALTER TABLE {} ALTER COLUMN {} SET NOT NULL", t, quote(column))
        }
        ColumnChange::DropNotNull(column) => {
            format!("ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL", t, quote(column))
        }
        ColumnChange::SetDefault { column, value } => format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
            t,
            quote(column),
            literal(value)
        ),
        ColumnChange::DropDefault(column) => {
            format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", t, quote(column))
        }
        ColumnChange::Drop(column) => format!("ALTER TABLE {} DROP COLUMN IF EXISTS {}", t, quote(column)),
    }
}

fn column_definition(c: &ColumnSpec) -> String {
    let mut def = format!("{} {}", quote(&c.name), c.column_type.sql());
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(ref d) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(&literal(d));
    }
    if c.unique {
        def.push_str(" UNIQUE");
    }
    def
}

/// SQL literal for a default value. Strings are single-quoted with quotes doubled.
pub(crate) fn literal(v: &Value) -> String {
    match v {
        Value::Null => "NULL".into(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.into(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// True when a live default expression denotes the same value as a declared default.
fn default_matches(expr: &str, value: &Value, t: ColumnType) -> bool {
    let Some(live) = default_constant(expr) else { return false };
    match t {
        ColumnType::Boolean => value.as_bool().map(|b| live.eq_ignore_ascii_case(&b.to_string())).unwrap_or(false),
        ColumnType::Integer | ColumnType::Double => match (value.as_f64(), live.parse::<f64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => false,
        },
        ColumnType::Timestamptz => match (value.as_str().and_then(parse_timestamp), parse_timestamp(&live)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        ColumnType::Varchar | ColumnType::Text => value.as_str() == Some(live.as_str()),
    }
}

/// The constant inside a catalog default: `'it''s'::text` gives `it's`, `(-5)` gives `-5`.
/// None for anything that is not a plain constant, such as a function call.
fn default_constant(expr: &str) -> Option<String> {
    let mut e = expr.trim();
    while let Some(inner) = e.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        e = inner.trim();
    }
    if let Some(rest) = e.strip_prefix('\'') {
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\'' {
                out.push(c);
            } else if chars.peek() == Some(&'\'') {
                out.push('\'');
                chars.next();
            } else {
                let tail: String = chars.collect();
                return (tail.is_empty() || tail.starts_with("::")).then_some(out);
            }
        }
        return None;
    }
    let head = e.split("::").next().unwrap_or(e).trim();
    (!head.is_empty() && !head.contains('(')).then(|| head.to_string())
}
