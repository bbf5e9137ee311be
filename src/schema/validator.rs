//! Definition validation and normalization: names, field uniqueness, typed defaults.

use crate::error::DefinitionError;
use crate::schema::mapper::{parse_timestamp, ColumnType, FieldTypeMapper};
use crate::schema::resolved::SYSTEM_COLUMNS;
use crate::schema::types::{table_name_for, ModelDefinition};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

static MODEL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid regex"));

/// Path segments already taken by the admin routes.
const RESERVED_SEGMENTS: &[&str] = &["models"];

/// Parse a request body into a definition. Missing `name` or `fields` is a validation failure.
pub fn parse_definition(body: Value) -> Result<ModelDefinition, DefinitionError> {
    if !body.is_object() {
        return Err(DefinitionError::Malformed("body must be a JSON object".into()));
    }
    serde_json::from_value(body).map_err(|e| DefinitionError::Malformed(e.to_string()))
}

/// Trim names, check uniqueness, and type-check defaults.
/// Numeric and boolean defaults given as strings become typed values; empty or null defaults are dropped.
pub fn normalize(mut def: ModelDefinition) -> Result<ModelDefinition, DefinitionError> {
    def.name = def.name.trim().to_string();
    check_model_name(&def.name)?;

    let mut seen = HashSet::new();
    for field in &mut def.fields {
        field.name = field.name.trim().to_string();
        if field.name.is_empty() {
            return Err(DefinitionError::EmptyFieldName);
        }
        if SYSTEM_COLUMNS.contains(&field.name.as_str()) {
            return Err(DefinitionError::ReservedField(field.name.clone()));
        }
        if !seen.insert(field.name.clone()) {
            return Err(DefinitionError::DuplicateField(field.name.clone()));
        }
        field.default = normalize_default(&field.name, &field.field_type, field.default.take())?;
    }
    Ok(def)
}

pub fn check_model_name(name: &str) -> Result<(), DefinitionError> {
    if !MODEL_NAME.is_match(name) {
        return Err(DefinitionError::InvalidName(name.to_string()));
    }
    if RESERVED_SEGMENTS.contains(&table_name_for(name).as_str()) {
        return Err(DefinitionError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Check a default against the column its field maps to. Strings that spell a number or a
/// boolean become typed values; anything the column could not hold is rejected.
fn normalize_default(field: &str, tag: &str, default: Option<Value>) -> Result<Option<Value>, DefinitionError> {
    let value = match default {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(v) => v,
    };
    let column = FieldTypeMapper::known(tag).unwrap_or(ColumnType::Varchar);
    let typed = match (column, &value) {
        (ColumnType::Varchar | ColumnType::Text, Value::String(_)) => Some(value.clone()),
        (ColumnType::Integer, Value::Number(n)) => integral(n.as_i64(), n.as_f64()),
        (ColumnType::Integer, Value::String(s)) => {
            let s = s.trim();
            integral(s.parse::<i64>().ok(), s.parse::<f64>().ok())
        }
        (ColumnType::Double, Value::Number(_)) => Some(value.clone()),
        (ColumnType::Double, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        (ColumnType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ColumnType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (ColumnType::Timestamptz, Value::String(s)) => {
            parse_timestamp(s).map(|_| Value::String(s.trim().to_string()))
        }
        _ => None,
    };
    typed.map(Some).ok_or_else(|| DefinitionError::InvalidDefault {
        field: field.to_string(),
        value: value.to_string(),
        expected: tag.to_string(),
    })
}

/// An integer, or a float with no fractional part that fits in i64.
fn integral(int: Option<i64>, float: Option<f64>) -> Option<Value> {
    if let Some(i) = int {
        return Some(Value::Number(i.into()));
    }
    let f = float?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Value::Number((f as i64).into()))
}
