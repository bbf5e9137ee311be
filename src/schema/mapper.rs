//! Field type tag -> storage column type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Varchar,
    Integer,
    Boolean,
    Double,
    Timestamptz,
    Text,
}

impl ColumnType {
    /// Type as written in DDL.
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Varchar => "VARCHAR(255)",
            ColumnType::Integer => "INTEGER",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Timestamptz => "TIMESTAMPTZ",
            ColumnType::Text => "TEXT",
        }
    }

    /// Type name used in parameter casts (`$1::integer`).
    pub fn cast(&self) -> &'static str {
        match self {
            ColumnType::Varchar => "varchar",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::Double => "double precision",
            ColumnType::Timestamptz => "timestamptz",
            ColumnType::Text => "text",
        }
    }

    /// `information_schema.columns.data_type` spelling, used when comparing against a live table.
    pub fn catalog_name(&self) -> &'static str {
        match self {
            ColumnType::Varchar => "character varying",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::Double => "double precision",
            ColumnType::Timestamptz => "timestamp with time zone",
            ColumnType::Text => "text",
        }
    }

    pub fn from_catalog_name(name: &str) -> Option<Self> {
        [
            ColumnType::Varchar,
            ColumnType::Integer,
            ColumnType::Boolean,
            ColumnType::Double,
            ColumnType::Timestamptz,
            ColumnType::Text,
        ]
        .into_iter()
        .find(|t| t.catalog_name() == name)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

pub struct FieldTypeMapper;

impl FieldTypeMapper {
    /// Recognized tags only. Matching ignores surrounding whitespace and ASCII case.
    pub fn known(tag: &str) -> Option<ColumnType> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" => Some(ColumnType::Varchar),
            "number" | "integer" => Some(ColumnType::Integer),
            "boolean" => Some(ColumnType::Boolean),
            "float" => Some(ColumnType::Double),
            "date" => Some(ColumnType::Timestamptz),
            "text" => Some(ColumnType::Text),
            _ => None,
        }
    }

    /// Unknown tags fall back to the string column type with a warning.
    pub fn map(field: &str, tag: &str) -> ColumnType {
        Self::known(tag).unwrap_or_else(|| {
            tracing::warn!(field = %field, field_type = %tag, "unknown field type, defaulting to string");
            ColumnType::Varchar
        })
    }
}

/// Text accepted for a date column: RFC 3339, the PostgreSQL output form, a naive
/// `YYYY-MM-DDTHH:MM:SS` (read as UTC), or a bare date at midnight UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(d.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}
