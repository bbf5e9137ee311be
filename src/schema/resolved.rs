//! Resolved table binding: a definition snapshot flattened into a column layout for runtime use.

use crate::schema::mapper::{ColumnType, FieldTypeMapper};
use crate::schema::types::ModelDefinition;
use serde_json::Value;

/// Columns every model table carries regardless of its fields.
pub const SYSTEM_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

pub const PK_COLUMN: &str = "id";

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub unique: bool,
}

/// Immutable once built. Updates produce a new binding which replaces this one in the registry.
#[derive(Clone, Debug)]
pub struct TableBinding {
    pub definition: ModelDefinition,
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableBinding {
    pub fn from_definition(definition: ModelDefinition) -> Self {
        let columns = definition
            .fields
            .iter()
            .map(|f| ColumnSpec {
                name: f.name.clone(),
                column_type: FieldTypeMapper::map(&f.name, &f.field_type),
                nullable: !f.required,
                default: f.default.clone().filter(|v| !v.is_null()),
                unique: f.is_unique(),
            })
            .collect();
        TableBinding {
            table_name: definition.table_name(),
            definition,
            columns,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.definition.name
    }

    /// Record route segment (same as the table name).
    pub fn path_segment(&self) -> &str {
        &self.table_name
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}
