//! Raw model definition types matching the persisted JSON shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// Abstract type tag (string, number, integer, boolean, float, date, text). Kept verbatim even when unknown.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
}

impl FieldDefinition {
    pub fn is_unique(&self) -> bool {
        self.unique.unwrap_or(false)
    }
}

/// A record-level action checked against a model's RBAC policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
    All,
}

impl Permission {
    pub fn grants(&self, action: Action) -> bool {
        matches!(
            (self, action),
            (Permission::All, _)
                | (Permission::Create, Action::Create)
                | (Permission::Read, Action::Read)
                | (Permission::Update, Action::Update)
                | (Permission::Delete, Action::Delete)
        )
    }
}

/// Per-model role policy. Keys keep their stored case; lookups are case-insensitive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rbac(pub BTreeMap<String, Vec<Permission>>);

impl Rbac {
    /// Permissions for `role`. When several keys differ only by case, the lexicographically
    /// first key wins (BTreeMap order). Unknown roles get the empty set.
    pub fn permissions_for(&self, role: &str) -> &[Permission] {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(role))
            .map(|(_, perms)| perms.as_slice())
            .unwrap_or(&[])
    }

    pub fn allows(&self, role: &str, action: Action) -> bool {
        self.permissions_for(role).iter().any(|p| p.grants(action))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub rbac: Rbac,
}

impl ModelDefinition {
    /// Physical table name: lowercase model name plus "s". Also the record route segment.
    pub fn table_name(&self) -> String {
        table_name_for(&self.name)
    }
}

pub fn table_name_for(model_name: &str) -> String {
    format!("{}s", model_name.to_lowercase())
}
