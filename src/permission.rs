//! Per-model RBAC checks against the persisted definition.

use crate::error::AppError;
use crate::schema::{Action, Rbac};
use crate::store::SchemaStore;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Pure policy evaluation. `all` grants every action; an unknown role gets nothing.
pub fn evaluate(rbac: &Rbac, role: &str, action: Action) -> Decision {
    if rbac.allows(role, action) {
        Decision::Allow
    } else {
        Decision::Deny(format!("role '{}' may not {}", role, action))
    }
}

#[derive(Clone)]
pub struct PermissionGate {
    store: Arc<SchemaStore>,
}

impl PermissionGate {
    pub fn new(store: Arc<SchemaStore>) -> Self {
        PermissionGate { store }
    }

    /// Look up the model's stored policy and decide. A missing model name or caller role is a
    /// BadRequest, and an unknown model is NotFound; neither is a denial.
    pub async fn authorize(
        &self,
        model_name: Option<&str>,
        action: Action,
        role: Option<&str>,
    ) -> Result<Decision, AppError> {
        let model_name = model_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("missing model name or user role".into()))?;
        let role = role
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("missing model name or user role".into()))?;
        let def = self.store.read(model_name).await?;
        let decision = evaluate(&def.rbac, role, action);
        tracing::debug!(model = %model_name, role = %role, action = %action, allowed = decision.is_allowed(), "permission check");
        Ok(decision)
    }

    /// Same as `authorize`, but a denial becomes `AppError::Forbidden`.
    pub async fn require(&self, model_name: &str, action: Action, role: Option<&str>) -> Result<(), AppError> {
        match self.authorize(Some(model_name), action, role).await? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AppError::Forbidden(format!("access denied: {}", reason))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ModelDefinition;
    use serde_json::json;

    const ACTIONS: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    fn rbac(v: serde_json::Value) -> Rbac {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn all_allows_every_action_and_empty_denies_every_action() {
        let policy = rbac(json!({ "admin": ["all"], "viewer": [] }));
        for action in ACTIONS {
            assert_eq!(evaluate(&policy, "admin", action), Decision::Allow);
            assert!(!evaluate(&policy, "viewer", action).is_allowed());
            assert!(!evaluate(&policy, "guest", action).is_allowed());
        }
    }

    #[test]
    fn specific_permissions_only() {
        let policy = rbac(json!({ "manager": ["read", "update"] }));
        assert!(evaluate(&policy, "Manager", Action::Read).is_allowed());
        assert!(evaluate(&policy, "manager", Action::Update).is_allowed());
        assert!(!evaluate(&policy, "manager", Action::Delete).is_allowed());
    }

    async fn gate_with_book() -> (tempfile::TempDir, PermissionGate) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SchemaStore::open(dir.path()).await.unwrap());
        let def: ModelDefinition = serde_json::from_value(json!({
            "name": "Book",
            "fields": [],
            "rbac": { "admin": ["all"], "manager": ["read"] }
        }))
        .unwrap();
        store.write(&def).await.unwrap();
        (dir, PermissionGate::new(store))
    }

    #[tokio::test]
    async fn authorize_reads_stored_policy() {
        let (_dir, gate) = gate_with_book().await;
        assert_eq!(gate.authorize(Some("book"), Action::Delete, Some("Admin")).await.unwrap(), Decision::Allow);
        assert!(!gate.authorize(Some("Book"), Action::Delete, Some("manager")).await.unwrap().is_allowed());
        assert!(matches!(
            gate.require("Book", Action::Delete, Some("manager")).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn missing_inputs_are_bad_requests_and_unknown_models_not_found() {
        let (_dir, gate) = gate_with_book().await;
        assert!(matches!(gate.authorize(None, Action::Read, Some("admin")).await, Err(AppError::BadRequest(_))));
        assert!(matches!(gate.authorize(Some("Book"), Action::Read, None).await, Err(AppError::BadRequest(_))));
        assert!(matches!(gate.authorize(Some("Book"), Action::Read, Some(" ")).await, Err(AppError::BadRequest(_))));
        assert!(matches!(gate.authorize(Some("Ghost"), Action::Read, Some("admin")).await, Err(AppError::NotFound(_))));
    }
}
