//! Load persisted model definitions and bind each one to a synced table.

use crate::error::AppError;
use crate::schema::resolved::TableBinding;
use crate::schema::types::ModelDefinition;
use crate::schema::validator::normalize;
use crate::storage::TableStore;
use crate::store::SchemaStore;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct SchemaLoader {
    store: Arc<SchemaStore>,
    tables: Arc<dyn TableStore>,
}

impl SchemaLoader {
    pub fn new(store: Arc<SchemaStore>, tables: Arc<dyn TableStore>) -> Self {
        SchemaLoader { store, tables }
    }

    /// Bind every persisted definition. A bad definition or failing DDL is logged and skipped;
    /// the rest still load. Callers merge the result into the registry.
    pub async fn load_all(&self) -> Result<HashMap<String, Arc<TableBinding>>, AppError> {
        let entries = self.store.list_entries().await?;
        if entries.is_empty() {
            tracing::info!(dir = %self.store.dir().display(), "no model definitions found");
        }
        let mut out = HashMap::new();
        for entry in entries {
            let def = match entry.definition {
                Ok(def) => def,
                Err(e) => {
                    tracing::error!(file = %entry.file, error = %e, "failed to load model definition");
                    continue;
                }
            };
            match self.bind(def).await {
                Ok(binding) => {
                    out.insert(binding.model_name().to_string(), binding);
                }
                Err(e) => tracing::error!(file = %entry.file, error = %e, "failed to bind model"),
            }
        }
        Ok(out)
    }

    /// Validate one definition, create or reconcile its table, and build the binding.
    pub async fn bind(&self, def: ModelDefinition) -> Result<Arc<TableBinding>, AppError> {
        let def = normalize(def)?;
        let binding = TableBinding::from_definition(def);
        self.tables.sync_table(&binding).await?;
        tracing::info!(model = %binding.model_name(), table = %binding.table_name, "model loaded and table synced");
        Ok(Arc::new(binding))
    }
}
