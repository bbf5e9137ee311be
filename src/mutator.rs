//! Schema lifecycle: create, update, delete, and reload of model definitions.
//! Mutations on the same model name are serialized; different names run independently.
//! The definition file is the source of truth and the table is derived from it. The two are
//! not committed atomically together: a crash between steps can leave one ahead of the other.

use crate::error::{AppError, DefinitionError};
use crate::registry::ModelRegistry;
use crate::schema::{normalize, parse_definition, ModelDefinition, SchemaLoader, TableBinding};
use crate::storage::TableStore;
use crate::store::{SchemaStore, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

/// One async mutex per lowercased model name. An entry lives only while someone holds or
/// waits on it.
#[derive(Default)]
struct NameLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl NameLocks {
    async fn lock(&self, name: &str) -> NameGuard<'_> {
        let key = name.trim().to_lowercase();
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.clone()).or_default().clone()
        };
        NameGuard {
            locks: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

struct NameGuard<'a> {
    locks: &'a NameLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Waiters clone the Arc under this map lock, so a count of one means nobody else needs it.
        if map.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.key);
        }
    }
}

/// Result of a successful create. The definition is durable; `reload` is the background task
/// making its routes servable and may be awaited or dropped.
pub struct Created {
    pub definition: ModelDefinition,
    pub reload: JoinHandle<()>,
}

pub struct SchemaMutator {
    store: Arc<SchemaStore>,
    tables: Arc<dyn TableStore>,
    registry: ModelRegistry,
    loader: SchemaLoader,
    locks: NameLocks,
}

impl SchemaMutator {
    pub fn new(store: Arc<SchemaStore>, tables: Arc<dyn TableStore>, registry: ModelRegistry) -> Self {
        let loader = SchemaLoader::new(store.clone(), tables.clone());
        SchemaMutator {
            store,
            tables,
            registry,
            loader,
            locks: NameLocks::default(),
        }
    }

    /// Validate and persist a new definition, then reload the registry in the background.
    /// Exactly one of several concurrent creates for the same name succeeds.
    pub async fn create(self: &Arc<Self>, body: Value) -> Result<Created, AppError> {
        let def = normalize(parse_definition(body)?)?;
        {
            let _guard = self.locks.lock(&def.name).await;
            if self.store.exists(&def.name).await? {
                return Err(AppError::Conflict(format!("model {} already exists", def.name)));
            }
            self.store.write(&def).await?;
        }
        tracing::info!(model = %def.name, "model published");

        let this = Arc::clone(self);
        let name = def.name.clone();
        let reload = tokio::spawn(async move {
            match this.reload().await {
                Ok(count) => tracing::info!(model = %name, bound = count, "registry reloaded after create"),
                Err(e) => tracing::error!(model = %name, error = %e, "failed to reload models"),
            }
        });
        Ok(Created { definition: def, reload })
    }

    /// Replace fields/rbac of an existing model and reconcile its table. The registry keeps the
    /// old binding unless reconciliation fully succeeds.
    pub async fn update(&self, name: &str, body: Value) -> Result<ModelDefinition, AppError> {
        let _guard = self.locks.lock(name).await;
        let existing = self.store.read(name).await?;

        let mut body = body;
        if let Value::Object(ref mut obj) = body {
            match obj.get("name").and_then(Value::as_str).map(str::trim) {
                Some(given) if !given.eq_ignore_ascii_case(&existing.name) => {
                    return Err(DefinitionError::Rename {
                        from: existing.name.clone(),
                        to: given.to_string(),
                    }
                    .into());
                }
                _ => {
                    obj.insert("name".into(), Value::String(existing.name.clone()));
                }
            }
        }
        let def = normalize(parse_definition(body)?)?;
        self.store.write(&def).await?;

        let binding = TableBinding::from_definition(def.clone());
        if let Err(e) = self.tables.sync_table(&binding).await {
            tracing::error!(model = %def.name, error = %e, "table reconciliation failed, keeping previous binding");
            return Err(e.into());
        }
        self.registry.swap(Arc::new(binding));
        tracing::info!(model = %def.name, "model updated");
        Ok(def)
    }

    /// Drop the table, unbind the model, then remove the definition file. A crash after the
    /// drop leaves a definition whose table no longer exists, which a later delete or update repairs.
    pub async fn delete(&self, name: &str) -> Result<ModelDefinition, AppError> {
        let _guard = self.locks.lock(name).await;
        let def = self.store.read(name).await?;
        self.tables.drop_table(&def.table_name()).await?;
        tracing::info!(model = %def.name, table = %def.table_name(), "table dropped");
        self.registry.remove(&def.name);
        self.store.delete(&def.name).await?;
        tracing::info!(model = %def.name, "model deleted");
        Ok(def)
    }

    /// Re-bind every persisted definition, each under its name lock. Definitions deleted since
    /// listing are skipped. Returns how many models were bound.
    pub async fn reload(&self) -> Result<usize, AppError> {
        let entries = self.store.list_entries().await?;
        let mut bound = 0;
        for entry in entries {
            let listed = match entry.definition {
                Ok(def) => def,
                Err(e) => {
                    tracing::error!(file = %entry.file, error = %e, "failed to load model definition");
                    continue;
                }
            };
            let _guard = self.locks.lock(&listed.name).await;
            let def = match self.store.read(&listed.name).await {
                Ok(def) => def,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => {
                    tracing::error!(file = %entry.file, error = %e, "failed to re-read model definition");
                    continue;
                }
            };
            match self.loader.bind(def).await {
                Ok(binding) => {
                    self.registry.swap(binding);
                    bound += 1;
                }
                Err(e) => tracing::error!(file = %entry.file, error = %e, "failed to bind model"),
            }
        }
        Ok(bound)
    }
}
