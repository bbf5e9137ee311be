//! Shared application state for all routes. The registry is swapped in place as models change.

use crate::mutator::SchemaMutator;
use crate::permission::PermissionGate;
use crate::registry::ModelRegistry;
use crate::service::RouteFactory;
use crate::storage::TableStore;
use crate::store::SchemaStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SchemaStore>,
    pub tables: Arc<dyn TableStore>,
    pub registry: ModelRegistry,
    pub mutator: Arc<SchemaMutator>,
    pub routes: RouteFactory,
    pub jwt_secret: Arc<str>,
    pub sample_rows: u32,
}

impl AppState {
    pub fn new(
        store: Arc<SchemaStore>,
        tables: Arc<dyn TableStore>,
        registry: ModelRegistry,
        jwt_secret: impl Into<Arc<str>>,
        sample_rows: u32,
    ) -> Self {
        let mutator = Arc::new(SchemaMutator::new(store.clone(), tables.clone(), registry.clone()));
        let routes = RouteFactory::new(tables.clone(), PermissionGate::new(store.clone()));
        AppState {
            store,
            tables,
            registry,
            mutator,
            routes,
            jwt_secret: jwt_secret.into(),
            sample_rows,
        }
    }
}
