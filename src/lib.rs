//! Model Forge: define data models at runtime and serve permission-checked REST CRUD for them.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod mutator;
pub mod permission;
pub mod registry;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod storage;
pub mod store;

pub use error::{AppError, DefinitionError};
pub use extractors::{Caller, Claims};
pub use mutator::SchemaMutator;
pub use permission::{Decision, PermissionGate};
pub use registry::ModelRegistry;
pub use routes::{api_routes, app, common_routes};
pub use schema::{ModelDefinition, SchemaLoader, TableBinding};
pub use service::{RecordRoutes, RouteFactory};
pub use settings::Settings;
pub use state::AppState;
pub use storage::{ensure_database_exists, MemoryTableStore, PgTableStore, StorageError, TableStore};
pub use store::{SchemaStore, StoreError};
