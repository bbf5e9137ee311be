//! Model Forge server: load persisted model definitions, sync their tables, serve the API.
//!
//! Run from repo root: `cargo run -p model-forge-server`

use model_forge::{
    app, ensure_database_exists, AppState, ModelRegistry, PgTableStore, SchemaLoader, SchemaStore, Settings, TableStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("model_forge=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env();
    if settings.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; every API request will be rejected");
    }

    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    let tables: Arc<dyn TableStore> = Arc::new(PgTableStore::new(pool));

    let store = Arc::new(SchemaStore::open(settings.model_dir.clone()).await?);
    let registry = ModelRegistry::new();
    let loaded = SchemaLoader::new(store.clone(), tables.clone()).load_all().await?;
    tracing::info!(count = loaded.len(), dir = %settings.model_dir.display(), "models loaded");
    registry.merge(loaded);

    let state = AppState::new(store, tables, registry, settings.jwt_secret.as_str(), settings.sample_rows);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Model Forge listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
