//! Process settings read from the environment (a `.env` file is loaded by the server first).

use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/model_forge";
pub const DEFAULT_MODEL_DIR: &str = "dynamic_models";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub model_dir: PathBuf,
    pub bind_addr: String,
    /// HS256 secret for caller tokens. Empty rejects every protected request.
    pub jwt_secret: String,
    pub max_connections: u32,
    /// Rows returned by get-model.
    pub sample_rows: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            jwt_secret: String::new(),
            max_connections: 5,
            sample_rows: 5,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();
        let number = |key: &str, default: u32| {
            get(key)
                .and_then(|v| match v.trim().parse::<u32>() {
                    Ok(n) => Some(n),
                    Err(_) => {
                        tracing::warn!(key, value = %v, "ignoring non-numeric setting");
                        None
                    }
                })
                .unwrap_or(default)
        };
        Settings {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            model_dir: get("MODEL_DIR").map(PathBuf::from).unwrap_or(defaults.model_dir),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret: get("JWT_SECRET").unwrap_or_default(),
            max_connections: number("DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            sample_rows: number("SAMPLE_ROWS", defaults.sample_rows),
        }
    }
}
