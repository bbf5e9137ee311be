//! Schema store: one JSON file per model definition under the model directory.
//! Keys keep the case they were created with; lookups by name ignore case.

use crate::schema::ModelDefinition;
use std::path::{Path, PathBuf};
use thiserror::Error;

const EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("model {0} not found")]
    NotFound(String),
    #[error("schema store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed definition in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One file found while listing, parsed or not.
#[derive(Debug)]
pub struct StoredEntry {
    pub file: String,
    pub definition: Result<ModelDefinition, StoreError>,
}

#[derive(Clone, Debug)]
pub struct SchemaStore {
    dir: PathBuf,
}

impl SchemaStore {
    /// Open the store, creating the directory when missing.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !tokio::fs::try_exists(&dir).await? {
            tokio::fs::create_dir_all(&dir).await?;
            tracing::info!(dir = %dir.display(), "created model directory");
        }
        Ok(SchemaStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when any stored key equals `name` ignoring case, ambiguous or not.
    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let name = name.trim();
        Ok(self.keys().await?.iter().any(|k| k.eq_ignore_ascii_case(name)))
    }

    pub async fn read(&self, name: &str) -> Result<ModelDefinition, StoreError> {
        let key = self
            .resolve_key(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        self.read_key(&key).await
    }

    /// Write via a temp file and rename so readers never see a partial definition.
    /// Overwrites an existing definition whose name matches ignoring case.
    pub async fn write(&self, def: &ModelDefinition) -> Result<(), StoreError> {
        let key = self.resolve_key(&def.name).await?.unwrap_or_else(|| def.name.clone());
        let body = serde_json::to_vec_pretty(def).map_err(|source| StoreError::Json {
            file: file_name(&key),
            source,
        })?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &body).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, self.path_for(&key)).await
        }
        .await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(model = %def.name, "definition written");
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let key = self
            .resolve_key(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        tokio::fs::remove_file(self.path_for(&key)).await?;
        Ok(())
    }

    /// Every parseable definition, ordered by key. Unreadable files are logged and skipped.
    pub async fn list(&self) -> Result<Vec<ModelDefinition>, StoreError> {
        let mut out = Vec::new();
        for entry in self.list_entries().await? {
            match entry.definition {
                Ok(def) => out.push(def),
                Err(e) => tracing::warn!(file = %entry.file, error = %e, "skipping unreadable definition"),
            }
        }
        Ok(out)
    }

    /// Every definition file with its parse result, ordered by key.
    pub async fn list_entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        let keys = self.keys().await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let definition = self.read_key(&key).await;
            out.push(StoredEntry {
                file: file_name(&key),
                definition,
            });
        }
        Ok(out)
    }

    async fn read_key(&self, key: &str) -> Result<ModelDefinition, StoreError> {
        let raw = match tokio::fs::read(self.path_for(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|source| StoreError::Json {
            file: file_name(key),
            source,
        })
    }

    /// Stored key for `name`: an exact match wins, otherwise the only key equal ignoring case.
    async fn resolve_key(&self, name: &str) -> Result<Option<String>, StoreError> {
        let name = name.trim();
        let keys = self.keys().await?;
        if keys.iter().any(|k| k == name) {
            return Ok(Some(name.to_string()));
        }
        // Several case variants and none exact: ambiguous, treated as absent.
        let mut matches = keys.into_iter().filter(|k| k.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Ok(Some(only)),
            _ => Ok(None),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if stem.starts_with('.') {
                continue;
            }
            keys.push(stem.to_string());
        }
        keys.sort();
        Ok(keys)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

fn file_name(key: &str) -> String {
    format!("{}.{}", key, EXTENSION)
}
