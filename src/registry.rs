//! Live model registry: model name -> current table binding.
//! Readers clone an `Arc` out under a short read lock; writers swap whole bindings.

use crate::schema::TableBinding;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Inner {
    /// Lowercased model name -> binding.
    by_name: HashMap<String, Arc<TableBinding>>,
    /// Path segment -> lowercased model name.
    by_path: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct ModelRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<TableBinding>> {
        self.read(|inner| inner.by_name.get(&name.to_lowercase()).cloned())
    }

    pub fn get_by_path(&self, segment: &str) -> Option<Arc<TableBinding>> {
        self.read(|inner| {
            inner
                .by_path
                .get(segment)
                .and_then(|name| inner.by_name.get(name))
                .cloned()
        })
    }

    /// Replace (or add) the binding for its model in one step.
    pub fn swap(&self, binding: Arc<TableBinding>) -> Option<Arc<TableBinding>> {
        self.write(|inner| {
            let key = binding.model_name().to_lowercase();
            inner.by_path.insert(binding.path_segment().to_string(), key.clone());
            inner.by_name.insert(key, binding)
        })
    }

    pub fn remove(&self, name: &str) -> Option<Arc<TableBinding>> {
        self.write(|inner| {
            let removed = inner.by_name.remove(&name.to_lowercase());
            if let Some(ref b) = removed {
                inner.by_path.remove(b.path_segment());
            }
            removed
        })
    }

    /// Merge freshly loaded bindings; models not in `loaded` are left as they are.
    pub fn merge(&self, loaded: HashMap<String, Arc<TableBinding>>) {
        self.write(|inner| {
            for (_, binding) in loaded {
                let key = binding.model_name().to_lowercase();
                inner.by_path.insert(binding.path_segment().to_string(), key.clone());
                inner.by_name.insert(key, binding);
            }
        })
    }

    /// Model names currently bound, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read(|inner| {
            inner
                .by_name
                .values()
                .map(|b| b.model_name().to_string())
                .collect()
        });
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read(|inner| inner.by_name.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        // A panic while holding the lock cannot leave a half-written binding: every write is a map insert/remove.
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}
