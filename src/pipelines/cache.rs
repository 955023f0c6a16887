use crate::error::Result;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Identifies a model variant for sharing loaded weights.
pub trait ModelOptions {
    fn cache_key(&self) -> String;
}

// Entries are WEAK: weights are freed once the last pipeline holding them drops.
type CacheStorage = HashMap<(TypeId, String), Box<dyn Any + Send + Sync>>;

pub struct ModelCache {
    cache: Mutex<CacheStorage>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, CacheStorage> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live model for `key`, or the result of `loader` (then remembered).
    ///
    /// The lock is not held while loading.
    pub fn get_or_create<M, F>(&self, key: &str, loader: F) -> Result<Arc<M>>
    where
        M: Send + Sync + 'static,
        F: FnOnce() -> Result<M>,
    {
        let cache_key = (TypeId::of::<M>(), key.to_string());

        {
            let mut cache = self.entries();
            let live = cache
                .get(&cache_key)
                .and_then(|boxed| boxed.downcast_ref::<Weak<M>>())
                .and_then(Weak::upgrade);
            if let Some(strong) = live {
                tracing::debug!(key, "reusing loaded model");
                return Ok(strong);
            }
            cache.remove(&cache_key);
        }

        let model = Arc::new(loader()?);
        self.entries()
            .insert(cache_key, Box::new(Arc::downgrade(&model)));

        Ok(model)
    }

    /// Number of entries, dead ones included until next lookup.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_MODEL_CACHE: once_cell::sync::Lazy<ModelCache> =
    once_cell::sync::Lazy::new(ModelCache::new);

pub fn global_cache() -> &'static ModelCache {
    &GLOBAL_MODEL_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Weights {
        id: &'static str,
    }

    #[test]
    fn live_model_is_shared() {
        let cache = ModelCache::new();
        let first = cache
            .get_or_create("base-Cpu", || Ok(Weights { id: "first" }))
            .unwrap();
        let second = cache
            .get_or_create("base-Cpu", || Ok(Weights { id: "second" }))
            .unwrap();
        assert_eq!(second.id, "first");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn dropped_model_is_reloaded() {
        let cache = ModelCache::new();
        let first = cache
            .get_or_create("base-Cpu", || Ok(Weights { id: "first" }))
            .unwrap();
        drop(first);
        let again = cache
            .get_or_create("base-Cpu", || Ok(Weights { id: "reloaded" }))
            .unwrap();
        assert_eq!(again.id, "reloaded");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_and_types_are_independent() {
        let cache = ModelCache::new();
        let _base = cache
            .get_or_create("base-Cpu", || Ok(Weights { id: "base" }))
            .unwrap();
        let _large = cache
            .get_or_create("large-Cpu", || Ok(Weights { id: "large" }))
            .unwrap();
        let _other = cache.get_or_create("base-Cpu", || Ok(7u32)).unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn loader_error_is_not_cached() {
        let cache = ModelCache::new();
        let failed = cache.get_or_create::<Weights, _>("base-Cpu", || {
            Err(crate::error::PipelineError::Download("offline".into()))
        });
        assert!(failed.is_err());
        assert!(cache.is_empty());
    }
}
