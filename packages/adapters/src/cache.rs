use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type CachedModule = Arc<dyn Any + Send + Sync>;

/// Lazily built compiler state (compiled regex sets, lookup tables) shared
/// by every adapter instance created from one context
#[derive(Default)]
pub struct CompilerCache {
    modules: Mutex<HashMap<&'static str, CachedModule>>,
}

impl CompilerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the module stored under `key`, building it on first use
    pub fn get_or_try_init<T, E, F>(&self, key: &'static str, init: F) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, E>,
    {
        let mut modules = self.modules.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = modules.get(key) {
            if let Ok(module) = Arc::clone(existing).downcast::<T>() {
                return Ok(module);
            }
            tracing::warn!(key, "Cached compiler module has a different type, rebuilding");
        }

        tracing::debug!(key, "Loading compiler module");
        let module = Arc::new(init()?);
        modules.insert(key, module.clone());
        Ok(module)
    }

    pub fn get_or_init<T, F>(&self, key: &'static str, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        match self.get_or_try_init::<T, std::convert::Infallible, _>(key, || Ok(init())) {
            Ok(module) => module,
            Err(never) => match never {},
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl fmt::Debug for CompilerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules = self.modules.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CompilerCache")
            .field("modules", &modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
