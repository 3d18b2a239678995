use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::TrackerBackend;

/// Shared handle to a loaded backend.
///
/// Backends are wrapped in `Mutex` because `TrackerBackend::track` takes `&mut self`.
pub type SharedBackend = Arc<Mutex<dyn TrackerBackend>>;

/// Thread-safe registry of tracker backends, populated once at startup.
pub struct BackendRegistry {
    backends: HashMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: TrackerBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{ReplayBackend, StubBackend};
    use crate::detect::result::ClassNames;

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        assert!(registry.default_backend().is_none());

        registry.register(StubBackend::new());
        registry.register(ReplayBackend::new(ClassNames::new(["reading"]), vec![]));

        let default = registry.default_backend().unwrap();
        assert_eq!(default.lock().unwrap().name(), "stub");
        assert_eq!(registry.list(), vec!["replay", "stub"]);

        registry.set_default("replay").unwrap();
        let default = registry.default_backend().unwrap();
        assert_eq!(default.lock().unwrap().name(), "replay");

        assert!(registry.set_default("yolo").is_err());
        assert!(registry.get("yolo").is_none());
    }
}
