//! String key/value configuration for the graph engine.
//!
//! Keys are dotted (`graph.max_depth`). Values stay strings until read
//! through a [`DogConfigSnapshot`], which parses on demand.
//!
//! ## Setting and reading values
//! ```rust
//! use dog_core::DogConfig;
//! let mut config = DogConfig::new();
//!
//! config.set("graph.max_depth", "6");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_usize("graph.max_depth"), Some(6));
//! ```
//!
//! ## Environment overrides
//! [`DogConfig::overlay_env`] copies every variable carrying a prefix
//! into the store, lowercased, with `__` turned into `.`:
//!
//! ```bash
//! export DOG__GRAPH__MAX_DEPTH=4   # graph.max_depth = 4
//! ```
//!
//! File formats and secret stores are left to the application; it
//! feeds whatever pairs it has through [`DogConfig::set`].

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DogConfig {
    values: HashMap<String, String>,
}

impl DogConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    ///
    /// Example: config.set("graph.default_limit", "25")
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    ///
    /// Returns None if the key is not present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Overlay process environment variables starting with `prefix`.
    ///
    /// `DOG__GRAPH__MAX_DEPTH` with prefix `DOG__` becomes `graph.max_depth`.
    pub fn overlay_env(&mut self, prefix: &str) {
        self.overlay_vars(prefix, std::env::vars());
    }

    pub(crate) fn overlay_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> DogConfigSnapshot {
        DogConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DogConfigSnapshot {
    map: HashMap<String, String>,
}

impl DogConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }
}
