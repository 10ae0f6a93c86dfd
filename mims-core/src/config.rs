//! # Configuration
//!
//! A string key/value store with dotted keys (`dgraph.base_url`,
//! `capabilities.ttl_secs`). Applications layer values however they like;
//! [`MimsConfig::load_env`] maps prefixed environment variables onto keys:
//!
//! ```rust
//! use mims_core::MimsConfig;
//!
//! let mut config = MimsConfig::new();
//! config.set("capabilities.ttl_secs", "120");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_u64("capabilities.ttl_secs"), Some(120));
//! ```
//!
//! With `MIMS__DGRAPH__BASE_URL=http://dgraph:8080` in the environment,
//! `config.load_env("MIMS__")` sets `dgraph.base_url`.
//!
//! Components read a [`MimsConfigSnapshot`], never the live store.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MimsConfig {
    values: HashMap<String, String>,
}

impl MimsConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Import every environment variable starting with `prefix`.
    ///
    /// `MIMS__TENANTS__BACKUP_DIR` with prefix `MIMS__` becomes `tenants.backup_dir`.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(prefix, std::env::vars())
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut loaded = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> MimsConfigSnapshot {
        MimsConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MimsConfigSnapshot {
    map: HashMap<String, String>,
}

impl MimsConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    /// Whole seconds stored under `key`.
    pub fn get_duration_secs(&self, key: &str) -> Option<Duration> {
        self.get_u64(key).map(Duration::from_secs)
    }
}
