//! Process-wide key vault shared by every environment.
//!
//! Persisted as `keys.json` (`{"keys":[{"alias","value","address"}]}`).
//! Aliases are unique; inserting an existing alias replaces the entry
//! in place so list order stays stable.

use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_KEY_ALIAS;

/// One stored private key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Key {
    pub alias: String,
    /// Hex-encoded private key material.
    pub value: String,
    /// Hex-encoded address derived from `value`.
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyVault {
    #[serde(default)]
    pub keys: Vec<Key>,
}

impl KeyVault {
    /// Insert a key, replacing any entry with the same alias.
    pub fn insert(&mut self, key: Key) {
        match self.keys.iter_mut().find(|k| k.alias == key.alias) {
            Some(existing) => *existing = key,
            None => self.keys.push(key),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&Key> {
        self.keys.iter().find(|k| k.alias == alias)
    }

    /// Resolve an alias, mapping the reserved `default` alias to the
    /// environment's declared default.
    pub fn resolve(&self, alias: &str, environment_default: &str) -> Option<&Key> {
        if alias.is_empty() || alias == DEFAULT_KEY_ALIAS {
            self.get(environment_default).or_else(|| self.get(DEFAULT_KEY_ALIAS))
        } else {
            self.get(alias)
        }
    }

    /// Remove keys matching `pattern`. A trailing `*` matches by prefix.
    /// Returns the removed aliases.
    pub fn remove(&mut self, pattern: &str) -> Vec<String> {
        let matches = |alias: &str| match pattern.strip_suffix('*') {
            Some(prefix) => alias.starts_with(prefix),
            None => alias == pattern,
        };

        let mut removed = Vec::new();
        self.keys.retain(|k| {
            if matches(&k.alias) {
                removed.push(k.alias.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.alias.as_str())
    }
}
