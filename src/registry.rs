//! Name → constructor lookup for configurable components

use crate::config::ConfigError;
use std::collections::BTreeMap;

/// Maps configured component names to constructors of type `C`
pub struct Registry<C> {
    kind: &'static str,
    entries: BTreeMap<String, C>,
}

impl<C> Registry<C> {
    /// Create an empty registry for components of `kind` (used in errors)
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Register `ctor` under `name`, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, ctor: C) -> &mut Self {
        self.entries.insert(name.into(), ctor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Look up `name`, failing with the list of known names
    pub fn resolve(&self, name: &str) -> Result<&C, ConfigError> {
        self.entries
            .get(name)
            .ok_or_else(|| ConfigError::UnknownComponent {
                kind: self.kind,
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }
}
