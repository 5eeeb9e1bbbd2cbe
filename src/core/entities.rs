//! Entity Expansion Table
//!
//! Replacement text for entities declared with an inline literal, keyed by
//! name. Parameter and general entities are separate namespaces. Only the
//! first registration of a name counts, matching the XML rule that the first
//! declaration of an entity is binding.

use std::collections::HashMap;

/// Which entity namespace a name lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityNamespace {
    /// `%name;` references, expanded while scanning the DTD
    Parameter,
    /// `&name;` references, only meaningful in document content
    General,
}

/// Name -> replacement text, scoped to one parser instance
#[derive(Debug, Default)]
pub struct EntityTable {
    parameter: HashMap<String, String>,
    general: HashMap<String, String>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, ns: EntityNamespace) -> &HashMap<String, String> {
        match ns {
            EntityNamespace::Parameter => &self.parameter,
            EntityNamespace::General => &self.general,
        }
    }

    /// Register replacement text. Returns false (and keeps the existing
    /// text) if the name was already registered.
    pub fn register(&mut self, ns: EntityNamespace, name: &str, text: &str) -> bool {
        let map = match ns {
            EntityNamespace::Parameter => &mut self.parameter,
            EntityNamespace::General => &mut self.general,
        };
        if map.contains_key(name) {
            return false;
        }
        map.insert(name.to_string(), text.to_string());
        true
    }

    /// Look up replacement text
    pub fn resolve(&self, ns: EntityNamespace, name: &str) -> Option<&str> {
        self.map(ns).get(name).map(String::as_str)
    }
}
