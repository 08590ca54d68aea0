use super::types::VarId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name <-> handle table for the variables of one store.
///
/// Handles are dense and assigned in first-seen order, so `VarId(i)` is also
/// the column index of the series in the store's data block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct VariableRegistry {
    names: Vec<String>,
    // Rebuilt on load, never serialized
    lookup: HashMap<String, VarId>,
}

impl VariableRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.names.len() }

    /// Rebuilds the name lookup after deserialization.
    pub fn rebuild_name_cache(&mut self) {
        self.lookup = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), VarId::new(i)))
            .collect();
    }

    /// Returns the handle for `name`, registering it if unseen.
    /// The flag is `true` when the name was newly registered.
    pub fn intern(&mut self, name: &str) -> (VarId, bool) {
        if let Some(&id) = self.lookup.get(name) {
            return (id, false);
        }
        let id = VarId::new(self.names.len());
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        (id, true)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.lookup.get(name).copied()
    }

    #[inline]
    pub fn name(&self, id: VarId) -> &str {
        &self.names[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (VarId::new(i), n.as_str()))
    }
}

impl From<Vec<String>> for VariableRegistry {
    fn from(names: Vec<String>) -> Self {
        let mut registry = Self { names, lookup: HashMap::new() };
        registry.rebuild_name_cache();
        registry
    }
}

impl From<VariableRegistry> for Vec<String> {
    fn from(registry: VariableRegistry) -> Self { registry.names }
}
