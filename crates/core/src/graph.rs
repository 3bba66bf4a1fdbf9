//! The finished object graph of one version.

use crate::model::Entity;
use crate::pass3_lookup::ObjectLookup;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Every entity of one version keyed by identifier, plus the lookup built
/// from them. Read-only once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectGraph {
    pub version: String,
    entities: BTreeMap<String, Entity>,
    lookup: ObjectLookup,
}

impl ObjectGraph {
    /// Assemble a graph. When identifiers repeat, the later entity wins,
    /// matching the lookup's last-write-wins rule.
    pub fn new(version: impl Into<String>, entities: Vec<Entity>, lookup: ObjectLookup) -> Self {
        ObjectGraph {
            version: version.into(),
            entities: entities.into_iter().map(|e| (e.id.clone(), e)).collect(),
            lookup,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn lookup(&self) -> &ObjectLookup {
        &self.lookup
    }

    /// Entities holding at least one reference to `id`, in identifier order.
    pub fn dependents_of(&self, id: &str) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.id != id && e.references().iter().any(|r| r.id == id))
            .collect()
    }

    /// Flat `{ id: { name, type, description } }` export of the lookup.
    pub fn lookup_json(&self) -> Value {
        self.lookup.to_json()
    }
}
