//! Pass 3: build the object lookup, identifier -> (name, type, description).
//!
//! The lookup is built once per version from every extracted entity and is
//! read-only afterwards; Pass 4 and the comparator receive it by reference.

use crate::error::{Diagnostic, DiagnosticKind};
use crate::model::{Entity, ObjectType};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Number of identifier characters kept in an unresolved placeholder.
pub const PLACEHOLDER_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectLookupEntry {
    pub id: String,
    pub name: String,
    pub object_type: ObjectType,
    pub description: String,
}

impl ObjectLookupEntry {
    fn from_entity(entity: &Entity) -> Self {
        ObjectLookupEntry {
            id: entity.id.clone(),
            name: entity.name.clone(),
            object_type: entity.object_type,
            description: entity.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectLookup {
    entries: BTreeMap<String, ObjectLookupEntry>,
}

impl ObjectLookup {
    pub fn get(&self, id: &str) -> Option<&ObjectLookupEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.name.as_str())
    }

    /// Registered name of `id`, or the unresolved placeholder. Never fails.
    pub fn resolve(&self, id: &str) -> String {
        match self.name_of(id) {
            Some(name) => name.to_string(),
            None => placeholder_name(id),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectLookupEntry> {
        self.entries.values()
    }

    /// Flat `{ id: { name, type, description } }` mapping.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .values()
            .map(|e| {
                (
                    e.id.clone(),
                    json!({
                        "name": e.name,
                        "type": e.object_type.as_str(),
                        "description": e.description,
                    }),
                )
            })
            .collect();
        Value::Object(map)
    }

    fn insert(&mut self, entry: ObjectLookupEntry) -> Option<ObjectLookupEntry> {
        self.entries.insert(entry.id.clone(), entry)
    }
}

/// Placeholder name for an identifier absent from the lookup:
/// `Unknown (<first 8 chars>...)`.
pub fn placeholder_name(id: &str) -> String {
    let prefix: String = id.chars().take(PLACEHOLDER_PREFIX_LEN).collect();
    format!("Unknown ({}...)", prefix)
}

/// Register every entity. A repeated identifier overwrites the earlier
/// registration and is reported as a `DuplicateIdentifier` diagnostic.
pub fn build_lookup(entities: &[Entity]) -> (ObjectLookup, Vec<Diagnostic>) {
    let mut lookup = ObjectLookup::default();
    let mut diagnostics = Vec::new();
    let mut first_seen: BTreeMap<&str, &str> = BTreeMap::new();

    for entity in entities {
        if let Some(previous) = lookup.insert(ObjectLookupEntry::from_entity(entity)) {
            let earlier = first_seen.get(entity.id.as_str()).copied().unwrap_or("");
            warn!(id = %entity.id, earlier, later = %entity.source_path, "duplicate identifier");
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateIdentifier,
                    &entity.source_path,
                    format!(
                        "'{}' replaces earlier '{}' from {}",
                        entity.name, previous.name, earlier
                    ),
                )
                .for_object(&entity.id),
            );
        }
        first_seen.insert(entity.id.as_str(), entity.source_path.as_str());
    }
    (lookup, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityBody, GenericObject};
    use pretty_assertions::assert_eq;

    fn make_entity(id: &str, name: &str, path: &str) -> Entity {
        Entity::new(
            id,
            name,
            ObjectType::Constant,
            EntityBody::Generic(GenericObject::default()),
        )
        .with_source_path(path)
    }

    #[test]
    fn resolves_registered_names_exactly() {
        let (lookup, diags) = build_lookup(&[
            make_entity("_a-1", "FIRST", "content/1.xml"),
            make_entity("_a-2", "SECOND", "content/2.xml"),
        ]);
        assert!(diags.is_empty());
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.resolve("_a-1"), "FIRST");
        assert_eq!(lookup.resolve("_a-2"), "SECOND");
    }

    #[test]
    fn unresolved_identifiers_get_prefix_placeholder() {
        let lookup = ObjectLookup::default();
        assert_eq!(
            lookup.resolve("0002e3b4-1111-2222-3333-444455556666"),
            "Unknown (0002e3b4...)"
        );
        assert_eq!(lookup.resolve("abc"), "Unknown (abc...)");
        assert_eq!(lookup.resolve(""), "Unknown (...)");
    }

    #[test]
    fn last_write_wins_on_duplicates() {
        let (lookup, diags) = build_lookup(&[
            make_entity("_a-1", "OLD", "content/old.xml"),
            make_entity("_a-1", "NEW", "content/new.xml"),
        ]);
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.resolve("_a-1"), "NEW");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::DuplicateIdentifier);
        assert_eq!(diags[0].object_id.as_deref(), Some("_a-1"));
        assert_eq!(diags[0].path, "content/new.xml");
    }

    #[test]
    fn json_export_is_flat() {
        let (lookup, _) = build_lookup(&[make_entity("_a-1", "MAX", "content/1.xml")]);
        assert_eq!(
            lookup.to_json(),
            json!({ "_a-1": { "name": "MAX", "type": "Constant", "description": "" } })
        );
    }
}
