//! Pass 4: back-fill resolved names into every reference-bearing field.
//!
//! Misses are expected in partial exports; they get the placeholder name and
//! are only counted.

use crate::model::Entity;
use crate::pass3_lookup::ObjectLookup;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: usize,
    pub unresolved: usize,
}

pub fn resolve_references(entities: &mut [Entity], lookup: &ObjectLookup) -> ResolveStats {
    let mut stats = ResolveStats::default();
    for entity in entities.iter_mut() {
        for reference in entity.references_mut() {
            if lookup.contains(&reference.id) {
                stats.resolved += 1;
            } else {
                stats.unresolved += 1;
            }
            reference.name = Some(lookup.resolve(&reference.id));
        }
    }
    stats
}
