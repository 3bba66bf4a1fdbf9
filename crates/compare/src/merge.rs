//! Three-way merge classification.
//!
//! Each identifier in the union of a base (B), customer (C) and vendor (V)
//! version is classified from presence and three equality facts. Presence is
//! checked first:
//!
//! | B | C | V | outcome |
//! |---|---|---|---------|
//! | absent | absent | present | `New` |
//! | present | absent | present | `Deleted` |
//!
//! Every other combination falls through to [`outcome_from_facts`], where an
//! absent side equals another absent side and nothing else.

use crate::diff::{compare_entity, entities_equal, ChangeKind, ChangeRecord};
use haulmerge_core::{Entity, ObjectGraph, ObjectType};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MergeOutcome {
    NoConflict,
    Conflict,
    New,
    Deleted,
}

/// Equality of comparable fields between the three versions of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EqualityFacts {
    pub vendor_equals_base: bool,
    pub customer_equals_base: bool,
    pub vendor_equals_customer: bool,
}

/// Outcome for an object present in enough versions to compare.
pub fn outcome_from_facts(facts: EqualityFacts) -> MergeOutcome {
    match facts {
        EqualityFacts {
            vendor_equals_base: true,
            ..
        } => MergeOutcome::NoConflict,
        EqualityFacts {
            customer_equals_base: true,
            ..
        } => MergeOutcome::NoConflict,
        EqualityFacts {
            vendor_equals_customer: true,
            ..
        } => MergeOutcome::NoConflict,
        _ => MergeOutcome::Conflict,
    }
}

/// The base-to-customer and base-to-vendor diffs behind an outcome. A side
/// is `None` when that version made no change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeEvidence {
    pub customer: Option<ChangeRecord>,
    pub vendor: Option<ChangeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeClassification {
    pub object_id: String,
    pub object_name: String,
    pub object_type: ObjectType,
    pub outcome: MergeOutcome,
    pub evidence: MergeEvidence,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub no_conflict: usize,
    pub conflict: usize,
    pub new: usize,
    pub deleted: usize,
}

impl MergeSummary {
    fn count(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::NoConflict => self.no_conflict += 1,
            MergeOutcome::Conflict => self.conflict += 1,
            MergeOutcome::New => self.new += 1,
            MergeOutcome::Deleted => self.deleted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.no_conflict + self.conflict + self.new + self.deleted
    }
}

/// Classification of every object across three versions, keyed by
/// identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeClassificationMap {
    pub base_version: String,
    pub customer_version: String,
    pub vendor_version: String,
    pub summary: MergeSummary,
    pub classifications: BTreeMap<String, MergeClassification>,
}

impl MergeClassificationMap {
    pub fn get(&self, object_id: &str) -> Option<&MergeClassification> {
        self.classifications.get(object_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergeClassification> {
        self.classifications.values()
    }

    pub fn with_outcome(&self, outcome: MergeOutcome) -> impl Iterator<Item = &MergeClassification> {
        self.iter().filter(move |c| c.outcome == outcome)
    }

    pub fn len(&self) -> usize {
        self.classifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifications.is_empty()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "base_version": self.base_version,
            "customer_version": self.customer_version,
            "vendor_version": self.vendor_version,
            "summary": self.summary,
            "classifications": self.classifications,
        })
    }
}

/// Classify one identifier. `None` when it is absent from all three
/// versions.
pub fn classify_entity(
    object_id: &str,
    base: Option<&Entity>,
    customer: Option<&Entity>,
    vendor: Option<&Entity>,
) -> Option<MergeClassification> {
    let header = vendor.or(customer).or(base)?;

    let customer_change = compare_entity(object_id, base, customer);
    let vendor_change = compare_entity(object_id, base, vendor);

    let outcome = match (base, customer, vendor) {
        (None, None, Some(_)) => MergeOutcome::New,
        (Some(_), None, Some(_)) => MergeOutcome::Deleted,
        _ => outcome_from_facts(EqualityFacts {
            vendor_equals_base: is_unchanged(vendor_change.as_ref()),
            customer_equals_base: is_unchanged(customer_change.as_ref()),
            vendor_equals_customer: entities_equal(vendor, customer),
        }),
    };

    Some(MergeClassification {
        object_id: object_id.to_string(),
        object_name: header.name.clone(),
        object_type: header.object_type,
        outcome,
        evidence: MergeEvidence {
            customer: customer_change.filter(|r| r.kind != ChangeKind::Unchanged),
            vendor: vendor_change.filter(|r| r.kind != ChangeKind::Unchanged),
        },
    })
}

// No record means both sides were absent.
fn is_unchanged(record: Option<&ChangeRecord>) -> bool {
    record.map_or(true, |r| r.kind == ChangeKind::Unchanged)
}

/// Classify every identifier present in any of the three versions.
pub fn classify_three_way(
    base: &ObjectGraph,
    customer: &ObjectGraph,
    vendor: &ObjectGraph,
) -> MergeClassificationMap {
    let ids: BTreeSet<&str> = base
        .ids()
        .chain(customer.ids())
        .chain(vendor.ids())
        .collect();

    let mut summary = MergeSummary::default();
    let mut classifications = BTreeMap::new();
    for id in ids {
        if let Some(c) = classify_entity(id, base.get(id), customer.get(id), vendor.get(id)) {
            summary.count(c.outcome);
            classifications.insert(id.to_string(), c);
        }
    }

    debug!(
        base = %base.version,
        customer = %customer.version,
        vendor = %vendor.version,
        objects = summary.total(),
        conflicts = summary.conflict,
        new = summary.new,
        deleted = summary.deleted,
        "classified three-way merge"
    );

    MergeClassificationMap {
        base_version: base.version.clone(),
        customer_version: customer.version.clone(),
        vendor_version: vendor.version.clone(),
        summary,
        classifications,
    }
}
