//! Two-version comparison.
//!
//! Every identifier in the union of two graphs gets one [`ChangeRecord`].
//! Presence decides `Added`/`Removed`; otherwise the comparable-field
//! projections of both sides are diffed key by key.

use crate::fields::{comparable_fields, is_code_field, Fields};
use crate::impact::ImpactPolicy;
use crate::report::{CategoryBreakdown, ComparisonReport, ReportSummary};
use haulmerge_core::{Entity, ObjectGraph, ObjectType};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// One differing comparable field. A side where the field does not exist is
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
    /// Character-count delta, for code fields only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_delta: Option<i64>,
}

/// Summary of the code fields that changed on one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeDiff {
    pub fields: Vec<String>,
    pub char_delta: i64,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub object_id: String,
    pub object_name: String,
    pub object_type: ObjectType,
    pub kind: ChangeKind,
    pub fields: Vec<FieldChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_diff: Option<CodeDiff>,
}

impl ChangeRecord {
    pub fn field(&self, name: &str) -> Option<&FieldChange> {
        self.fields.iter().find(|f| f.field == name)
    }
}

/// Compare one identifier across two versions. `None` when the identifier
/// is absent from both.
pub fn compare_entity(
    object_id: &str,
    old: Option<&Entity>,
    new: Option<&Entity>,
) -> Option<ChangeRecord> {
    let (kind, before, after) = match (old, new) {
        (None, None) => return None,
        (None, Some(n)) => (ChangeKind::Added, Fields::new(), comparable_fields(n)),
        (Some(o), None) => (ChangeKind::Removed, comparable_fields(o), Fields::new()),
        (Some(o), Some(n)) => {
            let before = comparable_fields(o);
            let after = comparable_fields(n);
            let kind = if before == after {
                ChangeKind::Unchanged
            } else {
                ChangeKind::Modified
            };
            (kind, before, after)
        }
    };

    // At least one side is present past the match.
    let header = new.or(old)?;
    let fields = diff_fields(&before, &after);
    let code_diff = code_diff(&fields);

    Some(ChangeRecord {
        object_id: object_id.to_string(),
        object_name: header.name.clone(),
        object_type: header.object_type,
        kind,
        fields,
        code_diff,
    })
}

/// Equality on comparable fields. Two absent sides are equal.
pub fn entities_equal(a: Option<&Entity>, b: Option<&Entity>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => comparable_fields(a) == comparable_fields(b),
        _ => false,
    }
}

fn diff_fields(before: &Fields, after: &Fields) -> Vec<FieldChange> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let mut changes = Vec::new();
    for key in keys {
        let b = before.get(key).cloned().unwrap_or(Value::Null);
        let a = after.get(key).cloned().unwrap_or(Value::Null);
        if a == b {
            continue;
        }
        let char_delta = is_code_field(key).then(|| char_len(&a) - char_len(&b));
        changes.push(FieldChange {
            field: key.clone(),
            before: b,
            after: a,
            char_delta,
        });
    }
    changes
}

fn code_diff(changes: &[FieldChange]) -> Option<CodeDiff> {
    let code: Vec<&FieldChange> = changes.iter().filter(|c| c.char_delta.is_some()).collect();
    if code.is_empty() {
        return None;
    }
    Some(CodeDiff {
        fields: code.iter().map(|c| c.field.clone()).collect(),
        char_delta: code.iter().filter_map(|c| c.char_delta).sum(),
        before: join_text(code.iter().map(|c| &c.before)),
        after: join_text(code.iter().map(|c| &c.after)),
    })
}

fn char_len(v: &Value) -> i64 {
    v.as_str().map_or(0, |s| s.chars().count() as i64)
}

fn join_text<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare two versions of an object graph.
pub fn compare_versions(
    old: &ObjectGraph,
    new: &ObjectGraph,
    policy: &ImpactPolicy,
) -> ComparisonReport {
    let ids: BTreeSet<&str> = old.ids().chain(new.ids()).collect();

    let mut records: Vec<ChangeRecord> = ids
        .iter()
        .filter_map(|id| compare_entity(id, old.get(id), new.get(id)))
        .collect();
    records.sort_by(|a, b| {
        (a.object_type, &a.object_id).cmp(&(b.object_type, &b.object_id))
    });

    let mut categories: BTreeMap<ObjectType, CategoryBreakdown> = BTreeMap::new();
    for record in &records {
        categories
            .entry(record.object_type)
            .or_default()
            .count(record.kind);
    }

    let (total_changes, modified) = categories
        .values()
        .fold((0, 0), |(t, m), c| (t + c.changes(), m + c.modified));
    let modified_ratio = if ids.is_empty() {
        0.0
    } else {
        modified as f64 / ids.len() as f64
    };
    let impact = policy.level(total_changes, modified_ratio);

    debug!(
        from = %old.version,
        to = %new.version,
        objects = ids.len(),
        total_changes,
        modified,
        %impact,
        "compared versions"
    );

    ComparisonReport {
        summary: ReportSummary {
            from_version: old.version.clone(),
            to_version: new.version.clone(),
            total_changes,
            impact,
            modified_ratio,
        },
        categories,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::ImpactLevel;
    use haulmerge_core::model::{GenericObject, RecordField, RecordType};
    use haulmerge_core::{CodeBody, EntityBody, ObjectLookup};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn make_constant(id: &str, name: &str, value: &str) -> Entity {
        let mut properties = BTreeMap::new();
        properties.insert("value".to_string(), value.to_string());
        Entity::new(
            id,
            name,
            ObjectType::Constant,
            EntityBody::Generic(GenericObject {
                properties,
                code: None,
                references: Vec::new(),
            }),
        )
    }

    fn make_rule(id: &str, code: &str) -> Entity {
        Entity::new(
            id,
            "rule",
            ObjectType::ExpressionRule,
            EntityBody::Generic(GenericObject {
                properties: BTreeMap::new(),
                code: Some(CodeBody::new(code)),
                references: Vec::new(),
            }),
        )
    }

    fn make_graph(version: &str, entities: Vec<Entity>) -> ObjectGraph {
        ObjectGraph::new(version, entities, ObjectLookup::default())
    }

    #[test]
    fn presence_decides_added_and_removed() {
        let c = make_constant("_c", "LIMIT", "5");
        let added = compare_entity("_c", None, Some(&c)).unwrap();
        assert_eq!(added.kind, ChangeKind::Added);
        assert_eq!(added.field("name").unwrap().before, Value::Null);

        let removed = compare_entity("_c", Some(&c), None).unwrap();
        assert_eq!(removed.kind, ChangeKind::Removed);
        assert_eq!(removed.field("properties.value").unwrap().after, Value::Null);

        assert!(compare_entity("_c", None, None).is_none());
    }

    #[test]
    fn modified_lists_only_differing_fields() {
        let old = make_constant("_c", "LIMIT", "5");
        let new = make_constant("_c", "LIMIT", "7").with_description("raised");
        let record = compare_entity("_c", Some(&old), Some(&new)).unwrap();
        assert_eq!(record.kind, ChangeKind::Modified);
        let names: Vec<&str> = record.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["description", "properties.value"]);
        assert_eq!(record.field("properties.value").unwrap().after, json!("7"));
        assert!(record.code_diff.is_none());
    }

    #[test]
    fn code_changes_carry_character_delta_and_text() {
        let old = make_rule("_r", "a!sum(1, 2)");
        let new = make_rule("_r", "a!sum(1, 2, 3)");
        let record = compare_entity("_r", Some(&old), Some(&new)).unwrap();
        let change = record.field("definition").unwrap();
        assert_eq!(change.char_delta, Some(5));

        let code = record.code_diff.unwrap();
        assert_eq!(code.fields, vec!["definition"]);
        assert_eq!(code.char_delta, 5);
        assert!(code.before.contains("2"));
        assert!(code.after.contains("3"));
    }

    #[test]
    fn whitespace_only_code_edit_is_unchanged() {
        let old = make_rule("_r", "a!sum(1,2)");
        let new = make_rule("_r", "a!sum(  1,\n 2)");
        let record = compare_entity("_r", Some(&old), Some(&new)).unwrap();
        assert_eq!(record.kind, ChangeKind::Unchanged);
        assert!(record.fields.is_empty());
    }

    #[test]
    fn record_field_order_is_comparable() {
        let make = |names: &[&str]| {
            Entity::new(
                "_rt",
                "Order",
                ObjectType::RecordType,
                EntityBody::RecordType(RecordType {
                    fields: names
                        .iter()
                        .map(|n| RecordField {
                            name: n.to_string(),
                            data_type: "Text".into(),
                            required: false,
                        })
                        .collect(),
                    ..RecordType::default()
                }),
            )
        };
        let record = compare_entity("_rt", Some(&make(&["a", "b"])), Some(&make(&["b", "a"]))).unwrap();
        assert_eq!(record.kind, ChangeKind::Modified);
        let names: Vec<&str> = record.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["field_order"]);
    }

    #[test]
    fn graph_against_itself_is_all_unchanged() {
        let graph = make_graph(
            "v1",
            vec![make_constant("_a", "A", "1"), make_rule("_b", "x + 1")],
        );
        let report = compare_versions(&graph, &graph, &ImpactPolicy::default());
        assert_eq!(report.records.len(), 2);
        assert!(report.records.iter().all(|r| r.kind == ChangeKind::Unchanged));
        assert_eq!(report.summary.total_changes, 0);
        assert_eq!(report.summary.impact, ImpactLevel::None);
        assert!(report.is_empty());
    }

    #[test]
    fn one_added_one_removed_is_lowest_nonzero_impact() {
        let old = make_graph(
            "v1",
            vec![make_constant("_keep", "K", "1"), make_constant("_gone", "G", "1")],
        );
        let new = make_graph(
            "v2",
            vec![make_constant("_keep", "K", "1"), make_constant("_new", "N", "1")],
        );
        let report = compare_versions(&old, &new, &ImpactPolicy::default());
        assert_eq!(report.summary.total_changes, 2);
        assert_eq!(report.summary.impact, ImpactLevel::Low);
        assert_eq!(
            report.categories[&ObjectType::Constant],
            CategoryBreakdown {
                added: 1,
                modified: 0,
                removed: 1,
                unchanged: 1,
            }
        );
        let changed: Vec<&str> = report.changes().map(|r| r.object_id.as_str()).collect();
        assert_eq!(changed, vec!["_gone", "_new"]);
    }

    #[test]
    fn records_are_ordered_by_type_then_identifier() {
        let old = make_graph("v1", Vec::new());
        let new = make_graph(
            "v2",
            vec![
                make_rule("_z", "1"),
                make_constant("_y", "Y", "1"),
                make_rule("_a", "1"),
            ],
        );
        let report = compare_versions(&old, &new, &ImpactPolicy::default());
        let order: Vec<&str> = report.records.iter().map(|r| r.object_id.as_str()).collect();
        assert_eq!(order, vec!["_a", "_z", "_y"]);
        assert_eq!(report.summary.from_version, "v1");
        assert_eq!(report.summary.to_version, "v2");
    }

    #[test]
    fn modified_ratio_uses_union_size() {
        let old = make_graph(
            "v1",
            vec![make_constant("_a", "A", "1"), make_constant("_b", "B", "1")],
        );
        let new = make_graph(
            "v2",
            vec![make_constant("_a", "A", "2"), make_constant("_b", "B", "1")],
        );
        let report = compare_versions(&old, &new, &ImpactPolicy::default());
        assert_eq!(report.summary.modified_ratio, 0.5);
        assert_eq!(report.summary.impact, ImpactLevel::High);
    }
}
