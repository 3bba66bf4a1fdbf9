//! `recordTypeHaul` documents.

use super::{header, shape_mismatch, Extraction};
use crate::model::{
    Entity, EntityBody, ObjectType, RecordAction, RecordField, RecordType, Reference, Relationship,
};
use crate::xml;
use roxmltree::Node;

const RELATIONSHIP_TARGETS: &[&str] = &["targetRecordTypeUuid", "targetUuid", "target"];
const ACTION_TARGETS: &[&str] = &["processModelUuid", "targetUuid", "target"];

pub fn extract_record_type(_path: &str, root: Node<'_, '_>) -> Extraction {
    let object = xml::child(root, "recordType").ok_or_else(|| shape_mismatch(root, "recordType"))?;
    let h = header(object)?;

    let record = RecordType {
        fields: fields(object),
        relationships: relationships(object),
        actions: actions(object),
    };
    Ok(Some(
        Entity::new(h.id, h.name, ObjectType::RecordType, EntityBody::RecordType(record))
            .with_description(h.description),
    ))
}

/// Field declarations, either directly under the object or inside `<fields>`.
fn fields(object: Node<'_, '_>) -> Vec<RecordField> {
    let container = xml::child(object, "fields").unwrap_or(object);
    xml::children(container, "field")
        .filter_map(|f| {
            let name = xml::attr_or_child(f, "name")?;
            Some(RecordField {
                name,
                data_type: xml::attr_or_child(f, "type").unwrap_or_default(),
                required: xml::attr_or_child(f, "required")
                    .map(|v| xml::parse_bool(&v))
                    .unwrap_or(false),
            })
        })
        .collect()
}

fn relationships(object: Node<'_, '_>) -> Vec<Relationship> {
    let container = xml::child(object, "relationships").unwrap_or(object);
    xml::children(container, "relationship")
        .map(|r| Relationship {
            name: xml::attr_or_child(r, "name").unwrap_or_default(),
            target: target_of(r, RELATIONSHIP_TARGETS),
        })
        .collect()
}

fn actions(object: Node<'_, '_>) -> Vec<RecordAction> {
    let container = xml::child(object, "actions").unwrap_or(object);
    xml::element_children(container)
        .filter(|a| matches!(xml::local_name(*a), "recordAction" | "action"))
        .map(|a| {
            let title = xml::child(a, "title")
                .and_then(xml::localized_text)
                .or_else(|| xml::attr_or_child(a, "title"))
                .or_else(|| xml::object_name(a))
                .unwrap_or_default();
            RecordAction {
                title,
                process: target_of(a, ACTION_TARGETS),
            }
        })
        .collect()
}

/// The first declared target, or an empty reference when none is declared.
fn target_of(node: Node<'_, '_>, names: &[&str]) -> Reference {
    names
        .iter()
        .find_map(|n| xml::attr_or_child(node, n))
        .map(Reference::new)
        .unwrap_or_else(Reference::unset)
}
