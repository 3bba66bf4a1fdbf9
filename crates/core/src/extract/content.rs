//! `contentHaul` documents: interfaces, expression rules, constants,
//! decisions and outbound integrations share one root element and are told
//! apart by the object element beneath it.

use super::simple::extract_object;
use super::{shape_mismatch, Extraction};
use crate::model::ObjectType;
use crate::xml;
use roxmltree::Node;

/// Object element tag -> type tag.
pub const CONTENT_OBJECTS: &[(&str, ObjectType)] = &[
    ("interface", ObjectType::Interface),
    ("rule", ObjectType::ExpressionRule),
    ("expressionRule", ObjectType::ExpressionRule),
    ("constant", ObjectType::Constant),
    ("decision", ObjectType::Decision),
    ("outboundIntegration", ObjectType::Integration),
];

/// Content elements that are recognized but carry no comparable object.
pub const CONTENT_PLACEHOLDERS: &[&str] = &[
    "folder",
    "rulesFolder",
    "communityKnowledgeCenter",
    "knowledgeCenter",
    "community",
];

pub fn extract_content(_path: &str, root: Node<'_, '_>) -> Extraction {
    for el in xml::element_children(root) {
        let tag = xml::local_name(el);
        if let Some((_, object_type)) = CONTENT_OBJECTS.iter().find(|(t, _)| *t == tag) {
            return Ok(Some(extract_object(el, *object_type)?));
        }
    }

    let placeholder = xml::element_children(root)
        .any(|el| CONTENT_PLACEHOLDERS.contains(&xml::local_name(el)));
    if placeholder {
        Ok(None)
    } else {
        Err(shape_mismatch(root, "interface|rule|constant|decision|outboundIntegration"))
    }
}
