//! Fallback extraction for documents with no dedicated strategy, or whose
//! dedicated strategy reported a shape mismatch.
//!
//! Only the header (identifier, name, description) is interpreted; the rest
//! of the document is kept as a flattened property bag so nothing is lost.

use super::{collect_references, header, Extraction};
use crate::error::EntryError;
use crate::model::{Entity, EntityBody, GenericObject, ObjectType};
use crate::xml;
use roxmltree::Node;

pub fn extract_generic(_path: &str, root: Node<'_, '_>) -> Extraction {
    let (object, _) = locate_object(root).ok_or(EntryError::MissingField { field: "identifier" })?;
    let h = header(object)?;

    let references = collect_references(root, &h.id, std::iter::empty());
    let body = EntityBody::Generic(GenericObject {
        properties: xml::flatten(root),
        code: None,
        references,
    });
    Ok(Some(
        Entity::new(h.id, h.name, ObjectType::Unknown, body).with_description(h.description),
    ))
}

/// The element whose header names the document: the root itself, then the
/// first direct child carrying an identifier, then any deeper element. The
/// flag is set for the last case.
fn locate_object<'a, 'i>(root: Node<'a, 'i>) -> Option<(Node<'a, 'i>, bool)> {
    if xml::identifier(root).is_some() {
        return Some((root, false));
    }
    if let Some(child) = xml::element_children(root).find(|c| xml::identifier(*c).is_some()) {
        return Some((child, false));
    }
    root.descendants()
        .filter(|d| d.is_element())
        .find(|d| xml::identifier(*d).is_some())
        .map(|d| (d, true))
}

/// Local name of the element the fallback took its identifier from, when
/// that element sits below the root's direct children.
pub(crate) fn nested_object_tag<'a>(root: Node<'a, '_>) -> Option<&'a str> {
    match locate_object(root) {
        Some((node, true)) => Some(xml::local_name(node)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;

    #[test]
    fn preserves_header_and_raw_structure() {
        let doc = roxmltree::Document::parse(
            r#"<reportHaul><report uuid="_r-9" name="Weekly">
                 <description>Weekly totals</description>
                 <chartType>bar</chartType>
                 <dataSourceUuid>_rt-1</dataSourceUuid>
               </report></reportHaul>"#,
        )
        .unwrap();
        let entity = extract_generic("report/_r-9.xml", doc.root_element())
            .unwrap()
            .unwrap();
        assert_eq!(entity.id, "_r-9");
        assert_eq!(entity.name, "Weekly");
        assert_eq!(entity.description, "Weekly totals");
        assert_eq!(entity.object_type, ObjectType::Unknown);
        let generic = entity.as_generic().unwrap();
        assert_eq!(
            generic.properties.get("report/chartType").map(String::as_str),
            Some("bar")
        );
        assert_eq!(generic.references[0].id, "_rt-1");
    }

    #[test]
    fn document_without_identifier_is_rejected() {
        let doc = roxmltree::Document::parse("<thing><name>x</name></thing>").unwrap();
        let err = extract_generic("misc/x.xml", doc.root_element()).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Entry(EntryError::MissingField { field: "identifier" })
        ));
    }

    #[test]
    fn direct_child_identifier_wins_over_nested_ones() {
        let doc = roxmltree::Document::parse(
            r#"<reportHaul><layout><cell uuid="_cell-1" name="Cell"/></layout>
                 <report uuid="_r-1" name="Weekly"/></reportHaul>"#,
        )
        .unwrap();
        let root = doc.root_element();
        let entity = extract_generic("report/r.xml", root).unwrap().unwrap();
        assert_eq!(entity.id, "_r-1");
        assert_eq!(nested_object_tag(root), None);
    }

    #[test]
    fn nested_identifier_is_reported() {
        let doc = roxmltree::Document::parse(
            r#"<processModelHaul><pm><nodes><node uuid="n-start" name="Start"/></nodes></pm></processModelHaul>"#,
        )
        .unwrap();
        let root = doc.root_element();
        let entity = extract_generic("processModel/p.xml", root).unwrap().unwrap();
        assert_eq!(entity.id, "n-start");
        assert_eq!(nested_object_tag(root), Some("node"));
    }
}
