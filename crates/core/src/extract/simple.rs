//! Single-object hauls whose payload is a flat object element: groups,
//! connected systems, data stores, web APIs and translation sets. Content
//! objects (interfaces, rules, constants) reuse [`extract_object`].

use super::{collect_references, header, is_reference_name, shape_mismatch, Extraction};
use crate::code::{extract_code, CodeBody};
use crate::error::EntryError;
use crate::model::{Entity, EntityBody, GenericObject, ObjectType};
use crate::xml;
use roxmltree::Node;
use std::collections::BTreeMap;

/// Child elements that hold the object's primary expression body.
const CODE_FIELDS: &[&str] = &["definition", "expression"];

/// Top-level segments excluded from the property bag because they are
/// captured elsewhere (header fields and code).
const HEADER_SEGMENTS: &[&str] = &[
    "@name",
    "@uuid",
    "@id",
    "uuid",
    "name",
    "description",
    "desc",
    "definition",
    "expression",
];

/// Build a generic entity from an object element.
pub(crate) fn extract_object(
    object: Node<'_, '_>,
    object_type: ObjectType,
) -> Result<Entity, EntryError> {
    let h = header(object)?;

    let code: Option<CodeBody> = CODE_FIELDS
        .iter()
        .filter_map(|f| xml::child(object, f))
        .find_map(extract_code);

    let properties = object_properties(object);
    let references = collect_references(
        object,
        &h.id,
        code.as_ref().map(|c| c.raw.as_str()),
    );

    Ok(Entity::new(
        h.id,
        h.name,
        object_type,
        EntityBody::Generic(GenericObject {
            properties,
            code,
            references,
        }),
    )
    .with_description(h.description))
}

fn object_properties(object: Node<'_, '_>) -> BTreeMap<String, String> {
    xml::flatten(object)
        .into_iter()
        .filter(|(path, _)| {
            let first = path.split('/').next().unwrap_or("");
            let first = first.split('[').next().unwrap_or(first);
            let last = path.rsplit(['/', '@']).next().unwrap_or("");
            let last = last.split('[').next().unwrap_or(last);
            !HEADER_SEGMENTS.contains(&first) && !is_reference_name(last)
        })
        .collect()
}

/// Extract the object element named `tag` directly under the haul root.
fn extract_haul_object(root: Node<'_, '_>, tag: &'static str, object_type: ObjectType) -> Extraction {
    let object = xml::child(root, tag).ok_or_else(|| shape_mismatch(root, tag))?;
    Ok(Some(extract_object(object, object_type)?))
}

pub fn extract_group(_path: &str, root: Node<'_, '_>) -> Extraction {
    extract_haul_object(root, "group", ObjectType::Group)
}

pub fn extract_connected_system(_path: &str, root: Node<'_, '_>) -> Extraction {
    extract_haul_object(root, "connectedSystem", ObjectType::ConnectedSystem)
}

pub fn extract_data_store(_path: &str, root: Node<'_, '_>) -> Extraction {
    extract_haul_object(root, "dataStore", ObjectType::DataStore)
}

pub fn extract_web_api(_path: &str, root: Node<'_, '_>) -> Extraction {
    extract_haul_object(root, "webApi", ObjectType::WebApi)
}

pub fn extract_translation_set(_path: &str, root: Node<'_, '_>) -> Extraction {
    extract_haul_object(root, "translationSet", ObjectType::TranslationSet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;

    fn parse(xml: &str) -> roxmltree::Document<'_> {
        roxmltree::Document::parse(xml).unwrap()
    }

    #[test]
    fn group_with_parent_and_members() {
        let doc = parse(
            r#"<groupHaul><group><uuid>_g-1</uuid><name>Approvers</name>
                <description>Can approve orders</description>
                <parentGroupUuid>_g-0</parentGroupUuid>
                <members><memberGroupUuid>_g-2</memberGroupUuid><memberGroupUuid>_g-3</memberGroupUuid></members>
                <groupTypeName>Custom</groupTypeName>
               </group></groupHaul>"#,
        );
        let entity = extract_group("group/_g-1.xml", doc.root_element())
            .unwrap()
            .unwrap();
        assert_eq!(entity.id, "_g-1");
        assert_eq!(entity.name, "Approvers");
        assert_eq!(entity.description, "Can approve orders");
        assert_eq!(entity.object_type, ObjectType::Group);

        let generic = entity.as_generic().unwrap();
        let refs: Vec<&str> = generic.references.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(refs, vec!["_g-0", "_g-2", "_g-3"]);
        assert_eq!(
            generic.properties.get("groupTypeName").map(String::as_str),
            Some("Custom")
        );
        assert!(!generic.properties.contains_key("parentGroupUuid"));
    }

    #[test]
    fn web_api_keeps_expression_code() {
        let doc = parse(
            r#"<webApiHaul><webApi uuid="_w-1" name="Orders API">
                <expression>a!httpResponse(body: rule!getOrders(#"_r-1"))</expression>
                <urlAlias>orders</urlAlias><httpMethod>GET</httpMethod>
               </webApi></webApiHaul>"#,
        );
        let entity = extract_web_api("webApi/w.xml", doc.root_element())
            .unwrap()
            .unwrap();
        let generic = entity.as_generic().unwrap();
        assert!(generic.code.as_ref().unwrap().raw.starts_with("a!httpResponse"));
        assert_eq!(generic.references[0].id, "_r-1");
        assert_eq!(generic.properties.get("httpMethod").map(String::as_str), Some("GET"));
        assert!(!generic.properties.contains_key("expression"));
    }

    #[test]
    fn missing_object_element_is_a_shape_mismatch() {
        let doc = parse("<connectedSystemHaul><versionUuid>v</versionUuid></connectedSystemHaul>");
        let err = extract_connected_system("connectedSystem/x.xml", doc.root_element()).unwrap_err();
        assert!(matches!(err, ExtractError::ShapeMismatch { expected: "connectedSystem", .. }));
    }

    #[test]
    fn missing_name_is_an_entry_error() {
        let doc = parse(r#"<dataStoreHaul><dataStore uuid="_d-1"/></dataStoreHaul>"#);
        let err = extract_data_store("dataStore/x.xml", doc.root_element()).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Entry(EntryError::MissingField { field: "name" })
        ));
    }
}
