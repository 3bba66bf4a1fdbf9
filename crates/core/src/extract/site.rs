//! `siteHaul` documents: a site and its ordered pages.

use super::{header, shape_mismatch, Extraction};
use crate::model::{Entity, EntityBody, ObjectType, Reference, Site, SitePage};
use crate::xml;
use roxmltree::Node;

pub fn extract_site(_path: &str, root: Node<'_, '_>) -> Extraction {
    let object = xml::child(root, "site").ok_or_else(|| shape_mismatch(root, "site"))?;
    let h = header(object)?;

    let container = xml::child(object, "pages").unwrap_or(object);
    let pages = xml::children(container, "page")
        .map(|page| SitePage {
            name: xml::object_name(page).unwrap_or_default(),
            target: page_target(page).map_or_else(Reference::unset, Reference::new),
        })
        .collect();

    Ok(Some(
        Entity::new(h.id, h.name, ObjectType::Site, EntityBody::Site(Site { pages }))
            .with_description(h.description),
    ))
}

fn page_target(page: Node<'_, '_>) -> Option<String> {
    xml::attr_or_child(page, "uiObjectUuid")
        .or_else(|| xml::child(page, "uiObject").and_then(xml::identifier))
        .or_else(|| xml::attr_or_child(page, "targetUuid"))
}
