//! Extraction strategies, one per export schema.
//!
//! Each strategy is a plain function `(path, root element) -> Extraction`
//! registered in [`crate::dispatch::SCHEMA_TABLE`]. A strategy returns:
//! - `Ok(Some(entity))` for a recognized object,
//! - `Ok(None)` for a recognized placeholder (folders and the like),
//! - `Err(ShapeMismatch)` when the root matched but expected children are
//!   missing, which sends the entry through the generic fallback,
//! - `Err(Entry(..))` when mandatory fields are absent.

pub mod content;
pub mod generic;
pub mod process_model;
pub mod record_type;
pub mod simple;
pub mod site;

use crate::code::referenced_identifiers;
use crate::error::EntryError;
use crate::model::{Entity, Reference};
use crate::xml;
use roxmltree::Node;
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("<{root}> is missing expected <{expected}>")]
    ShapeMismatch { root: String, expected: &'static str },

    #[error(transparent)]
    Entry(#[from] EntryError),
}

pub type Extraction = Result<Option<Entity>, ExtractError>;

pub(crate) fn shape_mismatch(root: Node<'_, '_>, expected: &'static str) -> ExtractError {
    ExtractError::ShapeMismatch {
        root: xml::local_name(root).to_string(),
        expected,
    }
}

/// Identifier, name and description of an object element.
pub(crate) struct Header {
    pub id: String,
    pub name: String,
    pub description: String,
}

pub(crate) fn header(object: Node<'_, '_>) -> Result<Header, EntryError> {
    let id = xml::identifier(object).ok_or(EntryError::MissingField { field: "identifier" })?;
    let name = xml::object_name(object).ok_or(EntryError::MissingField { field: "name" })?;
    let description = xml::child(object, "description")
        .or_else(|| xml::child(object, "desc"))
        .and_then(xml::localized_text)
        .or_else(|| xml::attr(object, "description").map(str::to_string))
        .unwrap_or_default();
    Ok(Header {
        id,
        name,
        description,
    })
}

/// True for attribute/element names that carry another object's identifier
/// (`connectedSystemUuid`, `parentGroupUuid`, ...). The object's own `uuid`
/// is not a reference.
pub(crate) fn is_reference_name(name: &str) -> bool {
    name.len() > 4 && name.ends_with("Uuid")
}

/// Collect `*Uuid` references declared anywhere under `node`, followed by
/// `#"<id>"` literals in the given code bodies. Duplicates and `own_id` are
/// dropped; first occurrence order is kept.
pub(crate) fn collect_references<'c>(
    node: Node<'_, '_>,
    own_id: &str,
    code: impl IntoIterator<Item = &'c str>,
) -> Vec<Reference> {
    let mut seen = BTreeSet::new();
    let mut refs = Vec::new();
    let mut push = |id: String| {
        if id != own_id && seen.insert(id.clone()) {
            refs.push(Reference::new(id));
        }
    };

    for d in node.descendants().filter(|d| d.is_element()) {
        for a in d.attributes() {
            if is_reference_name(a.name()) && !a.value().trim().is_empty() {
                push(a.value().trim().to_string());
            }
        }
        if is_reference_name(xml::local_name(d)) {
            if let Some(t) = xml::text(d) {
                push(t);
            }
        }
    }
    for body in code {
        for id in referenced_identifiers(body) {
            push(id);
        }
    }
    refs
}
