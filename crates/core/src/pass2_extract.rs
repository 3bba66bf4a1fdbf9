//! Pass 2: turn one archive entry into zero or one [`Entity`].
//!
//! Parsing failures and missing mandatory fields skip the entry with a
//! diagnostic. A dedicated strategy that finds the wrong shape is recorded
//! as a mismatch and the entry is re-extracted generically.

use crate::dispatch::{dispatch, GENERIC_RULE};
use crate::error::{Diagnostic, DiagnosticKind, EntryError};
use crate::extract::{generic, ExtractError};
use crate::model::Entity;
use crate::pass1_archive::ArchiveEntry;
use crate::xml;
use tracing::{debug, warn};

/// Result of extracting a single entry.
#[derive(Debug, Default)]
pub struct EntryOutcome {
    pub entity: Option<Entity>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn extract_entry(entry: &ArchiveEntry) -> EntryOutcome {
    let mut outcome = EntryOutcome::default();

    let doc = match roxmltree::Document::parse(&entry.text) {
        Ok(doc) => doc,
        Err(e) => {
            skip(&mut outcome, &entry.path, EntryError::MalformedXml(e.to_string()));
            return outcome;
        }
    };
    let root = doc.root_element();
    let rule = dispatch(&entry.path, xml::local_name(root));
    debug!(path = %entry.path, rule = rule.name, "dispatch");

    if !rule.is_generic() && xml::element_children(root).next().is_none() {
        debug!(path = %entry.path, "empty placeholder document");
        return outcome;
    }

    let mut used_generic = rule.is_generic();
    let extracted = match (rule.extract)(&entry.path, root) {
        Err(ExtractError::ShapeMismatch { root: tag, expected }) => {
            let message = format!("<{}> matched rule '{}' but has no <{}>", tag, rule.name, expected);
            warn!(path = %entry.path, detail = %message, "falling back to generic extraction");
            outcome.diagnostics.push(Diagnostic::new(
                DiagnosticKind::StructuralShapeMismatch,
                &entry.path,
                message,
            ));
            used_generic = true;
            (GENERIC_RULE.extract)(&entry.path, root)
        }
        other => other,
    };

    match extracted {
        Ok(Some(entity)) => {
            if let Some(tag) = generic::nested_object_tag(root).filter(|_| used_generic) {
                let message = format!(
                    "no top-level object; identifier '{}' taken from nested <{}>",
                    entity.id, tag
                );
                warn!(path = %entry.path, detail = %message, "nested generic identifier");
                outcome.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::StructuralShapeMismatch, &entry.path, message)
                        .for_object(&entity.id),
                );
            }
            outcome.entity = Some(entity.with_source_path(&entry.path));
        }
        Ok(None) => debug!(path = %entry.path, "recognized placeholder"),
        Err(ExtractError::Entry(e)) => skip(&mut outcome, &entry.path, e),
        Err(ExtractError::ShapeMismatch { expected, .. }) => {
            // Only reachable if the generic strategy itself mismatches.
            skip(&mut outcome, &entry.path, EntryError::MissingField { field: expected })
        }
    }
    outcome
}

fn skip(outcome: &mut EntryOutcome, path: &str, error: EntryError) {
    warn!(path = %path, error = %error, "skipping entry");
    outcome.diagnostics.push(Diagnostic::from_entry_error(path, &error));
}
