//! Schema dispatch table: `(archive directory, root element) -> strategy`.
//!
//! Supporting a new export schema means adding one [`SchemaRule`] to
//! [`SCHEMA_TABLE`]. Anything the table does not match goes to the generic
//! strategy, which keeps the document's raw structure.

use crate::extract::{content, generic, process_model, record_type, simple, site, Extraction};
use std::fmt;

/// An extraction strategy: pure function of the entry path and root element.
pub type ExtractFn = fn(&str, roxmltree::Node<'_, '_>) -> Extraction;

pub struct SchemaRule {
    pub name: &'static str,
    /// Archive directory the entry must live under (any path component).
    pub directory: &'static str,
    /// Local name of the document's root element.
    pub root: &'static str,
    pub extract: ExtractFn,
}

impl SchemaRule {
    pub fn is_generic(&self) -> bool {
        std::ptr::eq(self, &GENERIC_RULE)
    }

    fn matches(&self, path: &str, root_tag: &str) -> bool {
        self.root == root_tag && directories(path).any(|d| d == self.directory)
    }
}

impl fmt::Debug for SchemaRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRule")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("root", &self.root)
            .finish()
    }
}

pub const SCHEMA_TABLE: &[SchemaRule] = &[
    SchemaRule {
        name: "content",
        directory: "content",
        root: "contentHaul",
        extract: content::extract_content,
    },
    SchemaRule {
        name: "process-model",
        directory: "processModel",
        root: "processModelHaul",
        extract: process_model::extract_process_model,
    },
    SchemaRule {
        name: "record-type",
        directory: "recordType",
        root: "recordTypeHaul",
        extract: record_type::extract_record_type,
    },
    SchemaRule {
        name: "site",
        directory: "site",
        root: "siteHaul",
        extract: site::extract_site,
    },
    SchemaRule {
        name: "group",
        directory: "group",
        root: "groupHaul",
        extract: simple::extract_group,
    },
    SchemaRule {
        name: "connected-system",
        directory: "connectedSystem",
        root: "connectedSystemHaul",
        extract: simple::extract_connected_system,
    },
    SchemaRule {
        name: "data-store",
        directory: "dataStore",
        root: "dataStoreHaul",
        extract: simple::extract_data_store,
    },
    SchemaRule {
        name: "web-api",
        directory: "webApi",
        root: "webApiHaul",
        extract: simple::extract_web_api,
    },
    SchemaRule {
        name: "translation-set",
        directory: "translationSet",
        root: "translationSetHaul",
        extract: simple::extract_translation_set,
    },
];

pub static GENERIC_RULE: SchemaRule = SchemaRule {
    name: "generic",
    directory: "",
    root: "",
    extract: generic::extract_generic,
};

/// Select the strategy for an archive entry.
pub fn dispatch(path: &str, root_tag: &str) -> &'static SchemaRule {
    SCHEMA_TABLE
        .iter()
        .find(|rule| rule.matches(path, root_tag))
        .unwrap_or(&GENERIC_RULE)
}

/// Directory components of an archive path (the file name is excluded).
fn directories(path: &str) -> impl Iterator<Item = &str> {
    let mut parts: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|p| !p.is_empty())
        .collect();
    parts.pop();
    parts.into_iter()
}
