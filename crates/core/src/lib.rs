//! haulmerge-core: application export extraction.
//!
//! Turns one exported application archive into an [`ObjectGraph`]:
//! typed entities keyed by identifier, cross-references resolved to names,
//! and a flow graph for every process model.
//!
//! # Pipeline
//!
//! [`load_version()`] runs the passes in order:
//!
//! 1. [`pass1_archive`] reads XML entries from a zip file or directory.
//! 2. [`pass2_extract`] dispatches each entry through [`dispatch::SCHEMA_TABLE`]
//!    and extracts zero or one [`Entity`].
//! 3. [`pass3_lookup`] builds the [`ObjectLookup`].
//! 4. [`pass4_resolve`] back-fills reference names from the lookup.
//! 5. [`pass5_flow`] infers node kinds and builds process flow graphs.
//!
//! Per-entry problems never abort a load; they are returned as
//! [`Diagnostic`]s alongside the graph.

pub mod code;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod graph;
pub mod load;
pub mod model;
pub mod pass1_archive;
pub mod pass2_extract;
pub mod pass3_lookup;
pub mod pass4_resolve;
pub mod pass5_flow;
pub mod xml;

// ── Convenience re-exports: key types ────────────────────────────────

pub use code::CodeBody;
pub use error::{ArchiveError, Diagnostic, DiagnosticKind, EntryError};
pub use graph::ObjectGraph;
pub use model::{
    Entity, EntityBody, Flow, FlowGraph, GenericObject, Node, NodeKind, ObjectType,
    ProcessModel, RecordType, Reference, Site, Variable,
};
pub use pass3_lookup::{ObjectLookup, ObjectLookupEntry};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use load::{load_entries, load_version, LoadOptions, LoadSummary, LoadedVersion};
pub use pass1_archive::{ArchiveEntry, ArchiveSource};
