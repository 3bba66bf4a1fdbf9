//! Load one version: run the passes in order and assemble the object graph.
//!
//! This is a thin orchestrator. Pass 2 and Pass 5 are per-item and run on
//! rayon when [`LoadOptions::parallel`] is set; Pass 3 and Pass 4 run
//! sequentially between them.

use crate::error::{ArchiveError, Diagnostic};
use crate::graph::ObjectGraph;
use crate::model::Entity;
use crate::pass1_archive::{self, ArchiveEntry, ArchiveSource};
use crate::pass2_extract::{self, EntryOutcome};
use crate::pass3_lookup;
use crate::pass4_resolve;
use crate::pass5_flow;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

/// Default per-entry size cap: 32 MiB.
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Extract entries and build flow graphs on the rayon pool.
    pub parallel: bool,
    /// Entries larger than this are skipped with a diagnostic.
    pub max_entry_bytes: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            parallel: true,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// XML entries read from the archive.
    pub entries_read: usize,
    pub entities: usize,
    /// Entries that produced no entity because of an error.
    pub skipped: usize,
    /// References that resolved to a placeholder.
    pub unresolved_references: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedVersion {
    pub graph: ObjectGraph,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: LoadSummary,
}

/// Read an archive and build its object graph.
pub fn load_version(
    version: &str,
    source: &ArchiveSource,
    options: &LoadOptions,
) -> Result<LoadedVersion, ArchiveError> {
    let read = pass1_archive::read_archive(source, options)?;
    let read_failures = read.diagnostics.len();
    let mut loaded = load_entries(version, read.entries, options);

    loaded.summary.skipped += read_failures;
    let mut diagnostics = read.diagnostics;
    diagnostics.append(&mut loaded.diagnostics);
    loaded.diagnostics = diagnostics;
    Ok(loaded)
}

/// Build an object graph from entries already in memory.
pub fn load_entries(version: &str, entries: Vec<ArchiveEntry>, options: &LoadOptions) -> LoadedVersion {
    let entries_read = entries.len();

    // Pass 2
    let outcomes: Vec<EntryOutcome> = if options.parallel {
        entries.par_iter().map(pass2_extract::extract_entry).collect()
    } else {
        entries.iter().map(pass2_extract::extract_entry).collect()
    };

    let mut diagnostics = Vec::new();
    let mut entities: Vec<Entity> = Vec::with_capacity(outcomes.len());
    let mut skipped = 0;
    for outcome in outcomes {
        let failed = outcome
            .diagnostics
            .iter()
            .any(|d| d.kind.is_entry_failure());
        if outcome.entity.is_none() && failed {
            skipped += 1;
        }
        diagnostics.extend(outcome.diagnostics);
        entities.extend(outcome.entity);
    }

    // Pass 3
    let (lookup, duplicates) = pass3_lookup::build_lookup(&entities);
    diagnostics.extend(duplicates);

    // Pass 4
    let stats = pass4_resolve::resolve_references(&mut entities, &lookup);

    // Pass 5
    let flow_diagnostics: Vec<Vec<Diagnostic>> = if options.parallel {
        entities.par_iter_mut().map(pass5_flow::apply_flow_graph).collect()
    } else {
        entities.iter_mut().map(pass5_flow::apply_flow_graph).collect()
    };
    diagnostics.extend(flow_diagnostics.into_iter().flatten());

    let graph = ObjectGraph::new(version, entities, lookup);
    let summary = LoadSummary {
        entries_read,
        entities: graph.len(),
        skipped,
        unresolved_references: stats.unresolved,
    };
    info!(
        version,
        entities = summary.entities,
        skipped = summary.skipped,
        unresolved = summary.unresolved_references,
        diagnostics = diagnostics.len(),
        "loaded version"
    );

    LoadedVersion {
        graph,
        diagnostics,
        summary,
    }
}
