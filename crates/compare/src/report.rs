//! Comparison report structures.

use crate::diff::{ChangeKind, ChangeRecord};
use crate::impact::ImpactLevel;
use haulmerge_core::ObjectType;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub from_version: String,
    pub to_version: String,
    /// Added + modified + removed.
    pub total_changes: usize,
    pub impact: ImpactLevel,
    /// Modified objects over the union of both versions.
    pub modified_ratio: f64,
}

/// Per-type change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdown {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl CategoryBreakdown {
    pub(crate) fn count(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Added => self.added += 1,
            ChangeKind::Modified => self.modified += 1,
            ChangeKind::Removed => self.removed += 1,
            ChangeKind::Unchanged => self.unchanged += 1,
        }
    }

    pub fn changes(&self) -> usize {
        self.added + self.modified + self.removed
    }
}

/// Result of comparing two versions.
///
/// `records` holds one entry per identifier in the union of both versions,
/// ordered by object type then identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub summary: ReportSummary,
    pub categories: BTreeMap<ObjectType, CategoryBreakdown>,
    pub records: Vec<ChangeRecord>,
}

impl ComparisonReport {
    /// Records other than `Unchanged`.
    pub fn changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records
            .iter()
            .filter(|r| r.kind != ChangeKind::Unchanged)
    }

    pub fn record(&self, object_id: &str) -> Option<&ChangeRecord> {
        self.records.iter().find(|r| r.object_id == object_id)
    }

    pub fn is_empty(&self) -> bool {
        self.summary.total_changes == 0
    }

    /// Totals across all types.
    pub fn totals(&self) -> CategoryBreakdown {
        let mut totals = CategoryBreakdown::default();
        for c in self.categories.values() {
            totals.added += c.added;
            totals.modified += c.modified;
            totals.removed += c.removed;
            totals.unchanged += c.unchanged;
        }
        totals
    }

    pub fn to_json(&self) -> Value {
        json!({
            "summary": self.summary,
            "categories": self.categories,
            "records": self.records,
        })
    }
}
