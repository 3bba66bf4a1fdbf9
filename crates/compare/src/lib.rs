//! haulmerge-compare: version comparison and three-way merge classification.
//!
//! Works on [`ObjectGraph`](haulmerge_core::ObjectGraph)s produced by
//! `haulmerge-core` and never mutates them.
//!
//! - [`compare_versions`] diffs two graphs into a [`ComparisonReport`] with
//!   an [`ImpactLevel`] chosen by a configurable [`ImpactPolicy`].
//! - [`classify_three_way`] classifies every object of a base, customer and
//!   vendor graph into a [`MergeOutcome`] with field-level evidence.

pub mod diff;
pub mod error;
pub mod fields;
pub mod impact;
pub mod merge;
pub mod report;

pub use diff::{
    compare_entity, compare_versions, entities_equal, ChangeKind, ChangeRecord, CodeDiff,
    FieldChange,
};
pub use error::ConfigError;
pub use fields::{comparable_fields, Fields};
pub use impact::{Combine, ImpactLevel, ImpactPolicy, Threshold};
pub use merge::{
    classify_entity, classify_three_way, outcome_from_facts, EqualityFacts, MergeClassification,
    MergeClassificationMap, MergeEvidence, MergeOutcome, MergeSummary,
};
pub use report::{CategoryBreakdown, ComparisonReport, ReportSummary};
