//! Aggregate impact level of a comparison.
//!
//! The level depends only on the total change count and the proportion of
//! objects modified. Tier boundaries come from an [`ImpactPolicy`], which can
//! be loaded from TOML:
//!
//! ```toml
//! [medium]
//! min_changes = 10
//! min_modified_ratio = 0.25
//! combine = "any"
//!
//! [high]
//! min_changes = 50
//! min_modified_ratio = 0.5
//!
//! [very_high]
//! min_changes = 200
//! min_modified_ratio = 0.5
//! combine = "all"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImpactLevel::None => "NONE",
            ImpactLevel::Low => "LOW",
            ImpactLevel::Medium => "MEDIUM",
            ImpactLevel::High => "HIGH",
            ImpactLevel::VeryHigh => "VERY_HIGH",
        };
        f.write_str(s)
    }
}

/// How a tier's two conditions are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// Either condition suffices.
    #[default]
    Any,
    /// Both conditions must hold.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub min_changes: usize,
    pub min_modified_ratio: f64,
    #[serde(default)]
    pub combine: Combine,
}

impl Threshold {
    pub const fn new(min_changes: usize, min_modified_ratio: f64, combine: Combine) -> Self {
        Threshold {
            min_changes,
            min_modified_ratio,
            combine,
        }
    }

    fn is_met(&self, total_changes: usize, modified_ratio: f64) -> bool {
        let by_count = total_changes >= self.min_changes;
        let by_ratio = modified_ratio >= self.min_modified_ratio;
        match self.combine {
            Combine::Any => by_count || by_ratio,
            Combine::All => by_count && by_ratio,
        }
    }
}

/// Tier boundaries above `Low`. Zero changes is always `None`; any change
/// that meets no tier is `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactPolicy {
    pub medium: Threshold,
    pub high: Threshold,
    pub very_high: Threshold,
}

impl Default for ImpactPolicy {
    fn default() -> Self {
        ImpactPolicy {
            medium: Threshold::new(10, 0.25, Combine::Any),
            high: Threshold::new(50, 0.5, Combine::Any),
            very_high: Threshold::new(200, 0.5, Combine::All),
        }
    }
}

impl ImpactPolicy {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let policy: ImpactPolicy = toml::from_str(s)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject ratios outside `[0, 1]` and tiers that ask for less than the
    /// tier below them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tiers = [
            ("medium", &self.medium),
            ("high", &self.high),
            ("very_high", &self.very_high),
        ];
        for (tier, t) in tiers {
            if !(0.0..=1.0).contains(&t.min_modified_ratio) {
                return Err(ConfigError::InvalidRatio {
                    tier,
                    value: t.min_modified_ratio,
                });
            }
        }
        for pair in tiers.windows(2) {
            let (lower, lo) = pair[0];
            let (upper, hi) = pair[1];
            if hi.min_changes < lo.min_changes {
                return Err(ConfigError::NonMonotonic {
                    field: "changes",
                    lower,
                    upper,
                });
            }
            if hi.min_modified_ratio < lo.min_modified_ratio {
                return Err(ConfigError::NonMonotonic {
                    field: "modified ratio",
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }

    /// Highest tier whose threshold is met.
    pub fn level(&self, total_changes: usize, modified_ratio: f64) -> ImpactLevel {
        if total_changes == 0 {
            return ImpactLevel::None;
        }
        [
            (ImpactLevel::VeryHigh, &self.very_high),
            (ImpactLevel::High, &self.high),
            (ImpactLevel::Medium, &self.medium),
        ]
        .into_iter()
        .find(|(_, t)| t.is_met(total_changes, modified_ratio))
        .map(|(level, _)| level)
        .unwrap_or(ImpactLevel::Low)
    }
}
