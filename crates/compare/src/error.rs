use std::path::PathBuf;

/// Errors loading or validating an [`ImpactPolicy`](crate::ImpactPolicy).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse impact policy: {0}")]
    Parse(#[from] toml::de::Error),

    /// A tier's ratio is outside `[0, 1]` or not a number.
    #[error("tier '{tier}' has modified ratio {value}, expected a value in [0, 1]")]
    InvalidRatio { tier: &'static str, value: f64 },

    /// A higher tier asks for less than the tier below it.
    #[error("tier '{upper}' requires fewer {field} than tier '{lower}'")]
    NonMonotonic {
        field: &'static str,
        lower: &'static str,
        upper: &'static str,
    },
}
