//! Error type shared by every stage of the neighbor/interaction pipeline.
//!
//! All errors are raised at the call that detects them. Inputs are
//! deterministic, so nothing here is retried and no stage returns partial
//! results.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while building structures, counting neighbors or
/// assembling interaction models.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed structure parameters or subspecies assignment rule.
    #[error("invalid structure configuration: {0}")]
    Configuration(String),

    /// A structure file could not be read or parsed.
    #[error("failed to read structure file {}: {reason}", path.display())]
    InputFormat {
        /// File that was being read.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    #[error("cutoff distance must be positive and finite, got {0}")]
    InvalidCutoff(f64),

    #[error("distance tolerance must be non-negative, got {0}")]
    InvalidTolerance(f64),

    /// A sign pattern refers to a subspecies label or pair that the neighbor
    /// data does not contain.
    #[error("sign pattern '{pattern}' is unknown to the neighbor data: {detail}")]
    UnknownPattern {
        /// Name of the offending pattern.
        pattern: String,
        /// Which label or pair was not found.
        detail: String,
    },

    /// A per-site spin pattern does not cover the structure's sites.
    #[error("sign pattern '{pattern}' assigns {given} spins to a structure with {expected} sites")]
    PatternSiteMismatch {
        pattern: String,
        given: usize,
        expected: usize,
    },

    /// Aggregation produced no interaction parameters.
    #[error("interaction model has no parameters: {0}")]
    EmptyModel(String),

    /// The analysis config file is not valid JSON for [`AnalysisConfig`](crate::config::AnalysisConfig).
    #[error("failed to parse analysis config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn input_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InputFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
