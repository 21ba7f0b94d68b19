//! Error types for differential expression runs.
//!
//! Two families are kept apart: a [`TestFailure`] is attached to a single
//! feature and never stops the run, a [`ConfigError`] means the caller asked for something that
//! cannot be evaluated and aborts the pipeline (or contrast) it belongs to.

use serde::Serialize;
use thiserror::Error;

/// Why a single feature could not be tested.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum TestFailure {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("undefined statistic: {0}")]
    UndefinedStatistic(String),
}

impl TestFailure {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        TestFailure::InsufficientData(reason.into())
    }

    pub fn undefined(reason: impl Into<String>) -> Self {
        TestFailure::UndefinedStatistic(reason.into())
    }

    /// Short machine-readable status code used in exported tables.
    pub fn code(&self) -> &'static str {
        match self {
            TestFailure::InsufficientData(_) => "insufficient_data",
            TestFailure::UndefinedStatistic(_) => "undefined_statistic",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            TestFailure::InsufficientData(reason) | TestFailure::UndefinedStatistic(reason) => {
                reason
            }
        }
    }
}

/// Caller configuration that is inconsistent with the data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample '{sample}' has no group assignment")]
    UnassignedSample { sample: String },

    #[error("sample '{sample}' is assigned to both '{first}' and '{second}'")]
    ConflictingAssignment {
        sample: String,
        first: String,
        second: String,
    },

    #[error("contrast '{contrast}' references unknown group '{group}'")]
    UnknownGroup { contrast: String, group: String },

    #[error("contrast '{contrast}' coefficients sum to {sum}, expected 0")]
    NonZeroSum { contrast: String, sum: f64 },

    #[error("contrast '{contrast}' is not pairwise; {method} needs exactly one +1 and one -1 coefficient")]
    NotPairwise { contrast: String, method: String },

    #[error("invalid contrast specification '{spec}': {reason}")]
    InvalidContrast { spec: String, reason: String },

    #[error("{method} is an omnibus test and cannot evaluate contrast '{contrast}'")]
    UnsupportedMethod { method: String, contrast: String },

    #[error("invalid threshold: {reason}")]
    InvalidThreshold { reason: String },
}
