//! Error handling for cardguard.
//!
//! One error enum covers the whole engine. The taxonomy mirrors the failure
//! modes of the adaptive pipeline: registration, candidate validation,
//! conflict resolution, resource sampling, prediction, and batch dispatch.

use std::io;

use thiserror::Error;

/// Main error type for cardguard operations.
#[derive(Error, Debug)]
pub enum CgError {
    #[error("Duplicate skill name: {0}")]
    DuplicateSkillName(String),

    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    #[error("Invalid skill: {0}")]
    InvalidSkill(String),

    #[error("Skill validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unresolvable conflict: {0}")]
    UnresolvableConflict(String),

    #[error("Resource query failed: {0}")]
    ResourceQueryFailed(String),

    #[error("Prediction unavailable: {0}")]
    PredictionUnavailable(String),

    #[error("Strategy execution failed: {0}")]
    StrategyExecutionFailed(String),

    #[error("Batch cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Analyzer request failed: {0}")]
    Analyzer(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CgError {
    /// Whether the engine absorbs this error with graceful degradation
    /// instead of surfacing it to the caller.
    #[must_use]
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::ResourceQueryFailed(_) | Self::PredictionUnavailable(_)
        )
    }
}

/// Result type alias using CgError.
pub type Result<T> = std::result::Result<T, CgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradable_classification() {
        assert!(CgError::ResourceQueryFailed("probe".into()).is_degradable());
        assert!(CgError::PredictionUnavailable("cold".into()).is_degradable());
        assert!(!CgError::DuplicateSkillName("base".into()).is_degradable());
        assert!(!CgError::StrategyExecutionFailed("boom".into()).is_degradable());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = CgError::DuplicateSkillName("luhn_strict".into());
        assert!(err.to_string().contains("luhn_strict"));
    }
}
