//! Error taxonomy shared by every subsystem.
//!
//! Unknown ids are not errors: lookups return `Ok(None)` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnimaError {
    /// Malformed id or out-of-range parameter. Raised before any state is touched.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// The language-model evaluator failed or timed out.
    #[error("evaluator unavailable: {0}")]
    EvaluatorUnavailable(String),

    /// The embedding provider failed; callers skip the semantic contribution.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Persistence failure. Not retried here; the caller decides.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AnimaError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// True for failures that have a deterministic fallback path.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::EvaluatorUnavailable(_) | Self::EmbeddingUnavailable(_)
        )
    }
}

pub type AnimaResult<T> = Result<T, AnimaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AnimaError::invalid("bad id").to_string(),
            "invalid input: bad id"
        );
        assert_eq!(
            AnimaError::storage("disk full").to_string(),
            "storage error: disk full"
        );
    }

    #[test]
    fn test_degradable_classification() {
        assert!(AnimaError::EvaluatorUnavailable("timeout".into()).is_degradable());
        assert!(AnimaError::EmbeddingUnavailable("offline".into()).is_degradable());
        assert!(!AnimaError::storage("x").is_degradable());
        assert!(!AnimaError::invalid("x").is_degradable());
    }
}
