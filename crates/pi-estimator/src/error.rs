//! Error types for estimator construction, training and persistence.

use thiserror::Error;

use crate::persist::{DeserializeError, SerializeError};

/// Convenience alias used throughout the crate.
pub type Result<T, E = EstimatorError> = std::result::Result<T, E>;

/// Errors surfaced by the estimator and its collaborators.
///
/// Collaborator errors (regressors, scalers, codec) are propagated unmodified;
/// nothing in the crate retries or recovers.
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// Hyperparameter name not recognized by the model.
    #[error("{model}: unknown parameter `{name}`")]
    UnknownParam { model: &'static str, name: String },

    /// Hyperparameter recognized but its value is rejected.
    #[error("{model}: invalid value for `{name}`: {reason}")]
    InvalidParam {
        model: &'static str,
        name: String,
        reason: String,
    },

    /// Estimator-level configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input dimensions disagree with each other or with fit-time shapes.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Training data has no samples.
    #[error("cannot fit on an empty dataset")]
    EmptyInput,

    /// Fitted state accessed before `fit` or a successful restore.
    #[error("model is not fitted: `{attribute}` is unavailable")]
    NotFitted { attribute: &'static str },

    /// The configured model does not expose the requested attribute.
    #[error("`{model}` has no attribute `{attribute}`")]
    MissingAttribute {
        attribute: &'static str,
        model: &'static str,
    },

    /// Least squares solve failed on non-finite features.
    #[error("least squares solve failed: features must be finite")]
    SingularMatrix,

    /// Filesystem failure while saving or restoring.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact encoding failed.
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// Artifact decoding failed.
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
}

impl EstimatorError {
    pub(crate) fn invalid_param(
        model: &'static str,
        name: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            model,
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_param(model: &'static str, name: &str) -> Self {
        Self::UnknownParam {
            model,
            name: name.to_string(),
        }
    }

    /// Returns true for the unfit-state condition.
    pub fn is_not_fitted(&self) -> bool {
        matches!(self, Self::NotFitted { .. })
    }
}

/// Check that two dimensions agree.
#[inline]
pub(crate) fn ensure_dim(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(EstimatorError::ShapeMismatch {
            context,
            expected,
            actual,
        })
    }
}
