//! Estimator configuration with builder pattern.
//!
//! [`EstimatorConfig`] gathers the model choices, hyperparameters, scaler
//! chain, target transform and persistence options. It uses the `bon` crate
//! for builder generation with validation at build time.
//!
//! Every default is constructed fresh for each config, so two estimators never
//! share a model instance or parameter list.
//!
//! # Example
//!
//! ```
//! use pi_estimator::{EstimatorConfig, Params, TargetTransform};
//!
//! // All defaults: linear base model, 300-tree forest on the residuals
//! let config = EstimatorConfig::builder().build().unwrap();
//!
//! // Ek only in log space, smaller forest, persist after every fit
//! let config = EstimatorConfig::builder()
//!     .log_flags(TargetTransform::from_pairs([("y0", false), ("y1", true)]))
//!     .residual_params(Params::new().with("n_estimators", 50).with("random_state", 1))
//!     .save(true)
//!     .save_path("models")
//!     .build()
//!     .unwrap();
//! ```

use std::path::PathBuf;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, Result};
use crate::model::Regressor;
use crate::params::Params;
use crate::preprocessing::{default_scaler_chain, Scaler};
use crate::transform::TargetTransform;

/// Default directory for saved and restored artifacts (relative to the working directory).
pub const DEFAULT_MODEL_DIR: &str = "Model";

/// Default artifact base name.
pub const DEFAULT_MODEL_NAME: &str = "PI_Estimator_PBmax_Ek";

/// Default base model parameters: `fit_intercept = true`.
pub fn default_base_params() -> Params {
    Params::new().with("fit_intercept", true)
}

/// Default residual model parameters: 300 trees, out-of-bag scoring, seed 0.
pub fn default_residual_params() -> Params {
    Params::new()
        .with("n_estimators", 300)
        .with("oob_score", true)
        .with("random_state", 0)
}

// =============================================================================
// EstimatorConfig
// =============================================================================

/// Configuration for [`PiEstimator`](crate::PiEstimator).
///
/// # Structure
///
/// - **Models**: `base_model` (stage 1) and `residual_model` (stage 2), with
///   parameters applied through `set_params` when the estimator is built
/// - **Preprocessing**: `scalers` run in order ahead of the base model
/// - **Targets**: `log_flags`, one entry per target column
/// - **Persistence**: `restore`/`restore_path`, `save`/`save_path`, `model_name`
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct EstimatorConfig {
    // === Models ===
    /// Stage-1 regressor. Default: linear regression.
    #[builder(default = Regressor::linear())]
    pub base_model: Regressor,

    /// Stage-2 regressor fit on stage-1 residuals. Default: random forest.
    #[builder(default = Regressor::random_forest())]
    pub residual_model: Regressor,

    /// Hyperparameters for the base model.
    #[builder(default = default_base_params())]
    pub base_params: Params,

    /// Hyperparameters for the residual model.
    #[builder(default = default_residual_params())]
    pub residual_params: Params,

    // === Targets ===
    /// Per-column log10 flags. Default: `[(y0, true), (y1, true)]`.
    #[builder(default)]
    pub log_flags: TargetTransform,

    // === Preprocessing ===
    /// Scalers applied before the base model. Default: robust then standard.
    #[builder(default = default_scaler_chain())]
    pub scalers: Vec<(String, Scaler)>,

    // === Persistence ===
    /// Load `restore_path/model_name` when the estimator is constructed.
    #[builder(default)]
    pub restore: bool,

    #[builder(into, default = PathBuf::from(DEFAULT_MODEL_DIR))]
    pub restore_path: PathBuf,

    /// Write a timestamped artifact after every `fit`.
    #[builder(default)]
    pub save: bool,

    #[builder(into, default = PathBuf::from(DEFAULT_MODEL_DIR))]
    pub save_path: PathBuf,

    /// Base name for artifacts.
    #[builder(into, default = DEFAULT_MODEL_NAME.to_string())]
    pub model_name: String,

    /// zstd level (1-22) for saved artifacts. Default: 3.
    #[builder(default = 3)]
    pub compression_level: i32,
}

/// Custom finishing function that validates the config.
impl<S: estimator_config_builder::IsComplete> EstimatorConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EstimatorError::InvalidConfig`] if:
    /// - `log_flags` is empty
    /// - `model_name` is empty
    /// - `compression_level` is outside 1-22
    pub fn build(self) -> Result<EstimatorConfig> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

impl EstimatorConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.log_flags.n_targets() == 0 {
            return Err(EstimatorError::InvalidConfig(
                "log_flags must describe at least one target column".into(),
            ));
        }
        if self.model_name.trim().is_empty() {
            return Err(EstimatorError::InvalidConfig("model_name must not be empty".into()));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(EstimatorError::InvalidConfig(format!(
                "compression_level must be in 1..=22, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn defaults_match_reference_setup() {
        let config = EstimatorConfig::default();
        assert!(matches!(config.base_model, Regressor::Linear(_)));
        assert!(matches!(config.residual_model, Regressor::Forest(_)));
        assert_eq!(config.base_params.get("fit_intercept"), Some(ParamValue::Bool(true)));
        assert_eq!(config.residual_params.get("n_estimators"), Some(ParamValue::Int(300)));
        assert_eq!(config.log_flags.n_targets(), 2);
        assert_eq!(config.scalers.len(), 2);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.save_path, PathBuf::from("Model"));
        assert!(!config.restore && !config.save);
    }

    #[test]
    fn defaults_are_fresh_per_config() {
        let mut a = EstimatorConfig::default();
        let b = EstimatorConfig::default();
        a.residual_params.insert("n_estimators", 5);
        a.scalers.clear();
        assert_eq!(b.residual_params.get("n_estimators"), Some(ParamValue::Int(300)));
        assert_eq!(b.scalers.len(), 2);
    }

    #[test]
    fn builder_validates() {
        let err = EstimatorConfig::builder()
            .log_flags(TargetTransform::new(Vec::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidConfig(_)));

        assert!(EstimatorConfig::builder().model_name("").build().is_err());
        assert!(EstimatorConfig::builder().compression_level(0).build().is_err());
        assert!(EstimatorConfig::builder().model_name("custom").build().is_ok());
    }
}
