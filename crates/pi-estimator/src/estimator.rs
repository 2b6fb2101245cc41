//! Two-stage residual estimator.
//!
//! Stage 1 fits a scaled base regressor on the (optionally log10-transformed)
//! targets. Stage 2 fits a residual regressor on what stage 1 left over.
//! Predictions add both stages and undo the log transform column by column.
//!
//! ```text
//! Y' = log10(Y) on flagged columns
//! stage1 = scalers → base_model          fit(X, Y')
//! R      = Y' − stage1(X)
//! stage2 = residual_model                fit(X, R)
//! Ŷ      = 10^(stage1(X) + stage2(X)) on flagged columns
//! ```

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::EstimatorConfig;
use crate::error::{ensure_dim, EstimatorError, Result};
use crate::metrics::r2_score;
use crate::model::RegressorFn;
use crate::persist::{artifact_file_name, read_artifact, write_artifact, ArtifactCodec};
use crate::pipeline::Pipeline;

// =============================================================================
// EstimatorState
// =============================================================================

/// Everything a saved artifact holds.
///
/// Restoring replaces the whole state, configuration included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorState {
    pub config: EstimatorConfig,
    pub stage1: Option<Pipeline>,
    pub stage2: Option<Pipeline>,
    /// Feature count seen at fit time, 0 before fit.
    pub n_features: usize,
}

impl EstimatorState {
    pub fn unfit(config: EstimatorConfig) -> Self {
        Self {
            config,
            stage1: None,
            stage2: None,
            n_features: 0,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.stage1.is_some() && self.stage2.is_some()
    }
}

// =============================================================================
// PiEstimator
// =============================================================================

/// Base regressor plus residual regressor over log-scaled targets.
///
/// # Example
///
/// ```
/// use pi_estimator::{EstimatorConfig, PiEstimator, Params};
/// use pi_estimator::testing::synthetic_positive_targets;
///
/// let (x, y, _) = synthetic_positive_targets(40, 3, 2, 0);
/// let config = EstimatorConfig::builder()
///     .residual_params(Params::new().with("n_estimators", 20).with("random_state", 0))
///     .build()
///     .unwrap();
///
/// let mut estimator = PiEstimator::new(config).unwrap();
/// estimator.fit(x.view(), y.view()).unwrap();
/// let predictions = estimator.predict(x.view()).unwrap();
/// assert_eq!(predictions.dim(), (40, 2));
/// ```
#[derive(Debug, Clone)]
pub struct PiEstimator {
    state: EstimatorState,
    last_artifact: Option<PathBuf>,
}

impl PiEstimator {
    /// Build an estimator from `config`.
    ///
    /// Applies `base_params` and `residual_params` to the configured models,
    /// then restores from disk when `config.restore` is set.
    ///
    /// # Errors
    ///
    /// - [`EstimatorError::InvalidConfig`] if the config fails validation
    /// - [`EstimatorError::UnknownParam`] / [`EstimatorError::InvalidParam`]
    ///   from `set_params`
    /// - I/O or decode errors from the restore
    pub fn new(mut config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        config.base_model.set_params(&config.base_params)?;
        config.residual_model.set_params(&config.residual_params)?;

        let mut estimator = Self {
            state: EstimatorState::unfit(config),
            last_artifact: None,
        };
        estimator.restore_model()?;
        Ok(estimator)
    }

    /// Wrap an existing state without touching the filesystem.
    pub fn from_state(state: EstimatorState) -> Self {
        Self {
            state,
            last_artifact: None,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.state.config
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    pub fn into_state(self) -> EstimatorState {
        self.state
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_fitted()
    }

    /// Path written by the most recent [`save_model`](Self::save_model).
    pub fn last_artifact(&self) -> Option<&Path> {
        self.last_artifact.as_deref()
    }

    /// Fitted stage-1 pipeline (scalers and base model).
    pub fn base_stage(&self) -> Option<&Pipeline> {
        self.state.stage1.as_ref()
    }

    /// Fitted stage-2 pipeline (residual model).
    pub fn residual_stage(&self) -> Option<&Pipeline> {
        self.state.stage2.as_ref()
    }

    fn stages(&self, attribute: &'static str) -> Result<(&Pipeline, &Pipeline)> {
        match (&self.state.stage1, &self.state.stage2) {
            (Some(s1), Some(s2)) => Ok((s1, s2)),
            _ => Err(EstimatorError::NotFitted { attribute }),
        }
    }

    fn codec(&self) -> ArtifactCodec {
        ArtifactCodec::new().with_compression_level(self.state.config.compression_level)
    }

    // =========================================================================
    // Training and prediction
    // =========================================================================

    /// Fit both stages on `x` `[n_samples, n_features]` and `y` `[n_samples, n_targets]`.
    ///
    /// Flagged target columns must be strictly positive; other values give
    /// NaN or −∞ after log10 and are not rejected. The previous fit is kept
    /// if either stage fails. Saves an artifact afterwards when `save` is set.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<&mut Self> {
        let config = &self.state.config;
        if x.nrows() == 0 {
            return Err(EstimatorError::EmptyInput);
        }
        ensure_dim("samples in x vs y", x.nrows(), y.nrows())?;
        ensure_dim("target columns vs log_flags", config.log_flags.n_targets(), y.ncols())?;

        let mut targets = y.to_owned();
        config.log_flags.forward_inplace(targets.view_mut())?;

        let mut stage1 = Pipeline::new(config.scalers.clone(), config.base_model.clone());
        log::debug!(
            "fitting base stage `{}` on {} samples x {} features",
            stage1.final_estimator().name(),
            x.nrows(),
            x.ncols()
        );
        stage1.fit(x, targets.view())?;

        let residuals = &targets - &stage1.predict(x)?;

        let mut stage2 = Pipeline::from_model(config.residual_model.clone());
        log::debug!("fitting residual stage `{}`", stage2.final_estimator().name());
        stage2.fit(x, residuals.view())?;

        self.state.stage1 = Some(stage1);
        self.state.stage2 = Some(stage2);
        self.state.n_features = x.ncols();

        self.save_model()?;
        Ok(self)
    }

    /// Predict `[n_samples, n_targets]` in the original target units.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (stage1, stage2) = self.stages("predict")?;
        let mut out = stage1.predict(x)?;
        out += &stage2.predict(x)?;
        self.state.config.log_flags.inverse_inplace(out.view_mut())?;
        Ok(out)
    }

    /// R² of `predict(x)` against `y`, averaged uniformly over targets.
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<f64> {
        let predictions = self.predict(x)?;
        r2_score(y, predictions.view())
    }

    // =========================================================================
    // Fitted attributes
    // =========================================================================

    /// Out-of-bag R² of the residual model.
    pub fn oob_score(&self) -> Result<f64> {
        let (_, stage2) = self.stages("oob_score_")?;
        stage2.final_estimator().oob_score()
    }

    /// Feature importances of the residual model `[n_features]`.
    pub fn feature_importances(&self) -> Result<Array1<f64>> {
        let (_, stage2) = self.stages("feature_importances_")?;
        stage2.final_estimator().feature_importances()
    }

    /// Base model coefficients `[n_targets, n_features]`, in scaled feature space.
    pub fn coef(&self) -> Result<Array2<f64>> {
        let (stage1, _) = self.stages("coef_")?;
        stage1.final_estimator().coef()
    }

    /// Base model intercepts `[n_targets]`, in scaled feature space.
    pub fn intercept(&self) -> Result<Array1<f64>> {
        let (stage1, _) = self.stages("intercept_")?;
        stage1.final_estimator().intercept()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Replace the whole state with the artifact at `restore_path/model_name`.
    ///
    /// No-op unless `restore` is set. The file name is used as given, so pass
    /// the name returned by [`save_model`](Self::save_model) as `model_name`.
    pub fn restore_model(&mut self) -> Result<()> {
        let config = &self.state.config;
        if !config.restore {
            return Ok(());
        }
        let path = config.restore_path.join(&config.model_name);
        let state: EstimatorState = read_artifact(&self.codec(), &path)?;
        self.state = state;
        log::info!("PI-estimator restored from {}", path.display());
        Ok(())
    }

    /// Write the whole state to a new timestamped artifact under `save_path`.
    ///
    /// Returns the written path, or `None` unless `save` is set. Two saves
    /// within the same second overwrite each other.
    pub fn save_model(&mut self) -> Result<Option<PathBuf>> {
        let config = &self.state.config;
        if !config.save {
            return Ok(None);
        }
        let file_name = artifact_file_name(&config.model_name, chrono::Local::now().naive_local());
        let dims = (self.state.n_features, config.log_flags.n_targets());
        let path = write_artifact(&self.codec(), &config.save_path, &file_name, dims, &self.state)?;
        log::info!("PI-estimator saved to {}", path.display());
        self.last_artifact = Some(path.clone());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Regressor;
    use crate::params::Params;
    use crate::testing::{synthetic_positive_targets, synthetic_regression};
    use crate::transform::TargetTransform;
    use approx::assert_abs_diff_eq;

    fn small_config() -> EstimatorConfig {
        EstimatorConfig::builder()
            .residual_params(
                Params::new()
                    .with("n_estimators", 10)
                    .with("oob_score", true)
                    .with("random_state", 0),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn construction_applies_params() {
        let est = PiEstimator::new(small_config()).unwrap();
        match &est.config().residual_model {
            Regressor::Forest(f) => {
                assert_eq!(f.params.n_estimators, 10);
                assert!(f.params.oob_score);
            }
            other => panic!("unexpected residual model {other:?}"),
        }
        assert!(!est.is_fitted());
    }

    #[test]
    fn construction_rejects_unknown_param() {
        let config = EstimatorConfig::builder()
            .base_params(Params::new().with("n_estimators", 3))
            .build()
            .unwrap();
        assert!(matches!(
            PiEstimator::new(config),
            Err(EstimatorError::UnknownParam { .. })
        ));
    }

    #[test]
    fn fit_predict_shapes_and_accessors() {
        let (x, y, _) = synthetic_positive_targets(50, 4, 2, 3);
        let mut est = PiEstimator::new(small_config()).unwrap();
        est.fit(x.view(), y.view()).unwrap();

        assert_eq!(est.predict(x.view()).unwrap().dim(), (50, 2));
        assert_eq!(est.coef().unwrap().dim(), (2, 4));
        assert_eq!(est.intercept().unwrap().len(), 2);
        assert_eq!(est.feature_importances().unwrap().len(), 4);
        assert!(est.oob_score().unwrap() <= 1.0);
        assert!(est.last_artifact().is_none());
    }

    #[test]
    fn log_linear_targets_are_reproduced() {
        // log10(y) is exactly linear, so stage 1 explains everything.
        let (x, y, _) = synthetic_positive_targets(30, 3, 2, 8);
        let mut est = PiEstimator::new(small_config()).unwrap();
        est.fit(x.view(), y.view()).unwrap();

        let pred = est.predict(x.view()).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert_abs_diff_eq!(p / t, 1.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(est.score(x.view(), y.view()).unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn unflagged_targets_stay_linear() {
        let (x, y) = synthetic_regression(40, 2, 1, 5);
        let config = EstimatorConfig::builder()
            .log_flags(TargetTransform::from_pairs([("y0", false)]))
            .residual_params(Params::new().with("n_estimators", 5).with("random_state", 1))
            .build()
            .unwrap();
        let mut est = PiEstimator::new(config).unwrap();
        est.fit(x.view(), y.view()).unwrap();
        assert!(est.score(x.view(), y.view()).unwrap() > 0.8);
    }

    #[test]
    fn fit_rejects_flag_count_mismatch() {
        let (x, y, _) = synthetic_positive_targets(10, 2, 3, 0);
        let mut est = PiEstimator::new(small_config()).unwrap();
        assert!(matches!(
            est.fit(x.view(), y.view()),
            Err(EstimatorError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));
        assert!(!est.is_fitted());
    }

    #[test]
    fn failed_refit_keeps_previous_stages() {
        let (x, y, _) = synthetic_positive_targets(20, 2, 2, 1);
        let config = EstimatorConfig::builder()
            .scalers(Vec::new())
            .residual_params(Params::new().with("n_estimators", 3))
            .build()
            .unwrap();
        let mut est = PiEstimator::new(config).unwrap();
        est.fit(x.view(), y.view()).unwrap();
        let before = est.predict(x.view()).unwrap();

        // Non-finite features fail the base stage.
        let mut bad_x = x.clone();
        bad_x[[3, 1]] = f64::NAN;
        assert!(matches!(
            est.fit(bad_x.view(), y.view()),
            Err(EstimatorError::SingularMatrix)
        ));
        assert_eq!(est.predict(x.view()).unwrap(), before);
    }

    #[test]
    fn unfit_accessors_fail() {
        let est = PiEstimator::new(small_config()).unwrap();
        let x = Array2::<f64>::zeros((2, 2));
        assert!(est.predict(x.view()).unwrap_err().is_not_fitted());
        assert!(est.score(x.view(), x.view()).unwrap_err().is_not_fitted());
        assert!(est.oob_score().unwrap_err().is_not_fitted());
        assert!(est.feature_importances().unwrap_err().is_not_fitted());
        assert!(est.coef().unwrap_err().is_not_fitted());
        assert!(est.intercept().unwrap_err().is_not_fitted());
    }

    #[test]
    fn missing_attribute_for_other_model_kinds() {
        let (x, y, _) = synthetic_positive_targets(20, 2, 2, 4);
        let config = EstimatorConfig::builder()
            .base_model(Regressor::decision_tree())
            .base_params(Params::new())
            .residual_model(Regressor::linear())
            .residual_params(Params::new())
            .build()
            .unwrap();
        let mut est = PiEstimator::new(config).unwrap();
        est.fit(x.view(), y.view()).unwrap();
        assert!(matches!(
            est.coef(),
            Err(EstimatorError::MissingAttribute { attribute: "coef_", .. })
        ));
        assert!(matches!(
            est.oob_score(),
            Err(EstimatorError::MissingAttribute { attribute: "oob_score_", .. })
        ));
    }
}
