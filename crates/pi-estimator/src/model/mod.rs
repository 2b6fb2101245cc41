//! Regressors used by the two estimator stages.
//!
//! # Overview
//!
//! - [`LinearRegression`]: least squares, the default base model
//! - [`DecisionTreeRegressor`]: a single CART tree
//! - [`RandomForestRegressor`]: bagged trees, the default residual model
//!
//! All implement [`RegressorFn`]. The [`Regressor`] enum wraps them so
//! configured and fitted models can be cloned and persisted.
//!
//! Inputs are sample-major: `x` is `[n_samples, n_features]`, `y` and
//! predictions are `[n_samples, n_outputs]`.

mod forest;
mod linear;
mod tree;

pub use forest::{ForestParams, RandomForestRegressor};
pub use linear::{LinearRegression, LinearWeights};
pub use tree::{DecisionTreeRegressor, MaxFeatures, NodeId, Tree, TreeParams};

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_dim, EstimatorError, Result};
use crate::params::{ParamValue, Params};

// =============================================================================
// RegressorFn
// =============================================================================

/// Supervised multi-output regressor.
pub trait RegressorFn {
    /// Fit on `x` `[n_samples, n_features]` and `y` `[n_samples, n_outputs]`.
    ///
    /// Refitting discards the previous fit.
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()>;

    /// Predict `[n_samples, n_outputs]`.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Set one hyperparameter by name.
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()>;

    /// Apply every entry of `params` in order.
    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (name, value) in params.iter() {
            self.set_param(name, value)?;
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Shared input checks for `fit`.
pub(crate) fn validate_training_data(
    model: &'static str,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
) -> Result<()> {
    if x.nrows() == 0 {
        return Err(EstimatorError::EmptyInput);
    }
    if x.ncols() == 0 {
        return Err(EstimatorError::invalid_param(
            model,
            "x",
            "at least one feature is required",
        ));
    }
    ensure_dim("samples in x vs y", x.nrows(), y.nrows())
}

// =============================================================================
// Regressor
// =============================================================================

/// Regressor selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Regressor {
    Linear(LinearRegression),
    Tree(DecisionTreeRegressor),
    Forest(RandomForestRegressor),
}

impl Default for Regressor {
    fn default() -> Self {
        Regressor::Linear(LinearRegression::default())
    }
}

impl From<LinearRegression> for Regressor {
    fn from(model: LinearRegression) -> Self {
        Regressor::Linear(model)
    }
}

impl From<DecisionTreeRegressor> for Regressor {
    fn from(model: DecisionTreeRegressor) -> Self {
        Regressor::Tree(model)
    }
}

impl From<RandomForestRegressor> for Regressor {
    fn from(model: RandomForestRegressor) -> Self {
        Regressor::Forest(model)
    }
}

impl Regressor {
    pub fn linear() -> Self {
        Regressor::Linear(LinearRegression::default())
    }

    pub fn random_forest() -> Self {
        Regressor::Forest(RandomForestRegressor::default())
    }

    pub fn decision_tree() -> Self {
        Regressor::Tree(DecisionTreeRegressor::default())
    }

    fn inner(&self) -> &dyn RegressorFn {
        match self {
            Regressor::Linear(m) => m,
            Regressor::Tree(m) => m,
            Regressor::Forest(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn RegressorFn {
        match self {
            Regressor::Linear(m) => m,
            Regressor::Tree(m) => m,
            Regressor::Forest(m) => m,
        }
    }

    fn missing(&self, attribute: &'static str) -> EstimatorError {
        EstimatorError::MissingAttribute {
            attribute,
            model: self.name(),
        }
    }

    // =========================================================================
    // Fitted attributes
    // =========================================================================

    /// Linear coefficients `[n_outputs, n_features]`.
    pub fn coef(&self) -> Result<Array2<f64>> {
        match self {
            Regressor::Linear(m) => m.coef(),
            _ => Err(self.missing("coef_")),
        }
    }

    /// Linear intercepts `[n_outputs]`.
    pub fn intercept(&self) -> Result<Array1<f64>> {
        match self {
            Regressor::Linear(m) => m.intercept(),
            _ => Err(self.missing("intercept_")),
        }
    }

    /// Impurity-based importances `[n_features]`.
    pub fn feature_importances(&self) -> Result<Array1<f64>> {
        match self {
            Regressor::Tree(m) => m.feature_importances(),
            Regressor::Forest(m) => m.feature_importances(),
            Regressor::Linear(_) => Err(self.missing("feature_importances_")),
        }
    }

    /// Out-of-bag R².
    pub fn oob_score(&self) -> Result<f64> {
        match self {
            Regressor::Forest(m) => m.oob_score(),
            _ => Err(self.missing("oob_score_")),
        }
    }
}

impl RegressorFn for Regressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.inner().predict(x)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.inner_mut().set_param(name, value)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn attributes_follow_model_kind() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![[1.0], [3.0], [5.0], [7.0]];

        let mut linear = Regressor::linear();
        linear.fit(x.view(), y.view()).unwrap();
        assert!(linear.coef().is_ok());
        assert!(matches!(
            linear.oob_score(),
            Err(EstimatorError::MissingAttribute { attribute: "oob_score_", .. })
        ));

        let mut tree = Regressor::decision_tree();
        tree.fit(x.view(), y.view()).unwrap();
        assert!(tree.feature_importances().is_ok());
        assert!(matches!(
            tree.coef(),
            Err(EstimatorError::MissingAttribute { attribute: "coef_", .. })
        ));
    }

    #[test]
    fn set_params_applies_in_order() {
        let mut model = Regressor::random_forest();
        let params = Params::new()
            .with("n_estimators", 300)
            .with("oob_score", true)
            .with("random_state", 0);
        model.set_params(&params).unwrap();
        match &model {
            Regressor::Forest(f) => {
                assert_eq!(f.params.n_estimators, 300);
                assert!(f.params.oob_score);
                assert_eq!(f.params.random_state, Some(0));
            }
            other => panic!("unexpected model {other:?}"),
        }
    }

    #[test]
    fn set_params_propagates_first_error() {
        let mut model = Regressor::linear();
        let params = Params::new().with("fit_intercept", true).with("bogus", 1);
        assert!(matches!(
            model.set_params(&params),
            Err(EstimatorError::UnknownParam { .. })
        ));
    }

    #[test]
    fn fit_rejects_mismatched_rows() {
        let mut model = Regressor::linear();
        assert!(matches!(
            model.fit(array![[1.0], [2.0]].view(), array![[1.0]].view()),
            Err(EstimatorError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            model.fit(Array2::<f64>::zeros((0, 2)).view(), Array2::<f64>::zeros((0, 1)).view()),
            Err(EstimatorError::EmptyInput)
        ));
    }
}
