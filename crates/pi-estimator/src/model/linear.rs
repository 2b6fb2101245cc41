//! Ordinary least squares linear regression.
//!
//! Multi-output, with an optional intercept and an optional ridge penalty.
//! The fit takes an SVD of the centered design and returns the minimum-norm
//! least squares solution, so rank-deficient designs still fit.

use nalgebra::DMatrix;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::{validate_training_data, RegressorFn};
use crate::error::{ensure_dim, EstimatorError, Result};
use crate::params::ParamValue;

const MODEL_NAME: &str = "linear_regression";

/// Iteration cap for the SVD; only non-converging input reaches it.
const SVD_MAX_ITERATIONS: usize = 10_000;

// =============================================================================
// LinearWeights
// =============================================================================

/// Fitted linear weights.
///
/// Stored as one matrix with shape `[n_features + 1, n_outputs]`:
///
/// ```text
/// weights[[feature, output]]    → coefficient
/// weights[[n_features, output]] → intercept (last row)
/// ```
///
/// Prediction is `x · weights[:-1, :] + weights[-1, :]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    weights: Array2<f64>,
}

impl LinearWeights {
    /// Build from coefficients `[n_features, n_outputs]` and intercepts `[n_outputs]`.
    pub fn from_parts(coefficients: ArrayView2<f64>, intercepts: ArrayView1<f64>) -> Self {
        let n_features = coefficients.nrows();
        let mut weights = Array2::zeros((n_features + 1, coefficients.ncols()));
        weights.slice_mut(s![..n_features, ..]).assign(&coefficients);
        weights.row_mut(n_features).assign(&intercepts);
        Self { weights }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.weights.nrows() - 1
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.weights.ncols()
    }

    /// Coefficient matrix `[n_features, n_outputs]`.
    #[inline]
    pub fn weight_matrix(&self) -> ArrayView2<'_, f64> {
        self.weights.slice(s![..self.n_features(), ..])
    }

    /// Intercept per output.
    #[inline]
    pub fn intercepts(&self) -> ArrayView1<'_, f64> {
        self.weights.row(self.n_features())
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        ensure_dim("linear_regression features", self.n_features(), x.ncols())?;
        Ok(x.dot(&self.weight_matrix()) + &self.intercepts())
    }
}

// =============================================================================
// LinearRegression
// =============================================================================

/// Least squares linear regression.
///
/// # Parameters
///
/// - `fit_intercept` (bool, default `true`): center data and learn intercepts
/// - `alpha` (float ≥ 0, default `0`): L2 penalty on the coefficients
///
/// With an intercept, features that are constant over the training set get a
/// zero coefficient. Collinear features and designs with fewer samples than
/// features get the minimum-norm solution. Only non-finite features fail,
/// with [`EstimatorError::SingularMatrix`]. Non-finite targets propagate into
/// the coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fit_intercept: bool,
    pub alpha: f64,
    weights: Option<LinearWeights>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            alpha: 0.0,
            weights: None,
        }
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn weights(&self) -> Option<&LinearWeights> {
        self.weights.as_ref()
    }

    /// Coefficients with shape `[n_outputs, n_features]`.
    pub fn coef(&self) -> Result<Array2<f64>> {
        let weights = self.fitted("coef_")?;
        Ok(weights.weight_matrix().t().to_owned())
    }

    /// Intercepts with shape `[n_outputs]`.
    pub fn intercept(&self) -> Result<Array1<f64>> {
        let weights = self.fitted("intercept_")?;
        Ok(weights.intercepts().to_owned())
    }

    fn fitted(&self, attribute: &'static str) -> Result<&LinearWeights> {
        self.weights
            .as_ref()
            .ok_or(EstimatorError::NotFitted { attribute })
    }
}

impl RegressorFn for LinearRegression {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        validate_training_data(MODEL_NAME, x, y)?;
        let n_features = x.ncols();
        let n_outputs = y.ncols();

        let (x_mean, y_mean) = if self.fit_intercept {
            (
                x.mean_axis(Axis(0)).ok_or(EstimatorError::EmptyInput)?,
                y.mean_axis(Axis(0)).ok_or(EstimatorError::EmptyInput)?,
            )
        } else {
            (Array1::zeros(n_features), Array1::zeros(n_outputs))
        };

        let mut xc = &x - &x_mean;
        if self.fit_intercept {
            for (mut centered, raw) in xc.axis_iter_mut(Axis(1)).zip(x.axis_iter(Axis(1))) {
                if is_constant(raw) {
                    centered.fill(0.0);
                }
            }
        }
        let yc = &y - &y_mean;

        let coefficients = least_squares(xc.view(), yc.view(), self.alpha)?;
        let intercepts = &y_mean - &x_mean.dot(&coefficients);

        self.weights = Some(LinearWeights::from_parts(
            coefficients.view(),
            intercepts.view(),
        ));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fitted("weights")?.predict(x)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "fit_intercept" => self.fit_intercept = value.as_bool(MODEL_NAME, name)?,
            "alpha" => {
                let alpha = value.as_f64(MODEL_NAME, name)?;
                if !(alpha >= 0.0 && alpha.is_finite()) {
                    return Err(EstimatorError::invalid_param(
                        MODEL_NAME,
                        name,
                        format!("must be a finite non-negative number, got {alpha}"),
                    ));
                }
                self.alpha = alpha;
            }
            _ => return Err(EstimatorError::unknown_param(MODEL_NAME, name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }

    fn name(&self) -> &'static str {
        MODEL_NAME
    }
}

// =============================================================================
// Least squares
// =============================================================================

fn is_constant(column: ArrayView1<f64>) -> bool {
    let mut values = column.iter();
    match values.next() {
        Some(&first) => values.all(|&v| v == first),
        None => true,
    }
}

/// Minimum-norm solution of `min ‖x·b − y‖² + alpha·‖b‖²`, shape `[p, k]`.
///
/// Computed from the thin SVD `x = U Σ Vᵀ` as `b = V f(Σ) Uᵀ y`. Without a
/// penalty, singular values at or below `σ_max · max(n, p) · ε` count as zero.
fn least_squares(x: ArrayView2<f64>, y: ArrayView2<f64>, alpha: f64) -> Result<Array2<f64>> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::SingularMatrix);
    }
    let (n, p) = x.dim();
    let k = y.ncols();
    let design = DMatrix::from_fn(n, p, |i, j| x[[i, j]]);
    let targets = DMatrix::from_fn(n, k, |i, j| y[[i, j]]);

    let svd = design
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or(EstimatorError::SingularMatrix)?;
    let (Some(u), Some(v_t)) = (svd.u.as_ref(), svd.v_t.as_ref()) else {
        return Err(EstimatorError::SingularMatrix);
    };

    let cutoff = svd.singular_values.max() * n.max(p) as f64 * f64::EPSILON;
    let mut projected = u.transpose() * targets;
    for (i, &sigma) in svd.singular_values.iter().enumerate() {
        let factor = if alpha > 0.0 {
            sigma / (sigma * sigma + alpha)
        } else if sigma > cutoff {
            sigma.recip()
        } else {
            0.0
        };
        projected.row_mut(i).scale_mut(factor);
    }

    let solution = v_t.transpose() * projected;
    Ok(Array2::from_shape_fn((p, k), |(i, j)| solution[(i, j)]))
}
