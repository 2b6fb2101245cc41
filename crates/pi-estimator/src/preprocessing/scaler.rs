//! Scaler implementations.
//!
//! Every scaler reduces to a per-feature affine map `(x - center) / scale`.
//! Features with zero spread get `scale = 1` so constant columns pass through
//! centered instead of becoming NaN.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::ScalerFn;
use crate::error::{ensure_dim, EstimatorError, Result};
use crate::utils::{quantile_sorted, sorted_copy};

// =============================================================================
// AffineScaling
// =============================================================================

/// Learned per-feature `center` and `scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineScaling {
    pub center: Array1<f64>,
    pub scale: Array1<f64>,
}

impl AffineScaling {
    fn new(center: Array1<f64>, mut scale: Array1<f64>) -> Self {
        scale.mapv_inplace(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        Self { center, scale }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.center.len()
    }

    fn apply(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        ensure_dim("scaler features", self.n_features(), x.ncols())?;
        Ok((&x - &self.center) / &self.scale)
    }
}

fn fitted(scaling: &Option<AffineScaling>) -> Result<&AffineScaling> {
    scaling
        .as_ref()
        .ok_or(EstimatorError::NotFitted { attribute: "scaler" })
}

fn ensure_samples(x: ArrayView2<f64>) -> Result<()> {
    if x.nrows() == 0 {
        Err(EstimatorError::EmptyInput)
    } else {
        Ok(())
    }
}

// =============================================================================
// StandardScaler
// =============================================================================

/// Standardize features to zero mean and unit (population) variance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    scaling: Option<AffineScaling>,
}

impl StandardScaler {
    pub fn scaling(&self) -> Option<&AffineScaling> {
        self.scaling.as_ref()
    }
}

impl ScalerFn for StandardScaler {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        ensure_samples(x)?;
        let mean = x.mean_axis(Axis(0)).ok_or(EstimatorError::EmptyInput)?;
        let std = x.std_axis(Axis(0), 0.0);
        self.scaling = Some(AffineScaling::new(mean, std));
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        fitted(&self.scaling)?.apply(x)
    }

    fn is_fitted(&self) -> bool {
        self.scaling.is_some()
    }

    fn name(&self) -> &'static str {
        "standard_scaler"
    }
}

// =============================================================================
// RobustScaler
// =============================================================================

/// Center on the median and scale by the 25th–75th percentile range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    /// Lower and upper quantile bounding the scale range.
    pub quantile_range: (f64, f64),
    scaling: Option<AffineScaling>,
}

impl Default for RobustScaler {
    fn default() -> Self {
        Self {
            quantile_range: (0.25, 0.75),
            scaling: None,
        }
    }
}

impl RobustScaler {
    pub fn with_quantile_range(lower: f64, upper: f64) -> Self {
        Self {
            quantile_range: (lower, upper),
            scaling: None,
        }
    }

    pub fn scaling(&self) -> Option<&AffineScaling> {
        self.scaling.as_ref()
    }
}

impl ScalerFn for RobustScaler {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        ensure_samples(x)?;
        let (lower, upper) = self.quantile_range;
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower > upper {
            return Err(EstimatorError::invalid_param(
                "robust_scaler",
                "quantile_range",
                format!("({lower}, {upper}) is not an ordered pair in [0, 1]"),
            ));
        }

        let n_features = x.ncols();
        let mut center = Array1::zeros(n_features);
        let mut scale = Array1::zeros(n_features);
        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let sorted = sorted_copy(column.iter().copied());
            center[j] = quantile_sorted(&sorted, 0.5);
            scale[j] = quantile_sorted(&sorted, upper) - quantile_sorted(&sorted, lower);
        }

        self.scaling = Some(AffineScaling::new(center, scale));
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        fitted(&self.scaling)?.apply(x)
    }

    fn is_fitted(&self) -> bool {
        self.scaling.is_some()
    }

    fn name(&self) -> &'static str {
        "robust_scaler"
    }
}

// =============================================================================
// MinMaxScaler
// =============================================================================

/// Rescale each feature onto `[0, 1]` using the training min and max.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    scaling: Option<AffineScaling>,
}

impl ScalerFn for MinMaxScaler {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        ensure_samples(x)?;
        let min = x.fold_axis(Axis(0), f64::INFINITY, |&acc, &v| acc.min(v));
        let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v));
        let range = &max - &min;
        self.scaling = Some(AffineScaling::new(min, range));
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        fitted(&self.scaling)?.apply(x)
    }

    fn is_fitted(&self) -> bool {
        self.scaling.is_some()
    }

    fn name(&self) -> &'static str {
        "min_max_scaler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn standard_scaler_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let mut scaler = StandardScaler::default();
        let z = scaler.fit_transform(x.view()).unwrap();

        let mean = z.mean_axis(Axis(0)).unwrap();
        let std = z.std_axis(Axis(0), 0.0);
        assert_abs_diff_eq!(mean, array![0.0, 0.0], epsilon = 1e-12);
        assert_abs_diff_eq!(std, array![1.0, 1.0], epsilon = 1e-12);
    }

    #[test]
    fn robust_scaler_uses_median_and_iqr() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [100.0]];
        let mut scaler = RobustScaler::default();
        scaler.fit(x.view()).unwrap();

        let scaling = scaler.scaling().unwrap();
        assert_abs_diff_eq!(scaling.center[0], 3.0);
        // q25 = 2, q75 = 4
        assert_abs_diff_eq!(scaling.scale[0], 2.0);
    }

    #[test]
    fn min_max_scaler_maps_to_unit_interval() {
        let x = array![[-1.0, 5.0], [1.0, 5.0], [3.0, 5.0]];
        let mut scaler = MinMaxScaler::default();
        let z = scaler.fit_transform(x.view()).unwrap();
        assert_abs_diff_eq!(z.column(0).to_owned(), array![0.0, 0.5, 1.0]);
        // Constant column: centered, unit scale
        assert_abs_diff_eq!(z.column(1).to_owned(), array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn constant_feature_does_not_produce_nan() {
        let x = array![[2.0], [2.0], [2.0]];
        let mut scaler = StandardScaler::default();
        let z = scaler.fit_transform(x.view()).unwrap();
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn transform_before_fit_fails() {
        let scaler = StandardScaler::default();
        let err = scaler.transform(array![[1.0]].view()).unwrap_err();
        assert!(err.is_not_fitted());
    }

    #[test]
    fn transform_checks_feature_count() {
        let mut scaler = StandardScaler::default();
        scaler.fit(array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        assert!(matches!(
            scaler.transform(array![[1.0]].view()),
            Err(EstimatorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn robust_scaler_rejects_bad_range() {
        let mut scaler = RobustScaler::with_quantile_range(0.8, 0.2);
        assert!(matches!(
            scaler.fit(array![[1.0], [2.0]].view()),
            Err(EstimatorError::InvalidParam { .. })
        ));
    }
}
