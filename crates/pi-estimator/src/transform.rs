//! Per-column log10 target transform.
//!
//! [`TargetTransform`] is an ordered list of `(column name, log10)` pairs.
//! Position `i` refers to target column `i`; names only label the columns.
//! The transform is persisted with the estimator so that prediction applies
//! the matching inverse.
//!
//! # Domain
//!
//! Flagged columns must be strictly positive. Zero maps to `-inf` and
//! negative values to NaN; both propagate unchanged through fitting.

use ndarray::{ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_dim, Result};

/// Transform flag for one target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFlag {
    pub column: String,
    pub log10: bool,
}

impl LogFlag {
    pub fn new(column: impl Into<String>, log10: bool) -> Self {
        Self {
            column: column.into(),
            log10,
        }
    }
}

/// Ordered per-column log10 flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTransform {
    flags: Vec<LogFlag>,
}

impl Default for TargetTransform {
    /// Both photosynthesis parameters (`y0` = PBmax, `y1` = Ek) in log space.
    fn default() -> Self {
        Self::from_pairs([("y0", true), ("y1", true)])
    }
}

impl TargetTransform {
    pub fn new(flags: Vec<LogFlag>) -> Self {
        Self { flags }
    }

    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, bool)>) -> Self {
        Self {
            flags: pairs
                .into_iter()
                .map(|(column, log10)| LogFlag::new(column, log10))
                .collect(),
        }
    }

    /// Number of target columns this transform describes.
    #[inline]
    pub fn n_targets(&self) -> usize {
        self.flags.len()
    }

    pub fn flags(&self) -> &[LogFlag] {
        &self.flags
    }

    /// Replace every flagged column with its base-10 logarithm.
    pub fn forward_inplace(&self, mut targets: ArrayViewMut2<f64>) -> Result<()> {
        ensure_dim("log10 flags vs target columns", self.n_targets(), targets.ncols())?;
        for (flag, mut column) in self.flags.iter().zip(targets.axis_iter_mut(Axis(1))) {
            if flag.log10 {
                column.mapv_inplace(f64::log10);
            }
        }
        Ok(())
    }

    /// Replace every flagged column with `10^value`.
    pub fn inverse_inplace(&self, mut outputs: ArrayViewMut2<f64>) -> Result<()> {
        ensure_dim("log10 flags vs output columns", self.n_targets(), outputs.ncols())?;
        for (flag, mut column) in self.flags.iter().zip(outputs.axis_iter_mut(Axis(1))) {
            if flag.log10 {
                column.mapv_inplace(|v| 10f64.powf(v));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn forward_only_touches_flagged_columns() {
        let t = TargetTransform::from_pairs([("y0", true), ("y1", false)]);
        let mut y = array![[100.0, 100.0], [0.1, 0.1]];
        t.forward_inplace(y.view_mut()).unwrap();
        assert_abs_diff_eq!(y, array![[2.0, 100.0], [-1.0, 0.1]], epsilon = 1e-12);
    }

    #[test]
    fn inverse_undoes_forward() {
        let t = TargetTransform::default();
        let original = array![[3.5, 120.0], [0.02, 980.0]];
        let mut y = original.clone();
        t.forward_inplace(y.view_mut()).unwrap();
        t.inverse_inplace(y.view_mut()).unwrap();
        assert_abs_diff_eq!(y, original, epsilon = 1e-9);
    }

    #[test]
    fn non_positive_values_propagate() {
        let t = TargetTransform::from_pairs([("y0", true)]);
        let mut y = array![[0.0], [-1.0]];
        t.forward_inplace(y.view_mut()).unwrap();
        assert_eq!(y[[0, 0]], f64::NEG_INFINITY);
        assert!(y[[1, 0]].is_nan());
    }

    #[test]
    fn column_count_must_match() {
        let t = TargetTransform::default();
        let mut y = array![[1.0], [2.0]];
        assert!(t.forward_inplace(y.view_mut()).is_err());
    }
}
