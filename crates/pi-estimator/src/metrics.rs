//! Regression metrics.
//!
//! Inputs are sample-major `[n_samples, n_outputs]`. Multi-output scores are
//! computed per output and then averaged uniformly.

use ndarray::{Array1, ArrayView2, Axis, Zip};

use crate::error::{ensure_dim, Result};

// =============================================================================
// R² (coefficient of determination)
// =============================================================================

/// Per-output coefficient of determination: `1 - SS_res / SS_tot`.
///
/// A constant target column scores `1.0` when predicted exactly and `0.0`
/// otherwise. Higher is better; the value is unbounded below.
pub fn r2_score_per_output(
    y_true: ArrayView2<f64>,
    y_pred: ArrayView2<f64>,
) -> Result<Array1<f64>> {
    ensure_dim("r2_score samples", y_true.nrows(), y_pred.nrows())?;
    ensure_dim("r2_score outputs", y_true.ncols(), y_pred.ncols())?;

    let scores = y_true
        .axis_iter(Axis(1))
        .zip(y_pred.axis_iter(Axis(1)))
        .map(|(t, p)| {
            let mean = t.mean().unwrap_or(0.0);
            let mut ss_res = 0.0;
            let mut ss_tot = 0.0;
            Zip::from(&t).and(&p).for_each(|&t, &p| {
                ss_res += (t - p) * (t - p);
                ss_tot += (t - mean) * (t - mean);
            });

            if ss_tot == 0.0 {
                if ss_res == 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                1.0 - ss_res / ss_tot
            }
        })
        .collect();

    Ok(scores)
}

/// Uniformly averaged R² across outputs.
pub fn r2_score(y_true: ArrayView2<f64>, y_pred: ArrayView2<f64>) -> Result<f64> {
    let per_output = r2_score_per_output(y_true, y_pred)?;
    Ok(per_output.mean().unwrap_or(f64::NAN))
}
