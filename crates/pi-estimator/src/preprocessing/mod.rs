//! Feature scalers applied ahead of the base model.
//!
//! - [`StandardScaler`]: zero mean, unit variance
//! - [`RobustScaler`]: median-centered, scaled by the interquartile range
//! - [`MinMaxScaler`]: maps each feature onto `[0, 1]`
//!
//! All scalers implement [`ScalerFn`]. The [`Scaler`] enum wraps them so
//! that pipelines can be stored and persisted without trait objects.

mod scaler;

pub use scaler::{AffineScaling, MinMaxScaler, RobustScaler, StandardScaler};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Column-wise feature transformer.
pub trait ScalerFn {
    /// Learn scaling statistics from `x` (`[n_samples, n_features]`).
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()>;

    /// Apply the learned scaling.
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    fn fit_transform(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Scaler selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scaler {
    Standard(StandardScaler),
    Robust(RobustScaler),
    MinMax(MinMaxScaler),
}

impl Scaler {
    pub fn standard() -> Self {
        Scaler::Standard(StandardScaler::default())
    }

    pub fn robust() -> Self {
        Scaler::Robust(RobustScaler::default())
    }

    pub fn min_max() -> Self {
        Scaler::MinMax(MinMaxScaler::default())
    }

    fn inner(&self) -> &dyn ScalerFn {
        match self {
            Scaler::Standard(s) => s,
            Scaler::Robust(s) => s,
            Scaler::MinMax(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ScalerFn {
        match self {
            Scaler::Standard(s) => s,
            Scaler::Robust(s) => s,
            Scaler::MinMax(s) => s,
        }
    }
}

impl ScalerFn for Scaler {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        self.inner_mut().fit(x)
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.inner().transform(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

/// The default scaler chain: robust scaling followed by standardization.
pub fn default_scaler_chain() -> Vec<(String, Scaler)> {
    vec![
        ("sc1".to_string(), Scaler::robust()),
        ("sc2".to_string(), Scaler::standard()),
    ]
}
