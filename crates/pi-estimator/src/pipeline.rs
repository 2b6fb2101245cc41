//! Scaler chain followed by a regressor.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Regressor, RegressorFn};
use crate::preprocessing::{Scaler, ScalerFn};

/// Ordered `(name, scaler)` steps ending in a regressor.
///
/// `fit` fits each scaler on the output of the previous one, then fits the
/// regressor on the fully transformed features. `predict` replays the same
/// transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<(String, Scaler)>,
    model: Regressor,
}

impl Pipeline {
    pub fn new(steps: Vec<(String, Scaler)>, model: Regressor) -> Self {
        Self { steps, model }
    }

    /// Pipeline without preprocessing.
    pub fn from_model(model: Regressor) -> Self {
        Self::new(Vec::new(), model)
    }

    pub fn steps(&self) -> &[(String, Scaler)] {
        &self.steps
    }

    /// Look up a scaler step by name.
    pub fn named_step(&self, name: &str) -> Option<&Scaler> {
        self.steps.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// The trailing regressor.
    pub fn final_estimator(&self) -> &Regressor {
        &self.model
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut current = x.to_owned();
        for (_, scaler) in &self.steps {
            current = scaler.transform(current.view())?;
        }
        Ok(current)
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        let mut current: Option<Array2<f64>> = None;
        for (name, scaler) in &mut self.steps {
            let input = current.as_ref().map_or(x.view(), |a| a.view());
            log::debug!("fitting scaler step `{name}` ({})", scaler.name());
            current = Some(scaler.fit_transform(input)?);
        }
        let features = current.as_ref().map_or(x.view(), |a| a.view());
        self.model.fit(features, y)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.steps.is_empty() {
            return self.model.predict(x);
        }
        let features = self.transform(x)?;
        self.model.predict(features.view())
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_fitted() && self.steps.iter().all(|(_, s)| s.is_fitted())
    }
}
