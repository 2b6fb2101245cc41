//! Named hyperparameters applied to regressors through `set_params`.
//!
//! [`Params`] is an ordered list of `(name, value)` pairs. Each regressor
//! decides which names it recognizes and validates values itself; the
//! estimator only forwards them.

use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, Result};

/// A single hyperparameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Explicit "unset", e.g. `max_depth = None` for unlimited depth.
    None,
}

impl ParamValue {
    pub(crate) fn as_bool(&self, model: &'static str, name: &str) -> Result<bool> {
        match *self {
            ParamValue::Bool(v) => Ok(v),
            other => Err(EstimatorError::invalid_param(
                model,
                name,
                format!("expected bool, got {other:?}"),
            )),
        }
    }

    pub(crate) fn as_f64(&self, model: &'static str, name: &str) -> Result<f64> {
        match *self {
            ParamValue::Float(v) => Ok(v),
            ParamValue::Int(v) => Ok(v as f64),
            other => Err(EstimatorError::invalid_param(
                model,
                name,
                format!("expected number, got {other:?}"),
            )),
        }
    }

    /// Non-negative integer. Floats are rejected.
    pub(crate) fn as_usize(&self, model: &'static str, name: &str) -> Result<usize> {
        match *self {
            ParamValue::Int(v) if v >= 0 => Ok(v as usize),
            other => Err(EstimatorError::invalid_param(
                model,
                name,
                format!("expected non-negative integer, got {other:?}"),
            )),
        }
    }

    /// Like [`as_usize`](Self::as_usize) but `None` maps to `Option::None`.
    pub(crate) fn as_opt_usize(&self, model: &'static str, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::None => Ok(None),
            other => other.as_usize(model, name).map(Some),
        }
    }

    pub(crate) fn as_opt_u64(&self, model: &'static str, name: &str) -> Result<Option<u64>> {
        self.as_opt_usize(model, name).map(|v| v.map(|v| v as u64))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::None, Into::into)
    }
}

/// Ordered hyperparameter set.
///
/// Later entries with the same name override earlier ones when applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Last value set for `name`.
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_entries_override() {
        let p = Params::new().with("n_estimators", 10).with("n_estimators", 20);
        assert_eq!(p.get("n_estimators"), Some(ParamValue::Int(20)));
        assert_eq!(p.get("missing"), None);
    }

    #[test]
    fn conversions() {
        assert_eq!(ParamValue::from(Some(3usize)), ParamValue::Int(3));
        assert_eq!(ParamValue::from(None::<usize>), ParamValue::None);
        assert!(ParamValue::Int(-1).as_usize("m", "x").is_err());
        assert_eq!(ParamValue::Int(2).as_f64("m", "x").unwrap(), 2.0);
        assert!(ParamValue::Float(0.5).as_bool("m", "x").is_err());
    }
}
