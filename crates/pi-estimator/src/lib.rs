//! pi-estimator: two-stage residual regression for photosynthesis-irradiance
//! parameters.
//!
//! A base regressor (linear least squares by default) is fit on scaled
//! features and log10-transformed targets; a residual regressor (random
//! forest by default) is fit on what the base model misses. Predictions sum
//! both stages and map flagged targets back with `10^x`.
//!
//! # Key Types
//!
//! - [`PiEstimator`] - fit / predict / score and fitted attributes
//! - [`EstimatorConfig`] - configuration builder
//! - [`Regressor`] / [`Scaler`] - the shipped collaborators
//! - [`TargetTransform`] - per-column log10 flags
//!
//! # Persistence
//!
//! With `save` enabled every `fit` writes
//! `<model_name>_<YYYYMMDD_HHMMSS>_v1.0.pie` under `save_path`. With `restore`
//! enabled, construction loads `restore_path/model_name` as-is. See the
//! [`persist`] module for the file format.

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod config;
pub mod error;
pub mod estimator;
pub mod metrics;
pub mod model;
pub mod params;
pub mod persist;
pub mod pipeline;
pub mod preprocessing;
pub mod testing;
pub mod transform;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::EstimatorConfig;
pub use error::{EstimatorError, Result};
pub use estimator::{EstimatorState, PiEstimator};

pub use model::{
    DecisionTreeRegressor, LinearRegression, RandomForestRegressor, Regressor, RegressorFn,
};
pub use preprocessing::{Scaler, ScalerFn};

pub use params::{ParamValue, Params};
pub use pipeline::Pipeline;
pub use transform::{LogFlag, TargetTransform};

pub use metrics::{r2_score, r2_score_per_output};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
