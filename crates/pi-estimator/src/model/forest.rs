//! Random forest regression (bagged CART trees).
//!
//! Each tree is grown on a bootstrap sample with its own RNG stream derived
//! from `random_state`, so results do not depend on the thread count.
//! Samples left out of a tree's bootstrap ("out-of-bag") provide a built-in
//! validation score.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::tree::{Tree, TreeGrower, TreeParams};
use super::{validate_training_data, RegressorFn};
use crate::error::{ensure_dim, EstimatorError, Result};
use crate::metrics::r2_score;
use crate::params::ParamValue;
use crate::utils::run_with_threads;

const MODEL_NAME: &str = "random_forest";

// =============================================================================
// Parameters
// =============================================================================

/// Forest parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees. Default: 100.
    pub n_estimators: usize,
    /// Grow each tree on a bootstrap sample. Default: true.
    pub bootstrap: bool,
    /// Compute the out-of-bag R² after fitting. Default: false.
    pub oob_score: bool,
    /// Seed; `None` draws a fresh seed per fit.
    pub random_state: Option<u64>,
    /// Threads: 0 = all cores, 1 = sequential.
    pub n_jobs: usize,
    pub tree: TreeParams,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            bootstrap: true,
            oob_score: false,
            random_state: None,
            n_jobs: 0,
            tree: TreeParams::default(),
        }
    }
}

// =============================================================================
// Fitted forest
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedForest {
    trees: Vec<Tree>,
    n_features: usize,
    n_outputs: usize,
    oob_score: Option<f64>,
}

/// One grown tree plus the rows its bootstrap never drew.
struct GrownTree {
    tree: Tree,
    out_of_bag: Vec<usize>,
}

fn grow_tree(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    params: &ForestParams,
    seed: u64,
) -> GrownTree {
    let n = x.nrows();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let (mut indices, out_of_bag) = if params.bootstrap {
        let mut drawn = vec![false; n];
        let indices: Vec<usize> = (0..n)
            .map(|_| {
                let row = rng.random_range(0..n);
                drawn[row] = true;
                row
            })
            .collect();
        let oob = (0..n).filter(|&row| !drawn[row]).collect();
        (indices, oob)
    } else {
        ((0..n).collect(), Vec::new())
    };

    let tree = TreeGrower::new(x.reborrow(), y.reborrow(), params.tree, rng.next_u64()).grow(&mut indices);
    GrownTree { tree, out_of_bag }
}

/// R² over samples with at least one out-of-bag prediction.
///
/// NaN if no sample was ever out of bag (tiny datasets or few trees).
fn out_of_bag_score(grown: &[GrownTree], x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<f64> {
    let (n, n_outputs) = y.dim();
    let mut sums = Array2::<f64>::zeros((n, n_outputs));
    let mut counts = vec![0usize; n];

    for g in grown {
        if g.out_of_bag.is_empty() {
            continue;
        }
        let rows = x.select(Axis(0), &g.out_of_bag);
        let preds = g.tree.predict(rows.view())?;
        for (&row, pred) in g.out_of_bag.iter().zip(preds.outer_iter()) {
            let mut acc = sums.row_mut(row);
            acc += &pred;
            counts[row] += 1;
        }
    }

    let covered: Vec<usize> = (0..n).filter(|&i| counts[i] > 0).collect();
    if covered.len() < n {
        log::warn!(
            "{} of {} samples have no out-of-bag prediction; oob_score excludes them",
            n - covered.len(),
            n
        );
    }
    if covered.is_empty() {
        return Ok(f64::NAN);
    }

    let mut oob_pred = sums.select(Axis(0), &covered);
    for (mut row, &i) in oob_pred.outer_iter_mut().zip(&covered) {
        row /= counts[i] as f64;
    }
    let truth = y.select(Axis(0), &covered);
    r2_score(truth.view(), oob_pred.view())
}

// =============================================================================
// RandomForestRegressor
// =============================================================================

/// Bagged ensemble of regression trees.
///
/// # Parameters
///
/// `n_estimators`, `bootstrap`, `oob_score`, `random_state`, `n_jobs` plus
/// the tree parameters `max_depth`, `min_samples_split`, `min_samples_leaf`,
/// `max_features`.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use pi_estimator::model::{RandomForestRegressor, RegressorFn};
/// use pi_estimator::params::ParamValue;
///
/// let x = array![[1.0], [2.0], [3.0], [4.0]];
/// let y = array![[1.0], [1.0], [2.0], [2.0]];
///
/// let mut forest = RandomForestRegressor::default();
/// forest.set_param("n_estimators", ParamValue::Int(10)).unwrap();
/// forest.set_param("random_state", ParamValue::Int(0)).unwrap();
/// forest.fit(x.view(), y.view()).unwrap();
///
/// assert_eq!(forest.predict(x.view()).unwrap().dim(), (4, 1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub params: ForestParams,
    fitted: Option<FittedForest>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn trees(&self) -> &[Tree] {
        self.fitted.as_ref().map_or(&[], |f| f.trees.as_slice())
    }

    /// Out-of-bag R².
    ///
    /// Requires `oob_score = true` and `bootstrap = true` at fit time.
    pub fn oob_score(&self) -> Result<f64> {
        let fitted = self.fitted("oob_score_")?;
        fitted.oob_score.ok_or(EstimatorError::MissingAttribute {
            attribute: "oob_score_",
            model: MODEL_NAME,
        })
    }

    /// Mean of the per-tree normalized importances, renormalized to sum to one.
    pub fn feature_importances(&self) -> Result<Array1<f64>> {
        let fitted = self.fitted("feature_importances_")?;
        let mut total = Array1::zeros(fitted.n_features);
        for tree in &fitted.trees {
            total += &tree.feature_importances();
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        Ok(total)
    }

    fn fitted(&self, attribute: &'static str) -> Result<&FittedForest> {
        self.fitted
            .as_ref()
            .ok_or(EstimatorError::NotFitted { attribute })
    }
}

impl RegressorFn for RandomForestRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        validate_training_data(MODEL_NAME, x, y)?;
        let params = self.params;
        if params.oob_score && !params.bootstrap {
            return Err(EstimatorError::invalid_param(
                MODEL_NAME,
                "oob_score",
                "out-of-bag estimation requires bootstrap = true",
            ));
        }

        let mut seeder =
            Xoshiro256PlusPlus::seed_from_u64(params.random_state.unwrap_or_else(rand::random));
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| seeder.next_u64()).collect();

        log::debug!(
            "fitting {} trees on {} samples x {} features",
            params.n_estimators,
            x.nrows(),
            x.ncols()
        );
        let grown = run_with_threads(params.n_jobs, |parallelism| {
            parallelism.maybe_par_map(seeds.len(), |i| grow_tree(x, y, &params, seeds[i]))
        });

        let oob_score = if params.oob_score {
            Some(out_of_bag_score(&grown, x, y)?)
        } else {
            None
        };

        self.fitted = Some(FittedForest {
            trees: grown.into_iter().map(|g| g.tree).collect(),
            n_features: x.ncols(),
            n_outputs: y.ncols(),
            oob_score,
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted("estimators_")?;
        ensure_dim("random_forest features", fitted.n_features, x.ncols())?;

        let mut out = Array2::zeros((x.nrows(), fitted.n_outputs));
        for tree in &fitted.trees {
            out += &tree.predict(x)?;
        }
        if !fitted.trees.is_empty() {
            out /= fitted.trees.len() as f64;
        }
        Ok(out)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let p = &mut self.params;
        match name {
            "n_estimators" => {
                let n = value.as_usize(MODEL_NAME, name)?;
                if n == 0 {
                    return Err(EstimatorError::invalid_param(MODEL_NAME, name, "must be at least 1"));
                }
                p.n_estimators = n;
            }
            "bootstrap" => p.bootstrap = value.as_bool(MODEL_NAME, name)?,
            "oob_score" => p.oob_score = value.as_bool(MODEL_NAME, name)?,
            "random_state" => p.random_state = value.as_opt_u64(MODEL_NAME, name)?,
            "n_jobs" => p.n_jobs = value.as_opt_usize(MODEL_NAME, name)?.unwrap_or(0),
            _ => {
                if !p.tree.set_param(MODEL_NAME, name, value)? {
                    return Err(EstimatorError::unknown_param(MODEL_NAME, name));
                }
            }
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn name(&self) -> &'static str {
        MODEL_NAME
    }
}
