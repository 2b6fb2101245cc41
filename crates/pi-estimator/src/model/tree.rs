//! CART regression trees.
//!
//! Trees are grown greedily on squared error summed over all outputs, so a
//! single tree predicts every target column at once. The fitted tree uses
//! Structure-of-Arrays storage; child indices are local (0 = root).
//!
//! Samples go left when `x[feature] <= threshold`. NaN never satisfies the
//! comparison, so missing values always go right.

use ndarray::{Array1, Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::{validate_training_data, RegressorFn};
use crate::error::{ensure_dim, EstimatorError, Result};
use crate::params::ParamValue;

const MODEL_NAME: &str = "decision_tree";

/// Node index local to a tree.
pub type NodeId = u32;

// =============================================================================
// Parameters
// =============================================================================

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Every feature.
    #[default]
    All,
    /// A fixed count, capped at the number of features.
    Count(usize),
    /// A fraction in `(0, 1]` of the features (at least one).
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Count(c) => c,
            MaxFeatures::Fraction(f) => (f * n_features as f64).floor() as usize,
        };
        n.clamp(1, n_features.max(1))
    }

    pub(crate) fn from_param(model: &'static str, name: &str, value: ParamValue) -> Result<Self> {
        match value {
            ParamValue::None => Ok(MaxFeatures::All),
            ParamValue::Int(c) if c >= 1 => Ok(MaxFeatures::Count(c as usize)),
            ParamValue::Float(f) if f > 0.0 && f <= 1.0 => Ok(MaxFeatures::Fraction(f)),
            other => Err(EstimatorError::invalid_param(
                model,
                name,
                format!("expected None, a positive integer or a fraction in (0, 1], got {other:?}"),
            )),
        }
    }
}

/// Tree growth parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node.
    pub min_samples_split: usize,
    /// Minimum samples required in each child.
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

impl TreeParams {
    /// Apply one named parameter. Returns `Ok(false)` if the name is not a
    /// tree parameter so that ensembles can try their own names.
    pub(crate) fn set_param(
        &mut self,
        model: &'static str,
        name: &str,
        value: ParamValue,
    ) -> Result<bool> {
        match name {
            "max_depth" => {
                let depth = value.as_opt_usize(model, name)?;
                if depth == Some(0) {
                    return Err(EstimatorError::invalid_param(model, name, "must be at least 1"));
                }
                self.max_depth = depth;
            }
            "min_samples_split" => {
                let n = value.as_usize(model, name)?;
                if n < 2 {
                    return Err(EstimatorError::invalid_param(model, name, "must be at least 2"));
                }
                self.min_samples_split = n;
            }
            "min_samples_leaf" => {
                let n = value.as_usize(model, name)?;
                if n < 1 {
                    return Err(EstimatorError::invalid_param(model, name, "must be at least 1"));
                }
                self.min_samples_leaf = n;
            }
            "max_features" => self.max_features = MaxFeatures::from_param(model, name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

// =============================================================================
// Tree (SoA storage)
// =============================================================================

/// Fitted regression tree.
///
/// Every node stores the mean target vector of its training samples in
/// `node_values` (`n_nodes * n_outputs`, node-major); only leaf values are used
/// for prediction. `gains` holds the squared-error reduction of each split
/// (zero for leaves).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f64>,
    left_children: Vec<NodeId>,
    right_children: Vec<NodeId>,
    is_leaf: Vec<bool>,
    node_values: Vec<f64>,
    gains: Vec<f64>,
    n_features: usize,
    n_outputs: usize,
}

impl Tree {
    fn empty(n_features: usize, n_outputs: usize) -> Self {
        Self {
            split_indices: Vec::new(),
            split_thresholds: Vec::new(),
            left_children: Vec::new(),
            right_children: Vec::new(),
            is_leaf: Vec::new(),
            node_values: Vec::new(),
            gains: Vec::new(),
            n_features,
            n_outputs,
        }
    }

    fn push_leaf(&mut self, value: &[f64]) -> NodeId {
        let id = self.is_leaf.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.is_leaf.push(true);
        self.node_values.extend_from_slice(value);
        self.gains.push(0.0);
        id
    }

    fn make_split(&mut self, node: NodeId, split: &Split, left: NodeId, right: NodeId) {
        let i = node as usize;
        self.split_indices[i] = split.feature as u32;
        self.split_thresholds[i] = split.threshold;
        self.left_children[i] = left;
        self.right_children[i] = right;
        self.is_leaf[i] = false;
        self.gains[i] = split.gain;
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Depth of the deepest leaf (root-only tree has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(tree: &Tree, node: NodeId) -> usize {
            let i = node as usize;
            if tree.is_leaf[i] {
                0
            } else {
                1 + walk(tree, tree.left_children[i]).max(walk(tree, tree.right_children[i]))
            }
        }
        if self.n_nodes() == 0 {
            0
        } else {
            walk(self, 0)
        }
    }

    /// Mean target vector stored at `node`.
    #[inline]
    pub fn node_value(&self, node: NodeId) -> &[f64] {
        let start = node as usize * self.n_outputs;
        &self.node_values[start..start + self.n_outputs]
    }

    /// Find the leaf reached by `sample` (length `n_features`).
    #[inline]
    pub fn traverse_to_leaf(&self, sample: impl Fn(usize) -> f64) -> NodeId {
        let mut node = 0usize;
        while !self.is_leaf[node] {
            let value = sample(self.split_indices[node] as usize);
            node = if value <= self.split_thresholds[node] {
                self.left_children[node] as usize
            } else {
                self.right_children[node] as usize
            };
        }
        node as NodeId
    }

    /// Predict `[n_samples, n_outputs]`.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        ensure_dim("decision_tree features", self.n_features, x.ncols())?;
        let mut out = Array2::zeros((x.nrows(), self.n_outputs));
        for (row, mut target) in x.outer_iter().zip(out.outer_iter_mut()) {
            let leaf = self.traverse_to_leaf(|f| row[f]);
            for (t, &v) in target.iter_mut().zip(self.node_value(leaf)) {
                *t = v;
            }
        }
        Ok(out)
    }

    /// Impurity-based importances, normalized to sum to one.
    ///
    /// All zeros if the tree never split.
    pub fn feature_importances(&self) -> Array1<f64> {
        let mut importances = Array1::zeros(self.n_features);
        for node in 0..self.n_nodes() {
            if !self.is_leaf[node] {
                importances[self.split_indices[node] as usize] += self.gains[node];
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        importances
    }
}

// =============================================================================
// Tree growth
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    /// Squared-error reduction.
    gain: f64,
}

/// Greedy depth-first tree grower.
///
/// `indices` may contain repeated rows (bootstrap samples); repeats count as
/// separate samples.
pub(crate) struct TreeGrower<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView2<'a, f64>,
    params: TreeParams,
    n_candidates: usize,
    rng: Xoshiro256PlusPlus,
    feature_pool: Vec<usize>,
    order: Vec<usize>,
    tree: Tree,
}

impl<'a> TreeGrower<'a> {
    pub(crate) fn new(
        x: ArrayView2<'a, f64>,
        y: ArrayView2<'a, f64>,
        params: TreeParams,
        seed: u64,
    ) -> Self {
        let n_features = x.ncols();
        Self {
            x,
            y,
            params,
            n_candidates: params.max_features.resolve(n_features),
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            feature_pool: (0..n_features).collect(),
            order: Vec::new(),
            tree: Tree::empty(n_features, y.ncols()),
        }
    }

    pub(crate) fn grow(mut self, indices: &mut [usize]) -> Tree {
        self.grow_node(indices, 0);
        self.tree
    }

    fn grow_node(&mut self, indices: &mut [usize], depth: usize) -> NodeId {
        let n_outputs = self.y.ncols();
        let n = indices.len() as f64;

        let mut sums = vec![0.0; n_outputs];
        let mut sum_sq = 0.0;
        for &row in indices.iter() {
            for (o, s) in sums.iter_mut().enumerate() {
                let v = self.y[[row, o]];
                *s += v;
                sum_sq += v * v;
            }
        }
        let mean: Vec<f64> = sums.iter().map(|s| s / n).collect();
        let node = self.tree.push_leaf(&mean);

        let sse = sum_sq - sums.iter().map(|s| s * s).sum::<f64>() / n;
        let depth_exhausted = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_exhausted
            || indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf
            || sse <= 1e-12 * sum_sq.max(1.0)
        {
            return node;
        }

        let Some(split) = self.find_split(indices, &sums) else {
            return node;
        };

        let n_left = partition(indices, |row| self.x[[row, split.feature]] <= split.threshold);
        let (left_rows, right_rows) = indices.split_at_mut(n_left);
        let left = self.grow_node(left_rows, depth + 1);
        let right = self.grow_node(right_rows, depth + 1);
        self.tree.make_split(node, &split, left, right);
        node
    }

    /// Best split among a random subset of features.
    ///
    /// Maximizes `Σ_o (L_o² / n_L + R_o² / n_R)`, which is equivalent to
    /// minimizing the children's summed squared error.
    fn find_split(&mut self, indices: &[usize], totals: &[f64]) -> Option<Split> {
        let n = indices.len();
        let n_outputs = totals.len();
        let min_leaf = self.params.min_samples_leaf;
        let parent_score = totals.iter().map(|t| t * t).sum::<f64>() / n as f64;

        // Partial Fisher–Yates: the first `n_candidates` entries are the sample.
        let n_features = self.feature_pool.len();
        for i in 0..self.n_candidates {
            let j = self.rng.random_range(i..n_features);
            self.feature_pool.swap(i, j);
        }

        let mut best: Option<Split> = None;
        let mut best_score = f64::NEG_INFINITY;
        let mut left_sums = vec![0.0; n_outputs];

        for c in 0..self.n_candidates {
            let feature = self.feature_pool[c];
            let x = self.x;
            self.order.clear();
            self.order.extend_from_slice(indices);
            self.order
                .sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            left_sums.iter_mut().for_each(|s| *s = 0.0);
            for i in 0..n - 1 {
                let row = self.order[i];
                for (o, s) in left_sums.iter_mut().enumerate() {
                    *s += self.y[[row, o]];
                }

                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let value = x[[row, feature]];
                let next = x[[self.order[i + 1], feature]];
                if !(value < next) {
                    continue;
                }

                let score: f64 = left_sums
                    .iter()
                    .zip(totals)
                    .map(|(&l, &t)| l * l / n_left as f64 + (t - l) * (t - l) / n_right as f64)
                    .sum();

                if score > best_score {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best_score = score;
                    best = Some(Split {
                        feature,
                        threshold,
                        gain: 0.0,
                    });
                }
            }
        }

        best.map(|mut split| {
            split.gain = (best_score - parent_score).max(0.0);
            split
        })
    }
}

/// Move elements satisfying `pred` to the front; returns their count.
fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut next = 0;
    for i in 0..items.len() {
        if pred(items[i]) {
            items.swap(next, i);
            next += 1;
        }
    }
    next
}

// =============================================================================
// DecisionTreeRegressor
// =============================================================================

/// Single CART regression tree.
///
/// # Parameters
///
/// `max_depth`, `min_samples_split`, `min_samples_leaf`, `max_features`
/// (see [`TreeParams`]) and `random_state` (seed for feature subsampling).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    pub params: TreeParams,
    pub random_state: Option<u64>,
    tree: Option<Tree>,
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            random_state: None,
            tree: None,
        }
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn feature_importances(&self) -> Result<Array1<f64>> {
        self.fitted("feature_importances_")
            .map(Tree::feature_importances)
    }

    fn fitted(&self, attribute: &'static str) -> Result<&Tree> {
        self.tree.as_ref().ok_or(EstimatorError::NotFitted { attribute })
    }
}

impl RegressorFn for DecisionTreeRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        validate_training_data(MODEL_NAME, x, y)?;
        let seed = self.random_state.unwrap_or_else(rand::random);
        let mut indices: Vec<usize> = (0..x.nrows()).collect();
        self.tree = Some(TreeGrower::new(x.reborrow(), y.reborrow(), self.params, seed).grow(&mut indices));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fitted("tree_")?.predict(x)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        if name == "random_state" {
            self.random_state = value.as_opt_u64(MODEL_NAME, name)?;
            return Ok(());
        }
        if self.params.set_param(MODEL_NAME, name, value)? {
            Ok(())
        } else {
            Err(EstimatorError::unknown_param(MODEL_NAME, name))
        }
    }

    fn is_fitted(&self) -> bool {
        self.tree.is_some()
    }

    fn name(&self) -> &'static str {
        MODEL_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array2<f64>) {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![[0.0, 5.0], [0.0, 5.0], [0.0, 5.0], [1.0, -5.0], [1.0, -5.0], [1.0, -5.0]];
        (x, y)
    }

    #[test]
    fn single_split_separates_step() {
        let (x, y) = step_data();
        let mut model = DecisionTreeRegressor::default();
        model.fit(x.view(), y.view()).unwrap();

        let tree = model.tree().unwrap();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.depth(), 1);
        assert_abs_diff_eq!(tree.split_thresholds[0], 6.5);
        assert_abs_diff_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn unlimited_depth_interpolates_training_data() {
        let x = array![[0.3, 1.0], [0.1, 2.0], [0.9, 0.5], [0.5, 0.7], [0.7, 3.0]];
        let y = array![[1.0], [4.0], [2.0], [8.0], [3.0]];
        let mut model = DecisionTreeRegressor::default();
        model.fit(x.view(), y.view()).unwrap();
        assert_abs_diff_eq!(model.predict(x.view()).unwrap(), y, epsilon = 1e-12);
    }

    #[test]
    fn max_depth_limits_growth() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y = Array2::from_shape_fn((32, 1), |(i, _)| (i * i) as f64);
        let mut model = DecisionTreeRegressor::default();
        model.set_param("max_depth", ParamValue::Int(2)).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        let tree = model.tree().unwrap();
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let (x, y) = step_data();
        let mut model = DecisionTreeRegressor::default();
        model.set_param("min_samples_leaf", ParamValue::Int(4)).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        // 6 samples cannot be split into two leaves of 4
        assert_eq!(model.tree().unwrap().n_nodes(), 1);
    }

    #[test]
    fn importances_point_at_informative_feature() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as f64 } else { 1.0 });
        let y = Array2::from_shape_fn((20, 1), |(i, _)| if i < 10 { 0.0 } else { 1.0 });
        let mut model = DecisionTreeRegressor::default();
        model.fit(x.view(), y.view()).unwrap();
        let imp = model.feature_importances().unwrap();
        assert_abs_diff_eq!(imp, array![1.0, 0.0]);
    }

    #[test]
    fn nan_goes_right() {
        let (x, y) = step_data();
        let mut model = DecisionTreeRegressor::default();
        model.fit(x.view(), y.view()).unwrap();
        let pred = model.predict(array![[f64::NAN]].view()).unwrap();
        assert_abs_diff_eq!(pred, array![[1.0, -5.0]]);
    }

    #[test]
    fn rejects_invalid_params() {
        let mut model = DecisionTreeRegressor::default();
        assert!(model.set_param("max_depth", ParamValue::Int(0)).is_err());
        assert!(model.set_param("min_samples_split", ParamValue::Int(1)).is_err());
        assert!(model.set_param("max_features", ParamValue::Float(1.5)).is_err());
        assert!(matches!(
            model.set_param("n_estimators", ParamValue::Int(10)),
            Err(EstimatorError::UnknownParam { .. })
        ));
    }

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::All.resolve(5), 5);
        assert_eq!(MaxFeatures::Count(10).resolve(5), 5);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(5), 2);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(5), 1);
    }
}
