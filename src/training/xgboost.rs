//! XGBoost-style random forest regressor (XGBRF)
//!
//! A single boosting round that grows `n_estimators` trees in parallel on the
//! same second-order statistics, averaging them into one forest:
//! - Squared error loss: gradient `pred - y`, hessian 1
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Row subsampling per tree, column subsampling per node

use crate::error::{KolosalError, Result};
use crate::optimizer::ParameterValue;
use crate::training::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBRF configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBRFConfig {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Shrinkage applied to the averaged forest output
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    /// Row fraction sampled without replacement per tree
    pub subsample: f64,
    /// Column fraction sampled at every node
    pub colsample_bynode: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBRFConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 1.0,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1e-5,
            gamma: 0.0,
            subsample: 0.8,
            colsample_bynode: 0.8,
            random_state: None,
        }
    }
}

/// A single node in an XGB tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Shared inputs for growing one tree
struct TreeContext<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    config: &'a XGBRFConfig,
}

/// Build an XGB tree using exact greedy split finding
fn build_xgb_tree(ctx: &TreeContext, indices: &[usize], depth: usize, rng: &mut Xoshiro256PlusPlus) -> XGBNode {
    let config = ctx.config;
    let g_sum: f64 = indices.iter().map(|&i| ctx.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| ctx.hess[i]).sum();
    let leaf = XGBNode::Leaf { weight: compute_leaf_weight(g_sum, h_sum, config.reg_lambda) };

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return leaf;
    }

    let features = subsample(rng, ctx.x.ncols(), config.colsample_bynode);
    let best_split = features
        .iter()
        .filter_map(|&f| find_best_split_for_feature(ctx, indices, f))
        .fold(None, |best: Option<(usize, f64, f64)>, cand| match best {
            Some(b) if b.2 >= cand.2 => Some(b),
            _ => Some(cand),
        });

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| ctx.x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return leaf;
            }

            let left = build_xgb_tree(ctx, &left_idx, depth + 1, rng);
            let right = build_xgb_tree(ctx, &right_idx, depth + 1, rng);
            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => leaf,
    }
}

/// Optimal leaf weight with L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64) -> f64 {
    -g_sum / (h_sum + lambda)
}

/// Best (feature, threshold, gain) for one feature
fn find_best_split_for_feature(ctx: &TreeContext, indices: &[usize], feature: usize) -> Option<(usize, f64, f64)> {
    let x = ctx.x;
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted.iter().map(|&i| ctx.grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| ctx.hess[i]).sum();
    let lambda = ctx.config.reg_lambda;
    let min_child = ctx.config.min_child_weight;

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(usize, f64, f64)> = None;

    for pos in 0..sorted.len().saturating_sub(1) {
        let idx = sorted[pos];
        let next = sorted[pos + 1];
        g_left += ctx.grad[idx];
        h_left += ctx.hess[idx];

        if x[[idx, feature]] >= x[[next, feature]] {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < min_child || h_right < min_child {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |b| gain > b.2) {
            let mut threshold = (x[[idx, feature]] + x[[next, feature]]) / 2.0;
            if threshold >= x[[next, feature]] {
                threshold = x[[idx, feature]];
            }
            best = Some((feature, threshold, gain));
        }
    }
    best
}

/// Sorted sample of `ceil(n * ratio)` indices (at least one), or all of them.
fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64 * ratio).ceil() as usize).clamp(1, n);
    let mut picked = rand::seq::index::sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

/// XGBoost random forest regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBRFRegressor {
    pub config: XGBRFConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl Default for XGBRFRegressor {
    fn default() -> Self {
        Self::new(XGBRFConfig::default())
    }
}

impl XGBRFRegressor {
    pub fn new(config: XGBRFConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.n_estimators == 0 {
            return Err(ParameterValue::Int(0).invalid("n_estimators", "must be at least 1"));
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(ParameterValue::Float(c.subsample).invalid("subsample", "must be in (0, 1]"));
        }
        if !(c.colsample_bynode > 0.0 && c.colsample_bynode <= 1.0) {
            return Err(ParameterValue::Float(c.colsample_bynode).invalid("colsample_bynode", "must be in (0, 1]"));
        }
        Ok(())
    }

    /// Compute feature importances by counting splits across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

fn count_splits(node: &XGBNode, counts: &mut [f64]) {
    if let XGBNode::Split { feature, left, right, .. } = node {
        counts[*feature] += 1.0;
        count_splits(left, counts);
        count_splits(right, counts);
    }
}

impl Regressor for XGBRFRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let n_samples = x.nrows();
        self.base_score = y.mean().unwrap_or(0.0);

        let grad: Array1<f64> = y.mapv(|v| self.base_score - v);
        let hess = Array1::from_elem(n_samples, 1.0);
        let ctx = TreeContext {
            x,
            grad: &grad,
            hess: &hess,
            config: &self.config,
        };
        let base_seed = self.config.random_state.unwrap_or_else(rand::random);

        let trees: Vec<XGBNode> = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(base_seed.wrapping_add(t as u64));
                let rows = subsample(&mut rng, n_samples, ctx.config.subsample);
                build_xgb_tree(&ctx, &rows, 0, &mut rng)
            })
            .collect();

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let scale = self.config.learning_rate / self.trees.len() as f64;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let forest: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
                self.base_score + scale * forest
            })
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        let c = &mut self.config;
        match name {
            "n_estimators" => c.n_estimators = value.to_usize(name)?,
            "learning_rate" => c.learning_rate = value.to_f64(name)?,
            "max_depth" => c.max_depth = value.to_usize(name)?,
            "min_child_weight" => c.min_child_weight = value.to_f64(name)?,
            "reg_lambda" => c.reg_lambda = value.to_f64(name)?,
            "gamma" => c.gamma = value.to_f64(name)?,
            "subsample" => c.subsample = value.to_f64(name)?,
            "colsample_bynode" => c.colsample_bynode = value.to_f64(name)?,
            "random_state" => c.random_state = value.to_optional_usize(name)?.map(|s| s as u64),
            _ => return Err(unknown_param("XGBRFRegressor", name, value)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
