//! Decision tree regressor (CART, squared-error criterion)

use crate::error::{KolosalError, Result};
use crate::optimizer::ParameterValue;
use crate::training::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Node count below which the feature scan stays on the current thread.
const PAR_SCAN_MIN_SAMPLES: usize = 512;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    /// Fraction of the feature count, in (0, 1]
    Fraction(f64),
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a feature count for `n_features` columns (at least 1).
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (f * n_features as f64) as usize,
            MaxFeatures::Count(c) => *c,
        };
        k.clamp(1, n_features.max(1))
    }

    pub fn from_param(name: &str, value: &ParameterValue) -> Result<Self> {
        match value {
            ParameterValue::None => Ok(MaxFeatures::All),
            ParameterValue::String(s) => match s.as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                _ => Err(value.invalid(name, "expected 'sqrt', 'log2', a count or a fraction")),
            },
            ParameterValue::Int(_) => Ok(MaxFeatures::Count(value.to_usize(name)?)),
            ParameterValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            _ => Err(value.invalid(name, "expected 'sqrt', 'log2', a count or a fraction")),
        }
    }
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Reduction in the node's sum of squared errors
    gain: f64,
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth (`None` grows until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Seed for per-split feature sampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(ParameterValue::Int(self.min_samples_split as i64)
                .invalid("min_samples_split", "must be at least 2"));
        }
        if self.min_samples_leaf < 1 {
            return Err(ParameterValue::Int(self.min_samples_leaf as i64)
                .invalid("min_samples_leaf", "must be at least 1"));
        }
        Ok(())
    }

    /// Fit on the rows of `x` listed in `indices`.
    ///
    /// Ensembles use this to train on bootstrap samples without copying `x`;
    /// repeated indices act as sample multiplicity.
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;
        if indices.is_empty() {
            return Err(KolosalError::ValidationError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        let n_features = x.ncols();
        self.n_features = n_features;

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut importances = vec![0.0; n_features];
        let root = self.build_tree(x, y, indices, 0, &mut importances, &mut rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
        let mean = sum / n_samples as f64;
        let sse = sq_sum - sum * sum / n_samples as f64;
        let leaf = TreeNode::Leaf { value: mean, n_samples };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || sse <= 1e-12 * (1.0 + sq_sum);

        if should_stop {
            return leaf;
        }

        let features = self.candidate_features(x.ncols(), rng);
        let Some(split) = self.find_best_split(x, y, indices, &features) else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

        importances[split.feature_idx] += split.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.resolve(n_features);
        if k >= n_features {
            return (0..n_features).collect();
        }
        let mut picked = rand::seq::index::sample(rng, n_features, k).into_vec();
        picked.sort_unstable();
        picked
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let scan = |&f: &usize| self.best_split_for_feature(x, y, indices, f);
        let results: Vec<Option<SplitCandidate>> = if indices.len() >= PAR_SCAN_MIN_SAMPLES {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // first feature wins ties
        results.into_iter().flatten().fold(None, |best, cand| match best {
            Some(b) if b.gain >= cand.gain => Some(b),
            _ => Some(cand),
        })
    }

    /// Sorted prefix-sum scan over one feature.
    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
    ) -> Option<SplitCandidate> {
        let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        let total: f64 = pairs.iter().map(|p| p.1).sum();
        let parent_proxy = total * total / n as f64;

        let mut left_sum = 0.0;
        let mut best: Option<SplitCandidate> = None;
        for i in 1..n {
            left_sum += pairs[i - 1].1;
            if pairs[i - 1].0 >= pairs[i].0 {
                continue;
            }
            let n_left = i;
            let n_right = n - i;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            let proxy = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            let gain = proxy - parent_proxy;
            if best.map_or(true, |b| gain > b.gain) {
                let mut threshold = (pairs[i - 1].0 + pairs[i].0) / 2.0;
                // midpoint can round up to the right value for adjacent floats
                if threshold >= pairs[i].0 {
                    threshold = pairs[i - 1].0;
                }
                best = Some(SplitCandidate { feature_idx, threshold, gain });
            }
        }
        best
    }

    /// Prediction for a single row
    pub fn predict_row(&self, sample: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        Ok(root.predict(sample))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

impl Regressor for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        check_n_features(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| root.predict(row)).collect())
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = value.to_optional_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.to_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.to_usize(name)?,
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "random_state" => self.random_state = value.to_optional_usize(name)?.map(|s| s as u64),
            _ => return Err(unknown_param("DecisionTree", name, value)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}
