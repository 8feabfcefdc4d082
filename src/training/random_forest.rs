//! Random Forest regressor

use crate::error::{KolosalError, Result};
use super::decision_tree::{DecisionTree, MaxFeatures};
use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (all of them for regression by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: None,
            feature_importances: None,
            n_features: 0,
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

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(ParameterValue::Int(0).invalid("n_estimators", "must be at least 1"));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let base_seed = self.random_state.unwrap_or_else(rand::random);

        // Build trees in parallel; each tree owns a seeded stream.
        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(self.max_features)
                    .with_random_state(rng.next_u64());
                tree.max_depth = self.max_depth;

                tree.fit_indices(x, y, &sample_indices)?;
                Ok(tree)
            })
            .collect();
        let trees = trees?;

        let mut importances = Array1::<f64>::zeros(n_features);
        for tree in &trees {
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
        }
        importances /= trees.len() as f64;

        self.trees = trees;
        self.n_features = n_features;
        self.feature_importances = Some(importances);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let per_tree: Result<Vec<Array1<f64>>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect();

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for pred in per_tree? {
            sum += &pred;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.to_usize(name)?,
            "max_depth" => self.max_depth = value.to_optional_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.to_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.to_usize(name)?,
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "bootstrap" => self.bootstrap = value.to_bool(name)?,
            "random_state" => self.random_state = value.to_optional_usize(name)?.map(|s| s as u64),
            _ => return Err(unknown_param("RandomForest", name, value)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let n = 60;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 7) as f64 });
        let y = Array1::from_shape_fn(n, |i| if i < 30 { 1.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn test_forest_fits_step_function() {
        let (x, y) = step_data();
        let mut rf = RandomForest::new(20).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.n_trees(), 20);
        let score = rf.score(&x, &y).unwrap();
        assert!(score > 0.9, "R² too low: {}", score);
    }

    #[test]
    fn test_seeded_forest_is_deterministic() {
        let (x, y) = step_data();
        let mut a = RandomForest::new(10).with_random_state(7);
        let mut b = RandomForest::new(10).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = step_data();
        let mut rf = RandomForest::new(10).with_random_state(1);
        rf.fit(&x, &y).unwrap();
        let imp = rf.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_set_param_and_unfitted() {
        let mut rf = RandomForest::default();
        rf.set_param("n_estimators", &ParameterValue::Int(300)).unwrap();
        rf.set_param("max_depth", &ParameterValue::Int(20)).unwrap();
        assert_eq!(rf.n_estimators, 300);
        assert_eq!(rf.max_depth, Some(20));
        assert!(rf.set_param("learning_rate", &ParameterValue::Float(0.1)).is_err());
        assert!(matches!(rf.predict(&Array2::zeros((1, 2))), Err(KolosalError::ModelNotFitted)));
    }
}
