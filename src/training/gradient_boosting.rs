//! Gradient Boosting regressor
//!
//! Squared-error gradient boosting: each round fits a depth-limited
//! regression tree to the current residuals, optionally on a row subsample,
//! and adds it to the ensemble scaled by the learning rate.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use crate::error::{KolosalError, Result};
use crate::optimizer::ParameterValue;

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: Some(3),
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: None,
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
    n_features: usize,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
            n_features: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.n_estimators == 0 {
            return Err(ParameterValue::Int(0).invalid("n_estimators", "must be at least 1"));
        }
        if !(c.learning_rate > 0.0) {
            return Err(ParameterValue::Float(c.learning_rate).invalid("learning_rate", "must be positive"));
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(ParameterValue::Float(c.subsample).invalid("subsample", "must be in (0, 1]"));
        }
        Ok(())
    }

    fn subsample_indices(&self, n_samples: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n_samples).collect();
        }
        let n_sub = ((n_samples as f64 * self.config.subsample) as usize).max(1);
        let mut indices = rand::seq::index::sample(rng, n_samples, n_sub).into_vec();
        indices.sort_unstable();
        indices
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        self.trees.clear();
        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y - &predictions;
            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let mut tree = DecisionTree::new()
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(rng.next_u64());
            tree.max_depth = self.config.max_depth;
            tree.fit_indices(x, &residuals, &sample_indices)?;

            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            if let Some(imp) = tree.feature_importances() {
                for (acc, v) in importances.iter_mut().zip(imp.iter()) {
                    *acc += v;
                }
            }
            self.trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = importances;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);
        }
        Ok(predictions)
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        let c = &mut self.config;
        match name {
            "n_estimators" => c.n_estimators = value.to_usize(name)?,
            "learning_rate" => c.learning_rate = value.to_f64(name)?,
            "max_depth" => c.max_depth = value.to_optional_usize(name)?,
            "min_samples_split" => c.min_samples_split = value.to_usize(name)?,
            "min_samples_leaf" => c.min_samples_leaf = value.to_usize(name)?,
            "subsample" => c.subsample = value.to_f64(name)?,
            "random_state" => c.random_state = value.to_optional_usize(name)?.map(|s| s as u64),
            _ => return Err(unknown_param("GradientBoostingRegressor", name, value)),
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

    fn quadratic() -> (Array2<f64>, Array1<f64>) {
        let n = 80;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64 / 8.0);
        let y = x.column(0).mapv(|v| v * v);
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_regressor() {
        let (x, y) = quadratic();
        let mut gb = GradientBoostingRegressor::default();
        gb.fit(&x, &y).unwrap();

        assert_eq!(gb.n_trees(), 100);
        let score = gb.score(&x, &y).unwrap();
        assert!(score > 0.95, "R² too low: {}", score);
    }

    #[test]
    fn test_more_rounds_fit_better() {
        let (x, y) = quadratic();
        let config = GradientBoostingConfig {
            n_estimators: 5,
            learning_rate: 0.05,
            ..Default::default()
        };
        let mut few = GradientBoostingRegressor::new(config.clone());
        let mut many = GradientBoostingRegressor::new(GradientBoostingConfig { n_estimators: 200, ..config });
        few.fit(&x, &y).unwrap();
        many.fit(&x, &y).unwrap();

        assert!(many.score(&x, &y).unwrap() > few.score(&x, &y).unwrap());
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = quadratic();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.8,
            random_state: Some(3),
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_invalid_subsample() {
        let (x, y) = quadratic();
        let mut gb = GradientBoostingRegressor::default();
        gb.set_param("subsample", &ParameterValue::Float(1.5)).unwrap();
        assert!(matches!(gb.fit(&x, &y), Err(KolosalError::InvalidParameter { .. })));
    }
}
