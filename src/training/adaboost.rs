//! AdaBoost regressor (AdaBoost.R2)
//!
//! Each round fits a shallow regression tree on a bootstrap sample drawn
//! according to the current sample weights, then reweights samples by their
//! normalised prediction error. The ensemble predicts the weighted median of
//! its members.

use crate::error::{KolosalError, Result};
use crate::optimizer::ParameterValue;
use crate::training::decision_tree::DecisionTree;
use crate::training::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Loss used to turn absolute errors into per-sample losses in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum AdaBoostLoss {
    #[default]
    Linear,
    Square,
    Exponential,
}

impl AdaBoostLoss {
    fn apply(&self, normalized_error: f64) -> f64 {
        match self {
            AdaBoostLoss::Linear => normalized_error,
            AdaBoostLoss::Square => normalized_error * normalized_error,
            AdaBoostLoss::Exponential => 1.0 - (-normalized_error).exp(),
        }
    }
}

/// AdaBoost.R2 regressor over depth-limited trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    /// Depth of each base tree
    pub base_max_depth: usize,
    pub random_state: Option<u64>,
    estimators: Vec<DecisionTree>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            base_max_depth: 3,
            random_state: None,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of boosting rounds actually kept
    pub fn n_fitted_estimators(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(ParameterValue::Int(0).invalid("n_estimators", "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ParameterValue::Float(self.learning_rate).invalid("learning_rate", "must be positive"));
        }

        let n_samples = x.nrows();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut weights = vec![1.0 / n_samples as f64; n_samples];

        self.estimators.clear();
        self.estimator_weights.clear();

        for round in 0..self.n_estimators {
            let sampler = WeightedIndex::new(&weights)
                .map_err(|e| KolosalError::ComputationError(format!("invalid sample weights: {}", e)))?;
            let bootstrap: Vec<usize> = (0..n_samples).map(|_| sampler.sample(&mut rng)).collect();

            let mut tree = DecisionTree::new()
                .with_max_depth(self.base_max_depth)
                .with_random_state(rng.next_u64());
            tree.fit_indices(x, y, &bootstrap)?;

            let pred = tree.predict(x)?;
            let abs_err: Vec<f64> = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).collect();
            let max_err = abs_err.iter().cloned().fold(0.0, f64::max);
            let losses: Vec<f64> = abs_err
                .iter()
                .map(|e| self.loss.apply(if max_err > 0.0 { e / max_err } else { 0.0 }))
                .collect();
            let estimator_error: f64 = weights.iter().zip(losses.iter()).map(|(w, l)| w * l).sum();

            if estimator_error <= 0.0 {
                // perfect fit: keep it and stop
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }
            if estimator_error >= 0.5 {
                // worse than chance; only kept when nothing else exists
                if self.estimators.is_empty() {
                    self.estimators.push(tree);
                    self.estimator_weights.push(1.0);
                }
                tracing::debug!(round, estimator_error, "AdaBoost stopped early");
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            self.estimators.push(tree);
            self.estimator_weights.push(self.learning_rate * (1.0 / beta).ln());

            if round + 1 < self.n_estimators {
                for (w, l) in weights.iter_mut().zip(losses.iter()) {
                    *w *= beta.powf((1.0 - l) * self.learning_rate);
                }
                let total: f64 = weights.iter().sum();
                if !(total > 0.0) {
                    break;
                }
                for w in weights.iter_mut() {
                    *w /= total;
                }
            }
        }

        self.n_features = x.ncols();
        Ok(())
    }

    /// Weighted median of the member predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let member_preds: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|e| e.predict(x))
            .collect::<Result<_>>()?;

        let total_weight: f64 = self.estimator_weights.iter().sum();
        let mut out = Array1::zeros(x.nrows());
        let mut order: Vec<usize> = (0..self.estimators.len()).collect();

        for (i, slot) in out.iter_mut().enumerate() {
            order.sort_by(|&a, &b| member_preds[a][i].total_cmp(&member_preds[b][i]));
            let mut cdf = 0.0;
            let mut chosen = order[order.len() - 1];
            for &m in &order {
                cdf += self.estimator_weights[m];
                if cdf >= 0.5 * total_weight {
                    chosen = m;
                    break;
                }
            }
            *slot = member_preds[chosen][i];
        }
        Ok(out)
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.to_usize(name)?,
            "learning_rate" => self.learning_rate = value.to_f64(name)?,
            "loss" => {
                self.loss = match value.to_str(name)? {
                    "linear" => AdaBoostLoss::Linear,
                    "square" => AdaBoostLoss::Square,
                    "exponential" => AdaBoostLoss::Exponential,
                    _ => return Err(value.invalid(name, "expected 'linear', 'square' or 'exponential'")),
                }
            }
            "random_state" => self.random_state = value.to_optional_usize(name)?.map(|s| s as u64),
            _ => return Err(unknown_param("AdaBoostRegressor", name, value)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn wave() -> (Array2<f64>, Array1<f64>) {
        let n = 100;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64 / 10.0);
        let y = x.column(0).mapv(|v| v.sin() * 3.0 + v);
        (x, y)
    }

    #[test]
    fn test_adaboost_regressor() {
        let (x, y) = wave();
        let mut model = AdaBoostRegressor::default().with_random_state(0);
        model.fit(&x, &y).unwrap();

        assert!(model.n_fitted_estimators() >= 1);
        let score = model.score(&x, &y).unwrap();
        assert!(score > 0.85, "R² too low: {}", score);
    }

    #[test]
    fn test_perfect_fit_stops_early() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![2.0, 2.0, 2.0, 2.0];

        let mut model = AdaBoostRegressor::new(20, 1.0).with_random_state(3);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_fitted_estimators(), 1);
        assert_eq!(model.estimator_weights(), &[1.0]);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_weighted_median_with_single_member() {
        let (x, y) = wave();
        let mut model = AdaBoostRegressor::new(1, 0.1).with_random_state(9);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_fitted_estimators(), 1);
        assert_eq!(model.predict(&x).unwrap(), model.estimators[0].predict(&x).unwrap());
    }

    #[test]
    fn test_loss_param() {
        let mut model = AdaBoostRegressor::default();
        model.set_param("loss", &ParameterValue::from("square")).unwrap();
        assert_eq!(model.loss, AdaBoostLoss::Square);
        assert!(model.set_param("loss", &ParameterValue::from("huber")).is_err());
        assert!((AdaBoostLoss::Exponential.apply(0.0)).abs() < 1e-12);
    }
}
