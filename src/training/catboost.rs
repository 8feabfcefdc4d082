//! CatBoost-style gradient boosting with oblivious trees
//!
//! - Symmetric (oblivious) decision trees: all nodes at same depth use the same split
//! - Features are quantized once into at most `border_count` borders
//! - Newton leaf values with L2 regularization (`l2_leaf_reg`)

use crate::error::{KolosalError, Result};
use crate::optimizer::ParameterValue;
use crate::training::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    /// Boosting iterations (`iterations`)
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of every symmetric tree (`depth`)
    pub max_depth: usize,
    /// L2 regularization on leaf values (`l2_leaf_reg`)
    pub reg_lambda: f64,
    /// Maximum number of split borders per feature
    pub border_count: usize,
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            reg_lambda: 3.0,
            border_count: 254,
            subsample: 1.0,
            random_state: None,
        }
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>, // (feature, threshold) per level
    leaf_values: Vec<f64>,     // 2^levels leaf values
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        self.leaf_values[idx]
    }
}

/// Per-feature borders and the bin of every training value
struct Quantized {
    borders: Vec<Vec<f64>>,
    bins: Vec<Vec<usize>>,
}

impl Quantized {
    fn new(x: &Array2<f64>, border_count: usize) -> Self {
        let (borders, bins): (Vec<Vec<f64>>, Vec<Vec<usize>>) = x
            .columns()
            .into_iter()
            .map(|col| {
                let mut uniq: Vec<f64> = col.to_vec();
                uniq.sort_by(|a, b| a.total_cmp(b));
                uniq.dedup();

                let midpoints: Vec<f64> = uniq.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
                let borders = if midpoints.len() <= border_count {
                    midpoints
                } else {
                    // evenly spaced over the distinct values
                    let mut picked: Vec<f64> = (1..=border_count)
                        .map(|k| midpoints[k * midpoints.len() / (border_count + 1)])
                        .collect();
                    picked.dedup();
                    picked
                };
                let bins = col.iter().map(|&v| borders.partition_point(|&b| b < v)).collect();
                (borders, bins)
            })
            .unzip();
        Self { borders, bins }
    }
}

fn build_symmetric_tree(
    q: &Quantized,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    max_depth: usize,
    reg_lambda: f64,
) -> SymmetricTree {
    let mut splits = Vec::with_capacity(max_depth);
    let mut buckets: Vec<Vec<usize>> = vec![indices.to_vec()];

    for _depth in 0..max_depth {
        // One split shared by every bucket at this level
        let candidates: Vec<(usize, usize, f64)> = (0..q.borders.len())
            .into_par_iter()
            .filter_map(|feat| {
                let n_borders = q.borders[feat].len();
                if n_borders == 0 {
                    return None;
                }
                let bins = &q.bins[feat];
                let mut gains = vec![0.0; n_borders];

                for bucket in &buckets {
                    let mut g_hist = vec![0.0; n_borders + 1];
                    let mut h_hist = vec![0.0; n_borders + 1];
                    for &i in bucket {
                        g_hist[bins[i]] += gradients[i];
                        h_hist[bins[i]] += hessians[i];
                    }
                    let g_total: f64 = g_hist.iter().sum();
                    let h_total: f64 = h_hist.iter().sum();
                    let parent = g_total * g_total / (h_total + reg_lambda);

                    let (mut gl, mut hl) = (0.0, 0.0);
                    for (j, gain) in gains.iter_mut().enumerate() {
                        gl += g_hist[j];
                        hl += h_hist[j];
                        let (gr, hr) = (g_total - gl, h_total - hl);
                        *gain += gl * gl / (hl + reg_lambda) + gr * gr / (hr + reg_lambda) - parent;
                    }
                }

                let (border, gain) = gains
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (j, &g)| if g > best.1 { (j, g) } else { best });
                Some((feat, border, gain))
            })
            .collect();

        let best = candidates.into_iter().fold(None, |best: Option<(usize, usize, f64)>, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        });

        match best {
            Some((feat, border, gain)) if gain > 1e-12 => {
                let bins = &q.bins[feat];
                splits.push((feat, q.borders[feat][border]));
                let mut new_buckets = Vec::with_capacity(buckets.len() * 2);
                for bucket in &buckets {
                    let (left, right): (Vec<usize>, Vec<usize>) =
                        bucket.iter().partition(|&&i| bins[i] <= border);
                    new_buckets.push(left);
                    new_buckets.push(right);
                }
                buckets = new_buckets;
            }
            _ => break,
        }
    }

    let leaf_values: Vec<f64> = buckets
        .iter()
        .map(|bucket| {
            let g: f64 = bucket.iter().map(|&i| gradients[i]).sum();
            let h: f64 = bucket.iter().map(|&i| hessians[i]).sum();
            -g / (h + reg_lambda)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl Default for CatBoostRegressor {
    fn default() -> Self {
        Self::new(CatBoostConfig::default())
    }
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self { config, trees: Vec::new(), base_prediction: 0.0, n_features: 0 }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.n_estimators == 0 {
            return Err(ParameterValue::Int(0).invalid("iterations", "must be at least 1"));
        }
        if c.max_depth > 16 {
            return Err(ParameterValue::Int(c.max_depth as i64).invalid("depth", "must be at most 16"));
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(ParameterValue::Float(c.subsample).invalid("subsample", "must be in (0, 1]"));
        }
        Ok(())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for CatBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let n = x.nrows();
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let quantized = Quantized::new(x, self.config.border_count);

        self.trees.clear();
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);
        let hessians: Vec<f64> = vec![1.0; n];

        for _ in 0..self.config.n_estimators {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();

            let indices: Vec<usize> = if self.config.subsample < 1.0 {
                let k = ((n as f64 * self.config.subsample).ceil() as usize).clamp(1, n);
                let mut sub = rand::seq::index::sample(&mut rng, n, k).into_vec();
                sub.sort_unstable();
                sub
            } else {
                (0..n).collect()
            };

            let tree = build_symmetric_tree(
                &quantized,
                &gradients,
                &hessians,
                &indices,
                self.config.max_depth,
                self.config.reg_lambda,
            );

            for (i, row) in x.rows().into_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let lr = self.config.learning_rate;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.base_prediction + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>())
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        let c = &mut self.config;
        match name {
            "iterations" | "n_estimators" => c.n_estimators = value.to_usize(name)?,
            "learning_rate" => c.learning_rate = value.to_f64(name)?,
            "depth" | "max_depth" => c.max_depth = value.to_usize(name)?,
            "l2_leaf_reg" | "reg_lambda" => c.reg_lambda = value.to_f64(name)?,
            "border_count" => c.border_count = value.to_usize(name)?.max(1),
            "subsample" => c.subsample = value.to_f64(name)?,
            "random_state" | "random_seed" => c.random_state = value.to_optional_usize(name)?.map(|s| s as u64),
            _ => return Err(unknown_param("CatBoostRegressor", name, value)),
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

    fn sine_data() -> (Array2<f64>, Array1<f64>) {
        let n = 120;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 / 20.0 } else { (i % 5) as f64 });
        let y = x.column(0).mapv(f64::sin) * 4.0;
        (x, y)
    }

    #[test]
    fn test_catboost_regressor() {
        let (x, y) = sine_data();
        let mut model = CatBoostRegressor::new(CatBoostConfig {
            n_estimators: 200,
            max_depth: 4,
            random_state: Some(0),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 200);
        let score = model.score(&x, &y).unwrap();
        assert!(score > 0.95, "R² too low: {}", score);
    }

    #[test]
    fn test_quantization_caps_borders() {
        let x = Array2::from_shape_fn((500, 1), |(i, _)| i as f64);
        let q = Quantized::new(&x, 16);
        assert!(q.borders[0].len() <= 16);
        assert_eq!(q.bins[0][0], 0);
        assert_eq!(q.bins[0][499], q.borders[0].len());
    }

    #[test]
    fn test_symmetric_tree_leaf_count() {
        let (x, y) = sine_data();
        let q = Quantized::new(&x, 254);
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let idx: Vec<usize> = (0..y.len()).collect();

        let tree = build_symmetric_tree(&q, &grad, &hess, &idx, 3, 3.0);
        assert_eq!(tree.leaf_values.len(), 1 << tree.splits.len());
        assert!(tree.splits.len() <= 3);
    }

    #[test]
    fn test_grid_aliases() {
        let mut model = CatBoostRegressor::default();
        model.set_param("iterations", &ParameterValue::Int(300)).unwrap();
        model.set_param("depth", &ParameterValue::Int(8)).unwrap();
        model.set_param("learning_rate", &ParameterValue::Float(0.05)).unwrap();
        assert_eq!(model.config.n_estimators, 300);
        assert_eq!(model.config.max_depth, 8);
        assert!(model.set_param("max_leaves", &ParameterValue::Int(8)).is_err());
    }
}
