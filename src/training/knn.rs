//! K-Nearest Neighbors regressor

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use crate::error::{KolosalError, Result};
use crate::optimizer::ParameterValue;

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl DistanceMetric {
    /// Metric for Minkowski power `p`
    pub fn from_p(p: f64) -> Self {
        if p == 1.0 {
            DistanceMetric::Manhattan
        } else if p == 2.0 {
            DistanceMetric::Euclidean
        } else {
            DistanceMetric::Minkowski(p)
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    pub config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }
}

impl Regressor for KNNRegressor {
    /// Stores the training data; `n_neighbors` must not exceed the sample count.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let k = self.config.n_neighbors;
        if k == 0 {
            return Err(ParameterValue::Int(0).invalid("n_neighbors", "must be at least 1"));
        }
        if k > x.nrows() {
            return Err(KolosalError::ValidationError(format!(
                "n_neighbors ({}) exceeds number of training samples ({})",
                k,
                x.nrows()
            )));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Predict target values (parallelized over query rows)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(KolosalError::ModelNotFitted),
        };
        check_n_features(x, x_train.ncols())?;

        let k = self.config.n_neighbors;
        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                weighted_mean_from(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "n_neighbors" => self.config.n_neighbors = value.to_usize(name)?,
            "weights" => {
                self.config.weights = match value.to_str(name)? {
                    "uniform" => WeightScheme::Uniform,
                    "distance" => WeightScheme::Distance,
                    _ => return Err(value.invalid(name, "expected 'uniform' or 'distance'")),
                }
            }
            "p" => {
                let p = value.to_f64(name)?;
                if p < 1.0 {
                    return Err(value.invalid(name, "Minkowski power must be >= 1"));
                }
                self.config.metric = DistanceMetric::from_p(p);
            }
            _ => return Err(unknown_param("KNNRegressor", name, value)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }
}

/// Max-heap entry keyed by (distance, training index)
#[derive(PartialEq)]
struct Neighbor {
    dist: f64,
    idx: usize,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

/// k nearest (distance, target) pairs; equal distances prefer earlier rows.
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (idx, row) in x_train.rows().into_iter().enumerate() {
        let cand = Neighbor {
            dist: compute_distance(point, row, metric),
            idx,
        };
        if heap.len() < k {
            heap.push(cand);
        } else if heap.peek().map_or(false, |top| cand < *top) {
            heap.pop();
            heap.push(cand);
        }
    }

    heap.into_iter().map(|n| (n.dist, y_train[n.idx])).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let pairs = a.iter().zip(b.iter());
    match metric {
        DistanceMetric::Euclidean => pairs.map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
        DistanceMetric::Minkowski(p) => pairs
            .map(|(x, y)| (x - y).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

/// Neighbor average; under distance weighting exact matches take all weight.
fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    match weights {
        WeightScheme::Uniform => {
            neighbors.iter().map(|(_, y)| y).sum::<f64>() / neighbors.len() as f64
        }
        WeightScheme::Distance => {
            let exact: Vec<f64> = neighbors
                .iter()
                .filter(|(d, _)| *d == 0.0)
                .map(|(_, y)| *y)
                .collect();
            if !exact.is_empty() {
                return exact.iter().sum::<f64>() / exact.len() as f64;
            }
            let (num, den) = neighbors
                .iter()
                .fold((0.0, 0.0), |(n, d), (dist, y)| (n + y / dist, d + 1.0 / dist));
            num / den
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_regressor_uniform() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![0.0, 1.0, 2.0, 10.0];

        let mut knn = KNNRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();
        let pred = knn.predict(&array![[1.0]]).unwrap();
        assert!((pred[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weighting_exact_match() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![5.0, 7.0, 9.0];

        let mut knn = KNNRegressor::with_k(3);
        knn.set_param("weights", &ParameterValue::from("distance")).unwrap();
        knn.fit(&x, &y).unwrap();

        let pred = knn.predict(&array![[1.0], [0.5]]).unwrap();
        assert_eq!(pred[0], 7.0);
        // weights 2, 2, 2/3
        let expected = (2.0 * 5.0 + 2.0 * 7.0 + 9.0 * 2.0 / 3.0) / (4.0 + 2.0 / 3.0);
        assert!((pred[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_minkowski_p() {
        let mut knn = KNNRegressor::default();
        knn.set_param("p", &ParameterValue::Int(1)).unwrap();
        assert_eq!(knn.config.metric, DistanceMetric::Manhattan);
        knn.set_param("p", &ParameterValue::Int(2)).unwrap();
        assert_eq!(knn.config.metric, DistanceMetric::Euclidean);
        knn.set_param("p", &ParameterValue::Float(3.0)).unwrap();
        assert_eq!(knn.config.metric, DistanceMetric::Minkowski(3.0));

        let d = compute_distance(array![0.0, 0.0].view(), array![3.0, 4.0].view(), DistanceMetric::Manhattan);
        assert_eq!(d, 7.0);
    }

    #[test]
    fn test_too_many_neighbors() {
        let mut knn = KNNRegressor::with_k(9);
        let err = knn.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, KolosalError::ValidationError(_)));
    }

    #[test]
    fn test_bad_weights() {
        let mut knn = KNNRegressor::default();
        assert!(knn.set_param("weights", &ParameterValue::from("gaussian")).is_err());
        assert!(knn.set_param("leaf_size", &ParameterValue::Int(30)).is_err());
    }
}
