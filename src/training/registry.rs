//! Candidate model registry and the matching hyperparameter grids

use crate::error::{KolosalError, Result};
use crate::optimizer::ParamGrid;
use crate::training::adaboost::AdaBoostRegressor;
use crate::training::catboost::CatBoostRegressor;
use crate::training::decision_tree::DecisionTree;
use crate::training::estimator::Estimator;
use crate::training::gradient_boosting::GradientBoostingRegressor;
use crate::training::knn::KNNRegressor;
use crate::training::linear_models::LinearRegression;
use crate::training::random_forest::RandomForest;
use crate::training::xgboost::XGBRFRegressor;

/// Ordered mapping from model name to an unfitted estimator
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<(String, Estimator)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, estimator: impl Into<Estimator>) -> &mut Self {
        let name = name.into();
        let estimator = estimator.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = estimator,
            None => self.entries.push((name, estimator)),
        }
        self
    }

    pub fn with(mut self, name: impl Into<String>, estimator: impl Into<Estimator>) -> Self {
        self.insert(name, estimator);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Estimator> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn remove(&mut self, name: &str) -> Option<Estimator> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Estimator)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mapping from model name to its search grid
#[derive(Debug, Clone, Default)]
pub struct ParamGrids {
    entries: Vec<(String, ParamGrid)>,
}

impl ParamGrids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, grid: ParamGrid) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = grid,
            None => self.entries.push((name, grid)),
        }
        self
    }

    pub fn with(mut self, name: impl Into<String>, grid: ParamGrid) -> Self {
        self.insert(name, grid);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamGrid> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamGrid> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fail unless every model has a grid and every grid has a model.
pub fn check_registry_alignment(models: &ModelRegistry, grids: &ParamGrids) -> Result<()> {
    let missing_grids: Vec<String> = models
        .names()
        .into_iter()
        .filter(|n| grids.get(n).is_none())
        .map(String::from)
        .collect();
    let orphan_grids: Vec<String> = grids
        .names()
        .into_iter()
        .filter(|n| models.get(n).is_none())
        .map(String::from)
        .collect();

    if missing_grids.is_empty() && orphan_grids.is_empty() {
        Ok(())
    } else {
        Err(KolosalError::RegistryMismatch {
            missing_grids,
            orphan_grids,
        })
    }
}

/// The fixed candidate set, in selection order.
///
/// Stochastic estimators are seeded with `random_state` when given.
pub fn candidate_models(random_state: Option<u64>) -> ModelRegistry {
    let mut models = ModelRegistry::new()
        .with("Random Forest", RandomForest::default())
        .with("Decision Tree", DecisionTree::new())
        .with("Gradient Boosting", GradientBoostingRegressor::default())
        .with("Linear Regression", LinearRegression::new())
        .with("K-Neighbors Regressor", KNNRegressor::default())
        .with("XGB Regressor", XGBRFRegressor::default())
        .with("CatBoosting Regressor", CatBoostRegressor::default())
        .with("ADABoost Regressor", AdaBoostRegressor::default());

    if let Some(seed) = random_state {
        for (_, est) in models.entries.iter_mut() {
            est.set_random_state(seed);
        }
    }
    models
}

/// Search grids for [`candidate_models`]
pub fn candidate_param_grids() -> ParamGrids {
    let depths = [None, Some(10), Some(20), Some(30)];

    ParamGrids::new()
        .with(
            "Random Forest",
            ParamGrid::new()
                .ints("n_estimators", &[100, 200, 300])
                .optional_ints("max_depth", &depths)
                .ints("min_samples_split", &[2, 5, 10])
                .ints("min_samples_leaf", &[1, 2, 4]),
        )
        .with(
            "Decision Tree",
            ParamGrid::new()
                .optional_ints("max_depth", &depths)
                .ints("min_samples_split", &[2, 5, 10])
                .ints("min_samples_leaf", &[1, 2, 4]),
        )
        .with(
            "Gradient Boosting",
            ParamGrid::new()
                .ints("n_estimators", &[100, 200, 300])
                .floats("learning_rate", &[0.01, 0.1, 0.05])
                .ints("max_depth", &[3, 5, 7])
                .floats("subsample", &[0.8, 0.9, 1.0]),
        )
        .with("Linear Regression", ParamGrid::new())
        .with(
            "K-Neighbors Regressor",
            ParamGrid::new()
                .ints("n_neighbors", &[3, 5, 7, 9])
                .strings("weights", &["uniform", "distance"])
                .ints("p", &[1, 2]),
        )
        .with(
            "XGB Regressor",
            ParamGrid::new()
                .ints("n_estimators", &[100, 200, 300])
                .ints("max_depth", &[3, 5, 7])
                .floats("learning_rate", &[0.01, 0.1, 0.05])
                .floats("subsample", &[0.8, 0.9, 1.0]),
        )
        .with(
            "CatBoosting Regressor",
            ParamGrid::new()
                .ints("iterations", &[100, 200, 300])
                .floats("learning_rate", &[0.01, 0.1, 0.05])
                .ints("depth", &[4, 6, 8]),
        )
        .with(
            "ADABoost Regressor",
            ParamGrid::new()
                .ints("n_estimators", &[50, 100, 200])
                .floats("learning_rate", &[0.01, 0.1, 1.0]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_are_aligned_and_ordered() {
        let models = candidate_models(Some(42));
        let grids = candidate_param_grids();
        assert!(check_registry_alignment(&models, &grids).is_ok());

        assert_eq!(
            models.names(),
            vec![
                "Random Forest",
                "Decision Tree",
                "Gradient Boosting",
                "Linear Regression",
                "K-Neighbors Regressor",
                "XGB Regressor",
                "CatBoosting Regressor",
                "ADABoost Regressor",
            ]
        );
    }

    #[test]
    fn test_grid_sizes() {
        let grids = candidate_param_grids();
        let size = |n: &str| grids.get(n).map(|g| g.n_combinations());
        assert_eq!(size("Random Forest"), Some(108));
        assert_eq!(size("Decision Tree"), Some(36));
        assert_eq!(size("Gradient Boosting"), Some(81));
        assert_eq!(size("Linear Regression"), Some(1));
        assert_eq!(size("K-Neighbors Regressor"), Some(16));
        assert_eq!(size("XGB Regressor"), Some(81));
        assert_eq!(size("CatBoosting Regressor"), Some(27));
        assert_eq!(size("ADABoost Regressor"), Some(9));
    }

    #[test]
    fn test_every_grid_value_is_accepted() {
        let models = candidate_models(None);
        let grids = candidate_param_grids();
        for (name, est) in models.iter() {
            let grid = grids.get(name).unwrap();
            for params in grid.combinations() {
                assert!(est.with_params(&params).is_ok(), "{} rejected {}", name, params);
            }
        }
    }

    #[test]
    fn test_mismatch_names_both_sides() {
        let models = candidate_models(None).with("Extra", LinearRegression::new());
        let mut grids = candidate_param_grids();
        grids.remove("Decision Tree");
        grids.insert("Orphan", ParamGrid::new());

        match check_registry_alignment(&models, &grids) {
            Err(KolosalError::RegistryMismatch {
                missing_grids,
                orphan_grids,
            }) => {
                assert_eq!(missing_grids, vec!["Decision Tree".to_string(), "Extra".to_string()]);
                assert_eq!(orphan_grids, vec!["Orphan".to_string()]);
            }
            other => panic!("expected RegistryMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut models = ModelRegistry::new()
            .with("a", LinearRegression::new())
            .with("b", DecisionTree::new());
        models.insert("a", KNNRegressor::default());
        assert_eq!(models.names(), vec!["a", "b"]);
        assert_eq!(models.get("a").map(|e| e.kind()), Some("KNeighborsRegressor"));
    }
}
