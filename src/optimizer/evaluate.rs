//! Per-model search and held-out scoring

use ndarray::{Array1, Array2};
use serde::Serialize;
use tracing::info;

use super::config::SearchConfig;
use super::search::HyperparameterSearch;
use super::search_space::ParamSet;
use crate::error::{KolosalError, Result, ResultExt};
use crate::training::registry::{check_registry_alignment, ModelRegistry, ParamGrids};
use crate::training::{Estimator, Regressor};

/// Result of searching and scoring one candidate model
#[derive(Debug, Clone, Serialize)]
pub struct ModelScore {
    pub name: String,
    /// R² of the refit estimator on the held-out test split
    pub test_score: f64,
    /// Mean cross-validation R² of the best combination
    pub cv_score: f64,
    pub best_params: ParamSet,
    /// Combinations evaluated during the search
    pub n_candidates: usize,
    pub fit_time_secs: f64,
    #[serde(skip_serializing)]
    pub estimator: Estimator,
}

/// Test scores per model, in registry order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelReport {
    entries: Vec<ModelScore>,
}

impl ModelReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ModelScore) {
        self.entries.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelScore> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ModelScore> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Test score of `name`
    pub fn score(&self, name: &str) -> Option<f64> {
        self.get(name).map(|e| e.test_score)
    }

    /// `(name, test_score)` pairs in registry order
    pub fn scores(&self) -> Vec<(&str, f64)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.test_score)).collect()
    }

    /// Entry with the highest test score.
    ///
    /// The first entry wins among equal maxima; NaN scores are never chosen.
    pub fn best(&self) -> Option<&ModelScore> {
        self.best_index().map(|i| &self.entries[i])
    }

    fn best_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.test_score.is_nan() {
                continue;
            }
            match best {
                Some(b) if self.entries[b].test_score >= entry.test_score => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Consume the report, returning the best entry
    pub fn into_best(mut self) -> Option<ModelScore> {
        let i = self.best_index()?;
        Some(self.entries.swap_remove(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per model, best first
    pub fn summary(&self) -> String {
        let mut ranked: Vec<&ModelScore> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.test_score.total_cmp(&a.test_score));
        ranked
            .iter()
            .map(|e| format!("{:<24} test_r2={:.4} cv_r2={:.4}", e.name, e.test_score, e.cv_score))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Search every registered model, refit it with its best parameters and score
/// it on the test split.
pub fn evaluate_models(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    models: &ModelRegistry,
    grids: &ParamGrids,
    config: &SearchConfig,
) -> Result<ModelReport> {
    check_registry_alignment(models, grids)?;
    config.validate()?;

    let search = HyperparameterSearch::new(config.clone());
    let mut report = ModelReport::new();

    for (name, estimator) in models.iter() {
        let grid = grids
            .get(name)
            .ok_or_else(|| KolosalError::ConfigError(format!("no grid for {}", name)))?;

        let result = search
            .fit(estimator, grid, x_train, y_train)
            .context(&format!("search {}", name))?;
        let test_score = result
            .estimator
            .score(x_test, y_test)
            .context(&format!("score {}", name))?;

        info!(
            model = name,
            test_r2 = test_score,
            cv_r2 = result.best_score,
            candidates = result.trials.len(),
            secs = result.elapsed_secs,
            "Evaluated model"
        );

        report.push(ModelScore {
            name: name.to_string(),
            test_score,
            cv_score: result.best_score,
            best_params: result.best_params,
            n_candidates: result.trials.len(),
            fit_time_secs: result.elapsed_secs,
            estimator: result.estimator,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParamGrid;
    use crate::training::decision_tree::DecisionTree;
    use crate::training::linear_models::LinearRegression;

    fn entry(name: &str, score: f64) -> ModelScore {
        ModelScore {
            name: name.to_string(),
            test_score: score,
            cv_score: score,
            best_params: ParamSet::new(),
            n_candidates: 1,
            fit_time_secs: 0.0,
            estimator: Estimator::from(LinearRegression::new()),
        }
    }

    #[test]
    fn test_best_prefers_first_on_tie_and_skips_nan() {
        let mut report = ModelReport::new();
        report.push(entry("a", f64::NAN));
        report.push(entry("b", 0.8));
        report.push(entry("c", 0.9));
        report.push(entry("d", 0.9));

        assert_eq!(report.best().map(|e| e.name.as_str()), Some("c"));
        assert_eq!(report.into_best().map(|e| e.name), Some("c".to_string()));
    }

    #[test]
    fn test_best_of_all_nan_is_none() {
        let mut report = ModelReport::new();
        report.push(entry("a", f64::NAN));
        assert!(report.best().is_none());
        assert!(ModelReport::new().best().is_none());
    }

    #[test]
    fn test_evaluate_models_scores_each_entry() {
        let x_train = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y_train = x_train.column(0).mapv(|v| 3.0 * v - 1.0);
        let x_test = Array2::from_shape_fn((10, 1), |(i, _)| i as f64 * 2.5 + 0.5);
        let y_test = x_test.column(0).mapv(|v| 3.0 * v - 1.0);

        let models = ModelRegistry::new()
            .with("Linear", LinearRegression::new())
            .with("Tree", DecisionTree::new());
        let grids = ParamGrids::new()
            .with("Linear", ParamGrid::new())
            .with("Tree", ParamGrid::new().ints("min_samples_leaf", &[1, 2]));

        let report = evaluate_models(
            &x_train,
            &y_train,
            &x_test,
            &y_test,
            &models,
            &grids,
            &SearchConfig::default(),
        )
        .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.scores()[0].0, "Linear");
        assert!((report.score("Linear").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(report.get("Tree").map(|e| e.n_candidates), Some(2));
        assert_eq!(report.best().map(|e| e.name.as_str()), Some("Linear"));
    }

    #[test]
    fn test_evaluate_models_rejects_misaligned_registry() {
        let x = Array2::<f64>::zeros((6, 1));
        let y = Array1::<f64>::zeros(6);
        let models = ModelRegistry::new().with("Linear", LinearRegression::new());
        let grids = ParamGrids::new();

        let err = evaluate_models(&x, &y, &x, &y, &models, &grids, &SearchConfig::default()).unwrap_err();
        assert!(matches!(err, KolosalError::RegistryMismatch { .. }));
    }
}
