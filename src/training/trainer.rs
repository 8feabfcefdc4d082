//! Best-model selection over the fixed candidate registry
//!
//! [`ModelTrainer::initiate_model_trainer`] splits the train/test arrays into
//! features and target, searches every candidate, keeps the one with the
//! highest held-out R², persists it and returns its recomputed score.

use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{KolosalError, Result, ResultExt};
use crate::export::{save_object, ModelMetadata};
use crate::optimizer::{evaluate_models, ModelReport, ParamSet, SearchConfig};
use crate::training::models::{r2_score, Regressor};
use crate::training::registry::{
    candidate_models, candidate_param_grids, check_registry_alignment, ModelRegistry, ParamGrids,
};

/// Configuration for [`ModelTrainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTrainerConfig {
    /// Where the selected model is written
    pub trained_model_file_path: PathBuf,
    /// Minimum held-out R² the best model must reach
    pub min_score: f64,
    pub search: SearchConfig,
}

impl Default for ModelTrainerConfig {
    fn default() -> Self {
        Self {
            trained_model_file_path: PathBuf::from("artifacts").join("model.pkl"),
            min_score: 0.6,
            search: SearchConfig::default(),
        }
    }
}

impl ModelTrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trained_model_file_path = path.into();
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Load from a JSON file; absent fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_score.is_finite() {
            return Err(KolosalError::ConfigError(format!(
                "min_score must be finite, got {}",
                self.min_score
            )));
        }
        self.search.validate()
    }
}

/// Everything produced by a successful selection
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub best_model_name: String,
    pub best_params: ParamSet,
    /// R² of the persisted model recomputed on the test split
    pub score: f64,
    pub report: ModelReport,
    pub artifact_path: PathBuf,
}

/// Split train/test arrays into `(x_train, y_train, x_test, y_test)`.
///
/// The last column is the target. Both arrays need the same column count,
/// at least one feature column, at least one row and only finite values.
pub fn split_features_target(
    train: &Array2<f64>,
    test: &Array2<f64>,
) -> Result<(Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>)> {
    for (label, arr) in [("train", train), ("test", test)] {
        if arr.ncols() < 2 {
            return Err(KolosalError::ShapeError {
                expected: "at least 2 columns (features + target)".to_string(),
                actual: format!("{} array with {} columns", label, arr.ncols()),
            });
        }
        if arr.nrows() == 0 {
            return Err(KolosalError::ValidationError(format!("{} array has no rows", label)));
        }
        if let Some(pos) = arr.iter().position(|v| !v.is_finite()) {
            return Err(KolosalError::ValidationError(format!(
                "{} array has a non-finite value at row {}, column {}",
                label,
                pos / arr.ncols(),
                pos % arr.ncols()
            )));
        }
    }
    if train.ncols() != test.ncols() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} columns in test array", train.ncols()),
            actual: format!("{} columns", test.ncols()),
        });
    }

    let target = train.ncols() - 1;
    Ok((
        train.slice(s![.., ..target]).to_owned(),
        train.column(target).to_owned(),
        test.slice(s![.., ..target]).to_owned(),
        test.column(target).to_owned(),
    ))
}

/// Selects, persists and scores the best candidate regressor
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ModelTrainerConfig,
    models: ModelRegistry,
    grids: ParamGrids,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(ModelTrainerConfig::default())
    }
}

impl ModelTrainer {
    /// Trainer over the fixed candidate set
    pub fn new(config: ModelTrainerConfig) -> Self {
        let models = candidate_models(config.search.random_state);
        Self {
            config,
            models,
            grids: candidate_param_grids(),
        }
    }

    /// Replace the candidate set. Alignment is checked when training starts.
    pub fn with_registry(mut self, models: ModelRegistry, grids: ParamGrids) -> Self {
        self.models = models;
        self.grids = grids;
        self
    }

    pub fn config(&self) -> &ModelTrainerConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn grids(&self) -> &ParamGrids {
        &self.grids
    }

    /// Run the selection and return the recomputed test R² of the persisted model.
    pub fn initiate_model_trainer(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<f64> {
        self.run(train, test).map(|outcome| outcome.score)
    }

    /// Like [`initiate_model_trainer`](Self::initiate_model_trainer) but keeps
    /// the per-model report.
    pub fn run(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<TrainingOutcome> {
        self.config.validate().context("validate config")?;

        let (x_train, y_train, x_test, y_test) =
            split_features_target(train, test).context("split arrays")?;
        info!("Split training and test input data");

        check_registry_alignment(&self.models, &self.grids).context("check registry")?;

        let report = evaluate_models(
            &x_train,
            &y_train,
            &x_test,
            &y_test,
            &self.models,
            &self.grids,
            &self.config.search,
        )
        .context("evaluate models")?;

        let (best_model_name, best_params, score) = {
            let best = match report.best() {
                Some(best) => best,
                None => {
                    return Err(KolosalError::NoBestModel {
                        best_model: "none".to_string(),
                        score: f64::NAN,
                        threshold: self.config.min_score,
                    }
                    .in_stage("select best model"))
                }
            };

            if best.test_score < self.config.min_score {
                return Err(KolosalError::NoBestModel {
                    best_model: best.name.clone(),
                    score: best.test_score,
                    threshold: self.config.min_score,
                }
                .in_stage("select best model"));
            }
            info!(
                model = %best.name,
                score = best.test_score,
                params = %best.best_params,
                "Best found model on both training and test testing dataset"
            );

            let path = &self.config.trained_model_file_path;
            let metadata = ModelMetadata::new(best.name.clone())
                .with_n_features(x_train.ncols())
                .with_test_score(best.test_score)
                .with_best_params(best.best_params.clone());
            save_object(path, &best.estimator, metadata).context("save model")?;
            info!(path = %path.display(), "Saved best model");

            let predicted = best.estimator.predict(&x_test).context("predict test split")?;
            let score = r2_score(&y_test, &predicted).context("score best model")?;
            (best.name.clone(), best.best_params.clone(), score)
        };

        Ok(TrainingOutcome {
            best_model_name,
            best_params,
            score,
            report,
            artifact_path: self.config.trained_model_file_path.clone(),
        })
    }
}
