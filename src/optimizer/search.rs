//! Cross-validated hyperparameter search

use std::time::Instant;

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use super::config::{SearchConfig, SearchStrategy};
use super::search_space::{ParamGrid, ParamSet};
use crate::error::{KolosalError, Result};
use crate::training::cross_validation::{CVSplit, KFold};
use crate::training::{Estimator, Regressor};

/// Outcome of scoring one parameter combination
#[derive(Debug, Clone, Serialize)]
pub struct TrialResult {
    pub params: ParamSet,
    /// R² per fold, in fold order
    pub fold_scores: Vec<f64>,
    /// Mean of `fold_scores`, NaN when any fold failed
    pub mean_score: f64,
    pub error: Option<String>,
}

impl TrialResult {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Best combination and the estimator refit with it
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_params: ParamSet,
    /// Mean CV score of `best_params`
    pub best_score: f64,
    pub best_index: usize,
    pub trials: Vec<TrialResult>,
    /// Estimator refit on the full training data with `best_params`
    pub estimator: Estimator,
    pub elapsed_secs: f64,
}

/// Grid or randomized search scored by K-fold R²
#[derive(Debug, Clone, Default)]
pub struct HyperparameterSearch {
    config: SearchConfig,
}

impl HyperparameterSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Combinations to evaluate, in enumeration order
    pub fn candidates(&self, grid: &ParamGrid) -> Result<Vec<ParamSet>> {
        let total = grid.n_combinations();
        if total == 0 {
            return Err(KolosalError::ValidationError(
                "parameter grid has a hyperparameter with no candidate values".to_string(),
            ));
        }
        Ok(match self.config.strategy {
            SearchStrategy::Grid => grid.combinations(),
            SearchStrategy::Randomized { n_iter } => {
                let mut rng = match self.config.random_state {
                    Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                    None => ChaCha8Rng::from_entropy(),
                };
                grid.sample(n_iter, &mut rng)
            }
        })
    }

    /// Search `grid` for `estimator` on `(x, y)`.
    ///
    /// Combinations whose fit fails score NaN and never win; the search fails
    /// only if every combination fails. Ties keep the earliest combination.
    pub fn fit(&self, estimator: &Estimator, grid: &ParamGrid, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchResult> {
        self.config.validate()?;
        let start = Instant::now();

        let candidates = self.candidates(grid)?;
        // reject ill-typed or unknown parameters before any fitting
        let configured: Vec<Estimator> = candidates
            .iter()
            .map(|p| estimator.with_params(p))
            .collect::<Result<_>>()?;

        let splits = KFold::new(self.config.cv_folds).split(x.nrows())?;
        let folds: Vec<(Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>)> =
            splits.iter().map(|s: &CVSplit| s.select(x, y)).collect();

        let evaluate = |(params, est): (&ParamSet, &Estimator)| score_candidate(params, est, &folds);
        let trials: Vec<TrialResult> = if self.config.parallel {
            candidates.par_iter().zip(configured.par_iter()).map(evaluate).collect()
        } else {
            candidates.iter().zip(configured.iter()).map(evaluate).collect()
        };

        let best_index = trials
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.mean_score.is_nan())
            .fold(None, |best: Option<(usize, f64)>, (i, t)| match best {
                Some((_, s)) if s >= t.mean_score => best,
                _ => Some((i, t.mean_score)),
            })
            .map(|(i, _)| i);

        let Some(best_index) = best_index else {
            let last = trials.iter().rev().find_map(|t| t.error.clone()).unwrap_or_default();
            return Err(KolosalError::TrainingError(format!(
                "all {} parameter combinations failed; last error: {}",
                trials.len(),
                last
            )));
        };

        let best_params = trials[best_index].params.clone();
        let best_score = trials[best_index].mean_score;
        debug!(best = %best_params, cv_score = best_score, "refitting best combination");

        let mut refit = configured[best_index].clone();
        refit.fit(x, y)?;

        Ok(SearchResult {
            best_params,
            best_score,
            best_index,
            trials,
            estimator: refit,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }
}

fn score_candidate(
    params: &ParamSet,
    estimator: &Estimator,
    folds: &[(Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>)],
) -> TrialResult {
    let mut fold_scores = Vec::with_capacity(folds.len());
    for (x_tr, y_tr, x_val, y_val) in folds {
        let mut est = estimator.clone();
        let scored = est.fit(x_tr, y_tr).and_then(|_| est.score(x_val, y_val));
        match scored {
            Ok(s) => fold_scores.push(s),
            Err(e) => {
                warn!(model = estimator.kind(), params = %params, error = %e, "fit failed, scoring as NaN");
                return TrialResult {
                    params: params.clone(),
                    fold_scores,
                    mean_score: f64::NAN,
                    error: Some(e.to_string()),
                };
            }
        }
    }
    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
    TrialResult {
        params: params.clone(),
        fold_scores,
        mean_score,
        error: None,
    }
}
