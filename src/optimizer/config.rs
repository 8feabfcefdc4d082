//! Search configuration

use serde::{Deserialize, Serialize};

use crate::error::{KolosalError, Result};

/// How candidate combinations are drawn from a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Every combination of the grid
    Grid,
    /// At most `n_iter` distinct combinations sampled without replacement
    Randomized { n_iter: usize },
}

impl Default for SearchStrategy {
    fn default() -> Self {
        SearchStrategy::Grid
    }
}

/// Configuration for hyperparameter search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidate selection strategy
    pub strategy: SearchStrategy,

    /// Cross-validation folds used to score each combination
    pub cv_folds: usize,

    /// Seed for sampling and for stochastic estimators
    pub random_state: Option<u64>,

    /// Evaluate combinations on the rayon pool
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Grid,
            cv_folds: 3,
            random_state: Some(42),
            parallel: true,
        }
    }
}

impl SearchConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Exhaustive grid search
    pub fn grid() -> Self {
        Self::default()
    }

    /// Randomized search over at most `n_iter` combinations
    pub fn randomized(n_iter: usize) -> Self {
        Self {
            strategy: SearchStrategy::Randomized { n_iter },
            ..Self::default()
        }
    }

    /// Set number of CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Set random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn without_random_state(mut self) -> Self {
        self.random_state = None;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(KolosalError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if let SearchStrategy::Randomized { n_iter: 0 } = self.strategy {
            return Err(KolosalError::ConfigError(
                "randomized search needs n_iter >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.strategy, SearchStrategy::Grid);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.random_state, Some(42));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SearchConfig::randomized(5)
            .with_cv_folds(4)
            .with_random_state(7)
            .with_parallel(false);

        assert_eq!(config.strategy, SearchStrategy::Randomized { n_iter: 5 });
        assert_eq!(config.cv_folds, 4);
        assert_eq!(config.random_state, Some(7));
        assert!(!config.parallel);
    }

    #[test]
    fn test_validate() {
        assert!(SearchConfig::default().with_cv_folds(1).validate().is_err());
        assert!(SearchConfig::randomized(0).validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_and_defaults() {
        let config = SearchConfig::randomized(8);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"kind\":\"randomized\""));
        let back: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        let partial: SearchConfig = serde_json::from_str(r#"{"cv_folds": 5}"#).unwrap();
        assert_eq!(partial.cv_folds, 5);
        assert_eq!(partial.strategy, SearchStrategy::Grid);
    }
}
