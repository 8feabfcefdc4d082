//! Kolosal Trainer - best-model selection for tabular regression
//!
//! This crate provides:
//! - Native regressors (trees, forests, boosting, linear, KNN)
//! - Grid and randomized hyperparameter search with K-fold CV
//! - A selector that keeps the model with the best held-out R²
//! - Checksummed model artifacts and a CLI
//!
//! # Modules
//!
//! - [`training`] - Regressors, the candidate registry and [`ModelTrainer`]
//! - [`optimizer`] - Parameter grids, search and `evaluate_models`
//! - [`export`] - Artifact persistence
//! - [`utils`] - CSV loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use kolosal_trainer::prelude::*;
//! use ndarray::Array2;
//!
//! # fn main() -> kolosal_trainer::Result<()> {
//! let train: Array2<f64> = Array2::zeros((100, 4));
//! let test: Array2<f64> = Array2::zeros((25, 4));
//!
//! let trainer = ModelTrainer::new(ModelTrainerConfig::default());
//! let r2 = trainer.initiate_model_trainer(&train, &test)?;
//! println!("best model R² = {r2:.4}");
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Core ML modules
pub mod training;
pub mod optimizer;

// Utilities
pub mod export;
pub mod utils;

// Services
pub mod cli;

pub use error::{KolosalError, Result};
pub use training::{ModelTrainer, ModelTrainerConfig};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{KolosalError, Result, ResultExt};

    // Training
    pub use crate::training::{
        candidate_models, candidate_param_grids, r2_score, Estimator, ModelRegistry, ModelTrainer,
        ModelTrainerConfig, ParamGrids, Regressor, TrainingOutcome,
    };

    // Optimization
    pub use crate::optimizer::{
        evaluate_models, HyperparameterSearch, ModelReport, ParamGrid, ParamSet, ParameterValue,
        SearchConfig, SearchStrategy,
    };

    // Export
    pub use crate::export::{load_object, save_object, ModelMetadata};
}
