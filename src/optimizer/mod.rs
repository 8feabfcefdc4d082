//! Hyperparameter search
//!
//! Provides:
//! - Parameter grids and typed hyperparameter values
//! - Grid and randomized search scored by K-fold cross-validation
//! - `evaluate_models`, which searches every registered model and scores the
//!   refit winner on a held-out split

mod config;
mod search_space;
pub mod evaluate;
pub mod search;

pub use config::{SearchConfig, SearchStrategy};
pub use search_space::{ParamGrid, ParamSet, ParameterValue};
pub use search::{HyperparameterSearch, SearchResult, TrialResult};
pub use evaluate::{evaluate_models, ModelReport, ModelScore};
