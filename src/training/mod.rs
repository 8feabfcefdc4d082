//! Model training module
//!
//! Provides the candidate regressors and the selector that picks among them:
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost (random-forest mode), CatBoost
//! - Linear regression
//! - K-Nearest Neighbors
//! - AdaBoost
//! - The fixed candidate registry and the best-model trainer

mod models;
pub mod adaboost;
pub mod catboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod estimator;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod registry;
pub mod trainer;
pub mod xgboost;

pub use models::{r2_score, RegressionMetrics, Regressor};
pub use estimator::Estimator;
pub use cross_validation::{CVSplit, KFold};
pub use linear_models::LinearRegression;
pub use decision_tree::{DecisionTree, MaxFeatures, TreeNode};
pub use random_forest::RandomForest;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use adaboost::{AdaBoostLoss, AdaBoostRegressor};
pub use xgboost::{XGBRFConfig, XGBRFRegressor};
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use registry::{
    candidate_models, candidate_param_grids, check_registry_alignment, ModelRegistry, ParamGrids,
};
pub use trainer::{split_features_target, ModelTrainer, ModelTrainerConfig, TrainingOutcome};
