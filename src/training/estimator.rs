//! Serializable handle over the candidate regressors

use crate::error::Result;
use crate::optimizer::{ParamSet, ParameterValue};
use crate::training::adaboost::AdaBoostRegressor;
use crate::training::catboost::CatBoostRegressor;
use crate::training::decision_tree::DecisionTree;
use crate::training::gradient_boosting::GradientBoostingRegressor;
use crate::training::knn::KNNRegressor;
use crate::training::linear_models::LinearRegression;
use crate::training::models::Regressor;
use crate::training::random_forest::RandomForest;
use crate::training::xgboost::XGBRFRegressor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Any of the supported regressors, fitted or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
    GradientBoosting(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
    KNeighbors(KNNRegressor),
    XGBRF(XGBRFRegressor),
    CatBoost(CatBoostRegressor),
    AdaBoost(AdaBoostRegressor),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Estimator::RandomForest($m) => $body,
            Estimator::DecisionTree($m) => $body,
            Estimator::GradientBoosting($m) => $body,
            Estimator::LinearRegression($m) => $body,
            Estimator::KNeighbors($m) => $body,
            Estimator::XGBRF($m) => $body,
            Estimator::CatBoost($m) => $body,
            Estimator::AdaBoost($m) => $body,
        }
    };
}

impl Estimator {
    /// Type name of the wrapped regressor
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::RandomForest(_) => "RandomForestRegressor",
            Estimator::DecisionTree(_) => "DecisionTreeRegressor",
            Estimator::GradientBoosting(_) => "GradientBoostingRegressor",
            Estimator::LinearRegression(_) => "LinearRegression",
            Estimator::KNeighbors(_) => "KNeighborsRegressor",
            Estimator::XGBRF(_) => "XGBRFRegressor",
            Estimator::CatBoost(_) => "CatBoostRegressor",
            Estimator::AdaBoost(_) => "AdaBoostRegressor",
        }
    }

    /// Apply every assignment in `params`, stopping at the first rejection.
    pub fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            self.set_param(name, value)?;
        }
        Ok(())
    }

    /// Copy of this estimator configured with `params`, left unfitted.
    pub fn with_params(&self, params: &ParamSet) -> Result<Self> {
        let mut est = self.clone();
        est.set_params(params)?;
        Ok(est)
    }

    /// Seed the estimator's randomness, if it has any.
    pub fn set_random_state(&mut self, seed: u64) {
        match self {
            Estimator::RandomForest(m) => m.random_state = Some(seed),
            Estimator::DecisionTree(m) => m.random_state = Some(seed),
            Estimator::GradientBoosting(m) => m.config.random_state = Some(seed),
            Estimator::XGBRF(m) => m.config.random_state = Some(seed),
            Estimator::CatBoost(m) => m.config.random_state = Some(seed),
            Estimator::AdaBoost(m) => m.random_state = Some(seed),
            Estimator::LinearRegression(_) | Estimator::KNeighbors(_) => {}
        }
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        dispatch!(self, m => m.fit(x, y))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        dispatch!(self, m => m.predict(x))
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        dispatch!(self, m => m.set_param(name, value))
    }

    fn is_fitted(&self) -> bool {
        dispatch!(self, m => m.is_fitted())
    }
}

macro_rules! impl_from_model {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Estimator {
                fn from(m: $ty) -> Self {
                    Estimator::$variant(m)
                }
            }
        )*
    };
}

impl_from_model!(
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
    GradientBoosting(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
    KNeighbors(KNNRegressor),
    XGBRF(XGBRFRegressor),
    CatBoost(CatBoostRegressor),
    AdaBoost(AdaBoostRegressor),
);
