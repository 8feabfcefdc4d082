//! Regressor trait and evaluation metrics

use crate::error::{KolosalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Metrics for regression evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of samples scored
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute regression metrics
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_same_len(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: r2_score(y_true, y_pred)?,
            n_samples: y_true.len(),
        })
    }
}

fn check_same_len(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(KolosalError::ValidationError(
            "cannot score an empty target".to_string(),
        ));
    }
    Ok(())
}

/// Coefficient of determination.
///
/// With a constant target (`SS_tot == 0`) the score is 1.0 for a perfect
/// prediction and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_same_len(y_true, y_pred)?;

    let n = y_true.len() as f64;
    let y_mean: f64 = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        Ok(1.0 - ss_res / ss_tot)
    } else if ss_res == 0.0 {
        Ok(1.0)
    } else {
        Ok(0.0)
    }
}

/// Trait for regression models
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Set a hyperparameter by name.
    ///
    /// Unknown names and ill-typed values return `InvalidParameter`.
    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()>;

    /// Whether `fit` has completed
    fn is_fitted(&self) -> bool;

    /// Score predictions on `x` against `y` with R²
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let pred = self.predict(x)?;
        r2_score(y, &pred)
    }
}

/// Error for a parameter name a model does not recognise.
pub(crate) fn unknown_param(model: &str, name: &str, value: &ParameterValue) -> KolosalError {
    value.invalid(name, format!("unknown parameter for {}", model))
}

/// Validate a training pair before fitting.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(KolosalError::ValidationError(
            "cannot fit on zero samples".to_string(),
        ));
    }
    if x.ncols() == 0 {
        return Err(KolosalError::ValidationError(
            "cannot fit without features".to_string(),
        ));
    }
    Ok(())
}

/// Validate the feature count of a prediction input.
pub(crate) fn check_n_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(KolosalError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred).unwrap();

        assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-12);
        assert!(metrics.mae > 0.0);
        assert!(metrics.r2 > 0.9);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);

        let mean = array![2.5, 2.5, 2.5, 2.5];
        assert!(r2_score(&y, &mean).unwrap().abs() < 1e-12);

        let worse = array![4.0, 3.0, 2.0, 1.0];
        assert!(r2_score(&y, &worse).unwrap() < 0.0);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![3.0, 3.0, 3.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![3.0, 3.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_shape_mismatch() {
        let err = r2_score(&array![1.0, 2.0], &array![1.0]).unwrap_err();
        assert!(matches!(err, KolosalError::ShapeError { .. }));
        assert!(r2_score(&Array1::zeros(0), &Array1::zeros(0)).is_err());
    }
}
