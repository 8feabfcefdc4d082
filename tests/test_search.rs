//! Integration test: hyperparameter search over the candidate grids

use kolosal_trainer::optimizer::{
    evaluate_models, HyperparameterSearch, ParamGrid, ParameterValue, SearchConfig,
};
use kolosal_trainer::training::{
    candidate_models, candidate_param_grids, DecisionTree, Estimator, KNNRegressor, ModelRegistry,
    ParamGrids, Regressor,
};
use ndarray::{Array1, Array2};

fn sine_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 2), |(i, j)| (i as f64 / 7.0) + j as f64 * ((i * 13 % 17) as f64 / 17.0));
    let y = Array1::from_shape_fn(n, |i| (x[[i, 0]]).sin() * 2.0 + x[[i, 1]]);
    (x, y)
}

#[test]
fn test_full_decision_tree_grid() {
    let (x, y) = sine_data(90);
    let grids = candidate_param_grids();
    let grid = grids.get("Decision Tree").unwrap();

    let search = HyperparameterSearch::new(SearchConfig::grid());
    let result = search.fit(&Estimator::from(DecisionTree::new()), grid, &x, &y);
    assert!(result.is_ok(), "grid search should succeed: {:?}", result.err());
    let result = result.unwrap();

    assert_eq!(result.trials.len(), 36);
    assert!(result.estimator.is_fitted());
    // no later combination strictly beats the winner, no earlier one ties it
    for (i, trial) in result.trials.iter().enumerate() {
        if i < result.best_index {
            assert!(trial.mean_score < result.best_score);
        } else {
            assert!(trial.mean_score <= result.best_score);
        }
    }
    assert_eq!(result.trials[result.best_index].params, result.best_params);
}

#[test]
fn test_grid_enumeration_order() {
    let grids = candidate_param_grids();
    let knn = grids.get("K-Neighbors Regressor").unwrap();
    let combos = knn.combinations();

    assert_eq!(combos.len(), 16);
    assert_eq!(combos[0].get("n_neighbors"), Some(&ParameterValue::Int(3)));
    assert_eq!(combos[0].get("weights"), Some(&ParameterValue::from("uniform")));
    assert_eq!(combos[0].get("p"), Some(&ParameterValue::Int(1)));
    assert_eq!(combos[1].get("p"), Some(&ParameterValue::Int(2)));
    assert_eq!(combos[15].get("n_neighbors"), Some(&ParameterValue::Int(9)));
}

#[test]
fn test_randomized_search_is_reproducible() {
    let (x, y) = sine_data(60);
    let grid = ParamGrid::new()
        .ints("n_neighbors", &[2, 3, 4, 5, 6])
        .strings("weights", &["uniform", "distance"])
        .ints("p", &[1, 2]);
    let config = SearchConfig::randomized(4).with_random_state(99);

    let a = HyperparameterSearch::new(config.clone())
        .fit(&Estimator::from(KNNRegressor::default()), &grid, &x, &y)
        .unwrap();
    let b = HyperparameterSearch::new(config.with_parallel(false))
        .fit(&Estimator::from(KNNRegressor::default()), &grid, &x, &y)
        .unwrap();

    let params_a: Vec<_> = a.trials.iter().map(|t| t.params.clone()).collect();
    let params_b: Vec<_> = b.trials.iter().map(|t| t.params.clone()).collect();
    assert_eq!(params_a, params_b);
    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.best_score, b.best_score);
}

#[test]
fn test_evaluate_all_candidates() {
    let (x, y) = sine_data(80);
    let x_train = x.slice(ndarray::s![..60, ..]).to_owned();
    let y_train = y.slice(ndarray::s![..60]).to_owned();
    let x_test = x.slice(ndarray::s![60.., ..]).to_owned();
    let y_test = y.slice(ndarray::s![60..]).to_owned();

    let models = candidate_models(Some(3));
    let grids = candidate_param_grids();
    let report = evaluate_models(
        &x_train,
        &y_train,
        &x_test,
        &y_test,
        &models,
        &grids,
        &SearchConfig::randomized(1).with_random_state(3),
    )
    .unwrap();

    let names: Vec<&str> = report.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, models.names());
    for entry in report.iter() {
        assert!(entry.test_score.is_finite(), "{} produced {}", entry.name, entry.test_score);
        assert!(entry.estimator.is_fitted());
        assert_eq!(entry.n_candidates, 1);
    }
}

#[test]
fn test_custom_registry() {
    let (x, y) = sine_data(50);
    let models = ModelRegistry::new().with("Tree", DecisionTree::new().with_random_state(0));
    let grids = ParamGrids::new().with("Tree", ParamGrid::new().ints("min_samples_leaf", &[1, 5]));

    let report = evaluate_models(&x, &y, &x, &y, &models, &grids, &SearchConfig::default()).unwrap();
    assert_eq!(report.len(), 1);
    assert!(report.best().is_some());
}
