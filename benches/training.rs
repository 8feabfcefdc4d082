use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_trainer::optimizer::{HyperparameterSearch, SearchConfig};
use kolosal_trainer::training::{
    candidate_models, candidate_param_grids, ModelTrainer, ModelTrainerConfig, Regressor,
};
use ndarray::{s, Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let x = Array2::from_shape_simple_fn((n_rows, n_features), || rng.gen::<f64>() * 10.0);
    // Target as sum of features + noise
    let y = Array1::from_shape_fn(n_rows, |i| x.row(i).sum() + rng.gen::<f64>() * 0.1);
    (x, y)
}

fn with_target(x: &Array2<f64>, y: &Array1<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((x.nrows(), x.ncols() + 1));
    out.slice_mut(s![.., ..x.ncols()]).assign(x);
    out.column_mut(x.ncols()).assign(y);
    out
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    let (x, y) = create_regression_data(1000, 10);
    for (name, est) in candidate_models(Some(0)).iter() {
        group.bench_with_input(BenchmarkId::new("model", name), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = est.clone();
                model.fit(black_box(x), black_box(y)).unwrap();
                model
            })
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    let grids = candidate_param_grids();
    let models = candidate_models(Some(0));
    let search = HyperparameterSearch::new(SearchConfig::randomized(4));

    for n_rows in [200, 1000].iter() {
        let (x, y) = create_regression_data(*n_rows, 8);
        for name in ["Decision Tree", "K-Neighbors Regressor", "ADABoost Regressor"] {
            let (Some(est), Some(grid)) = (models.get(name), grids.get(name)) else {
                continue;
            };
            group.bench_with_input(BenchmarkId::new(name, n_rows), &(&x, &y), |b, (x, y)| {
                b.iter(|| search.fit(est, grid, black_box(x), black_box(y)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    group.sample_size(10);

    let (x, y) = create_regression_data(600, 6);
    let all = with_target(&x, &y);
    let train = all.slice(s![..450, ..]).to_owned();
    let test = all.slice(s![450.., ..]).to_owned();

    let path = std::env::temp_dir().join(format!("kolosal_bench_{}", std::process::id())).join("model.pkl");
    let trainer = ModelTrainer::new(
        ModelTrainerConfig::default()
            .with_model_path(&path)
            .with_search(SearchConfig::randomized(2)),
    );

    group.bench_function("initiate_model_trainer", |b| {
        b.iter(|| trainer.initiate_model_trainer(black_box(&train), black_box(&test)).unwrap())
    });

    group.finish();
    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir).ok();
    }
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train models once
    let (x, y) = create_regression_data(2000, 10);
    let mut fitted = Vec::new();
    for (name, est) in candidate_models(Some(0)).iter() {
        let mut model = est.clone();
        model.fit(&x, &y).unwrap();
        fitted.push((name.to_string(), model));
    }

    for n_rows in [100, 1000, 10000].iter() {
        let (test_x, _) = create_regression_data(*n_rows, 10);
        for (name, model) in &fitted {
            group.bench_with_input(BenchmarkId::new(name.as_str(), n_rows), &test_x, |b, x| {
                b.iter(|| model.predict(black_box(x)).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_search, bench_selection, bench_prediction);
criterion_main!(benches);
