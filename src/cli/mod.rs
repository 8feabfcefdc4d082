//! Kolosal Trainer CLI Module
//!
//! Command-line interface for model selection, prediction and registry listing.

use clap::{Parser, Subcommand};
use colored::*;
use ndarray::{s, Array2};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::export::load_object;
use crate::optimizer::{SearchConfig, SearchStrategy};
use crate::training::{
    candidate_models, candidate_param_grids, Estimator, ModelTrainer, ModelTrainerConfig,
    RegressionMetrics, Regressor,
};
use crate::utils::{save_predictions, DataLoader};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-trainer")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Select, persist and score the best regression model")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search every candidate model and persist the best one
    Train {
        /// Training CSV, target in the last column
        #[arg(long)]
        train: PathBuf,

        /// Test CSV with the same columns as the training CSV
        #[arg(long)]
        test: PathBuf,

        /// Artifact path for the selected model
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Minimum test R² required of the best model
        #[arg(long)]
        threshold: Option<f64>,

        /// Search strategy (grid, random)
        #[arg(long)]
        search: Option<String>,

        /// Combinations per model for random search
        #[arg(long, default_value = "10")]
        n_iter: usize,

        /// Number of cross-validation folds
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Random seed for search and stochastic models
        #[arg(long)]
        seed: Option<u64>,

        /// JSON trainer configuration; flags override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// CSV files have no header row
        #[arg(long)]
        no_header: bool,

        /// Write the per-model report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Make predictions using a trained model artifact
    Predict {
        /// Model artifact written by `train`
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV of features
        #[arg(short, long)]
        data: PathBuf,

        /// The last column of the input is the target; report R²
        #[arg(long)]
        with_target: bool,

        /// CSV file has no header row
        #[arg(long)]
        no_header: bool,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the candidate models and their search grids
    Models,
}

/// Options for [`cmd_train`] collected from flags
#[derive(Debug, Clone, Default)]
pub struct TrainArgs {
    pub artifact: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub search: Option<String>,
    pub n_iter: usize,
    pub cv_folds: Option<usize>,
    pub seed: Option<u64>,
    pub config: Option<PathBuf>,
    pub no_header: bool,
    pub report: Option<PathBuf>,
}

impl TrainArgs {
    /// Trainer configuration from the config file, overridden by flags
    pub fn trainer_config(&self) -> anyhow::Result<ModelTrainerConfig> {
        let mut config = match &self.config {
            Some(path) => ModelTrainerConfig::from_json_file(path)?,
            None => ModelTrainerConfig::default(),
        };

        if let Some(path) = &self.artifact {
            config.trained_model_file_path = path.clone();
        }
        if let Some(threshold) = self.threshold {
            config.min_score = threshold;
        }
        if let Some(search) = &self.search {
            config.search.strategy = match search.as_str() {
                "grid" => SearchStrategy::Grid,
                "random" | "randomized" => SearchStrategy::Randomized { n_iter: self.n_iter },
                _ => anyhow::bail!("Invalid search strategy: {}", search),
            };
        }
        if let Some(folds) = self.cv_folds {
            config.search.cv_folds = folds;
        }
        if let Some(seed) = self.seed {
            config.search.random_state = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }
}

fn strategy_label(search: &SearchConfig) -> String {
    match search.strategy {
        SearchStrategy::Grid => "grid".to_string(),
        SearchStrategy::Randomized { n_iter } => format!("random ({} per model)", n_iter),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(train_path: &Path, test_path: &Path, args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = args.trainer_config()?;
    let loader = DataLoader::new().with_has_header(!args.no_header);

    step_run("Loading data");
    let start = Instant::now();
    let train = loader.load_array(train_path)?;
    let test = loader.load_array(test_path)?;
    step_done(&format!(
        "{} train / {} test rows × {} cols in {:?}",
        train.nrows(),
        test.nrows(),
        train.ncols(),
        start.elapsed()
    ));

    kv("Search", &strategy_label(&config.search));
    kv("CV folds", &config.search.cv_folds.to_string());
    kv("Threshold", &format!("{:.2}", config.min_score));
    println!();

    let start = Instant::now();
    let trainer = ModelTrainer::new(config);
    let outcome = trainer.run(&train, &test)?;
    step_ok(&format!("Searched {} models in {:.2?}", outcome.report.len(), start.elapsed()));

    println!();
    println!(
        "  {:<24} {:>10} {:>10} {:>8} {:>10}",
        muted("Model"),
        muted("Test R²"),
        muted("CV R²"),
        muted("Combos"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(66)));
    for entry in outcome.report.iter() {
        let name = if entry.name == outcome.best_model_name {
            entry.name.white().bold()
        } else {
            entry.name.normal()
        };
        println!(
            "  {:<24} {:>10.4} {:>10.4} {:>8} {:>9.2}s",
            name, entry.test_score, entry.cv_score, entry.n_candidates, entry.fit_time_secs
        );
    }
    println!("  {}", dim(&"─".repeat(66)));

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        outcome.best_model_name.white().bold(),
        muted("R²:"),
        outcome.score
    );
    kv("Params", &outcome.best_params.to_string());
    kv("Artifact", &outcome.artifact_path.display().to_string());

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&outcome.report)?;
        std::fs::write(path, json)?;
        kv("Report", &path.display().to_string());
    }

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    with_target: bool,
    no_header: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let (model, metadata): (Estimator, _) = load_object(model_path)?;
    step_done(&format!("{} ({})", metadata.model_name, model.kind()));

    step_run("Loading data");
    let data = DataLoader::new().with_has_header(!no_header).load_array(data_path)?;
    step_done(&format!("{} rows × {} cols", data.nrows(), data.ncols()));

    let (x, y) = if with_target {
        if data.ncols() < 2 {
            anyhow::bail!("--with-target needs at least one feature column and a target column");
        }
        let target = data.ncols() - 1;
        let x: Array2<f64> = data.slice(s![.., ..target]).to_owned();
        (x, Some(data.column(target).to_owned()))
    } else {
        (data, None)
    };

    step_run("Predicting");
    let start = Instant::now();
    let predictions = model.predict(&x)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    kv("Model", &metadata.model_name);
    kv("Trained", &metadata.created_at.to_rfc3339());
    kv("Selection R²", &format!("{:.4}", metadata.test_score));

    if let Some(y) = y {
        let metrics = RegressionMetrics::compute(&y, &predictions)?;
        println!("  {:<16} {}", muted("R²"), format!("{:.4}", metrics.r2).white().bold());
        kv("RMSE", &format!("{:.4}", metrics.rmse));
        kv("MAE", &format!("{:.4}", metrics.mae));
    }

    match output {
        Some(path) => {
            save_predictions(path, &predictions)?;
            kv("Output", &path.display().to_string());
        }
        None => {
            println!();
            for (i, p) in predictions.iter().take(10).enumerate() {
                println!("  {:>6} {:.6}", dim(&i.to_string()), p);
            }
            if predictions.len() > 10 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 10)));
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_models() -> anyhow::Result<()> {
    section("Candidate models");

    let models = candidate_models(None);
    let grids = candidate_param_grids();

    println!("  {:<24} {:<28} {:>8}", muted("Name"), muted("Estimator"), muted("Combos"));
    println!("  {}", dim(&"─".repeat(62)));
    for (name, est) in models.iter() {
        let grid = grids.get(name);
        println!(
            "  {:<24} {:<28} {:>8}",
            name.white(),
            est.kind(),
            grid.map(|g| g.n_combinations()).unwrap_or(0)
        );
        if let Some(grid) = grid {
            for param in grid.param_names() {
                let values = grid
                    .values(&param)
                    .map(|vs| vs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))
                    .unwrap_or_default();
                println!("    {:<22} {}", muted(&param), dim(&format!("[{}]", values)));
            }
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "kolosal-trainer",
            "train",
            "--train",
            "train.csv",
            "--test",
            "test.csv",
            "--search",
            "random",
            "--n-iter",
            "4",
            "--threshold",
            "0.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Train { train, search, n_iter, threshold, .. } => {
                assert_eq!(train, PathBuf::from("train.csv"));
                assert_eq!(search.as_deref(), Some("random"));
                assert_eq!(n_iter, 4);
                assert_eq!(threshold, Some(0.5));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_train_args_override_defaults() {
        let args = TrainArgs {
            artifact: Some(PathBuf::from("out/best.pkl")),
            threshold: Some(0.7),
            search: Some("random".to_string()),
            n_iter: 5,
            cv_folds: Some(4),
            seed: Some(1),
            ..Default::default()
        };
        let config = args.trainer_config().unwrap();

        assert_eq!(config.trained_model_file_path, PathBuf::from("out/best.pkl"));
        assert_eq!(config.min_score, 0.7);
        assert_eq!(config.search.strategy, SearchStrategy::Randomized { n_iter: 5 });
        assert_eq!(config.search.cv_folds, 4);
        assert_eq!(config.search.random_state, Some(1));
    }

    #[test]
    fn test_train_args_reject_unknown_strategy() {
        let args = TrainArgs {
            search: Some("bayes".to_string()),
            ..Default::default()
        };
        assert!(args.trainer_config().is_err());
    }
}
