//! Kolosal Trainer - Main Entry Point
//!
//! Selects the best regression model for a pre-split dataset and persists it.

use clap::Parser;
use kolosal_trainer::cli::{cmd_models, cmd_predict, cmd_train, Cli, Commands, TrainArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_trainer=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            train,
            test,
            artifact,
            threshold,
            search,
            n_iter,
            cv_folds,
            seed,
            config,
            no_header,
            report,
        } => {
            let args = TrainArgs {
                artifact,
                threshold,
                search,
                n_iter,
                cv_folds,
                seed,
                config,
                no_header,
                report,
            };
            cmd_train(&train, &test, &args)?;
        }
        Commands::Predict { model, data, with_target, no_header, output } => {
            cmd_predict(&model, &data, with_target, no_header, output.as_deref())?;
        }
        Commands::Models => {
            cmd_models()?;
        }
    }

    Ok(())
}
