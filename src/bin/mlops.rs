//! MLOps runner: training, drift checks, retraining and feedback upkeep.
//!
//! Usage:
//!   mlops train --feedback
//!   mlops retrain --force
//!   mlops feedback export --out feedback.csv

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use trust_verify::classifier::ModelHandle;
use trust_verify::config::AppConfig;
use trust_verify::mlops::{drift, retrain, train, Mlops};

#[derive(Parser, Debug)]
#[command(name = "mlops")]
#[command(about = "Trust Verify model lifecycle")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare data, train, evaluate and register a model
    Train {
        /// Add collected user feedback to the training data
        #[arg(long)]
        feedback: bool,
    },
    /// Compare reference and current data and write a drift report
    Drift {
        #[arg(long)]
        reference: Option<PathBuf>,
        #[arg(long)]
        current: Option<PathBuf>,
    },
    /// Retrain when drift is detected
    Retrain {
        /// Retrain even without drift
        #[arg(long)]
        force: bool,
    },
    /// Inspect or manage collected feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommand,
    },
    /// Describe the model that would be served
    Info,
}

#[derive(Subcommand, Debug)]
enum FeedbackCommand {
    Stats,
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Clear {
        /// Skip the export taken before clearing
        #[arg(long)]
        no_backup: bool,
    },
}

fn print_json<T: Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

/// The model the API would load at startup.
fn serving_model(mlops: &Mlops) -> ModelHandle {
    let handle = ModelHandle::new();
    if let Some((m, origin)) = mlops.load_initial_model(&AppConfig::from_env().model_path) {
        handle.swap(m, origin);
    }
    handle
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    trust_verify::init_logging("info");

    let cli = Cli::parse();
    let mlops = Mlops::from_env();

    match cli.command {
        Command::Train { feedback } => {
            let outcome = train::train_and_log(&mlops.config, &mlops.registry, feedback, true)?;
            tracing::info!(run_id = %outcome.run_id, "training finished");
            print_json(&outcome.metrics.to_map())?;
        }
        Command::Drift { reference, current } => {
            let handle = serving_model(&mlops);
            let model = handle.current();
            match drift::detect(
                &mlops.config,
                reference.as_deref(),
                current.as_deref(),
                model.as_deref(),
            )? {
                Some(report) => print_json(&report)?,
                None => anyhow::bail!("drift check skipped: reference or current data missing"),
            }
        }
        Command::Retrain { force } => {
            let handle = serving_model(&mlops);
            let result = retrain::retraining_flow(&mlops, &handle, force);
            print_json(&result)?;
        }
        Command::Feedback { command } => match command {
            FeedbackCommand::Stats => print_json(&mlops.feedback.stats()?)?,
            FeedbackCommand::Export { out } => match mlops.feedback.export(out.as_deref())? {
                Some(path) => println!("{}", path.display()),
                None => println!("no feedback data to export"),
            },
            FeedbackCommand::Clear { no_backup } => mlops.feedback.clear(!no_backup)?,
        },
        Command::Info => {
            let handle = serving_model(&mlops);
            print_json(&mlops.model_info(&handle))?;
        }
    }
    Ok(())
}
