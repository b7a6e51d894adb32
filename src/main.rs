//! `flatprice` command line: train, evaluate, predict and serve.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use flatprice::data::load_csv;
use flatprice::evaluation::{compare, format_comparison, format_report, Metrics};
use flatprice::io::ArtifactStore;
use flatprice::serving::{self, Predictor};
use flatprice::workflow::{self, ENSEMBLE_ID};
use flatprice::{ModelBundle, PipelineConfig};

#[derive(Parser)]
#[command(name = "flatprice")]
#[command(about = "Flat price prediction: train, evaluate, predict and serve")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter, e.g. `info` or `flatprice=debug`. Falls back to RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the ensemble and save its artifacts
    Train {
        /// Training CSV with a `price` column
        #[arg(long, default_value = "data/data.csv")]
        data: PathBuf,

        /// Ensemble members, comma separated
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<String>>,

        /// Artifact directory
        #[arg(long, default_value = "models")]
        output: PathBuf,

        /// JSON pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Hold-out test fraction
        #[arg(long)]
        test_size: Option<f64>,

        /// Validation fraction of the whole dataset
        #[arg(long)]
        val_size: Option<f64>,

        /// Also report k-fold cross-validation scores
        #[arg(long)]
        cv: bool,
    },
    /// Score saved artifacts on a labelled CSV
    Evaluate {
        #[arg(long)]
        data: PathBuf,

        /// Artifact directory written by `train`
        #[arg(long, default_value = "models")]
        model_dir: PathBuf,

        /// Write metrics as JSON into this directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Predict one request file (`{...}` or `{"properties": [...]}`)
    Predict {
        /// JSON request file
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "models")]
        model_dir: PathBuf,
    },
    /// Serve the REST API
    Serve {
        #[arg(long, default_value = "models")]
        model_dir: PathBuf,

        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
    },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Train {
            data,
            models,
            output,
            config,
            test_size,
            val_size,
            cv,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::from_json_file(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(models) = models {
                config.models = models;
            }
            if let Some(test_size) = test_size {
                config.split.test_size = test_size;
            }
            if let Some(val_size) = val_size {
                config.split.validation_size = val_size;
            }
            train(&data, &output, &config, cv)
        }
        Commands::Evaluate {
            data,
            model_dir,
            output,
        } => evaluate(&data, &model_dir, output.as_deref()),
        Commands::Predict { input, model_dir } => predict(&input, &model_dir),
        Commands::Serve { model_dir, addr } => {
            let predictor = Arc::new(Predictor::load(&model_dir)?);
            let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
            runtime.block_on(serving::serve(predictor, addr))?;
            Ok(())
        }
    }
}

fn train(data: &Path, output: &Path, config: &PipelineConfig, cv: bool) -> anyhow::Result<()> {
    config.validate()?;
    let frame = load_csv(data).with_context(|| format!("loading {}", data.display()))?;
    tracing::info!(rows = frame.n_rows(), columns = frame.n_cols(), "loaded training data");

    if cv {
        for (model, scores) in workflow::cross_validate(&frame, config)? {
            println!(
                "{model:<12} cv r2 {:.4} ± {:.4} over {} folds",
                scores.mean,
                scores.std,
                scores.fold_scores.len()
            );
        }
    }

    let outcome = workflow::train(&frame, config)?;
    if let Some((_, metrics)) = outcome.test_metrics.iter().find(|(n, _)| n == ENSEMBLE_ID) {
        print!("{}", format_report(metrics));
    }
    if !outcome.rankings.is_empty() {
        print!("{}", format_comparison(&outcome.rankings));
    }
    outcome.bundle.save(output)?;
    println!("artifacts saved to {}", output.display());
    Ok(())
}

fn evaluate(data: &Path, model_dir: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let bundle = ModelBundle::load(model_dir)?;
    let frame = load_csv(data).with_context(|| format!("loading {}", data.display()))?;
    let results = workflow::evaluate(&bundle, &frame)?;

    for (name, metrics) in &results {
        println!("== {name} ==");
        print!("{}", format_report(metrics));
    }
    print!("{}", format_comparison(&compare(&results)));

    if let Some(dir) = output {
        let store = ArtifactStore::create(dir)?;
        let table: std::collections::BTreeMap<&str, &Metrics> =
            results.iter().map(|(n, m)| (n.as_str(), m)).collect();
        let path = store.write_json("evaluation_metrics.json", &table)?;
        println!("metrics saved to {}", path.display());
    }
    Ok(())
}

fn predict(input: &Path, model_dir: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let body: Value = serde_json::from_str(&text).context("request file is not valid JSON")?;
    if !body.is_object() {
        bail!("request must be a JSON object");
    }

    let predictor = Predictor::load(model_dir)?;
    let response = if body.get("properties").is_some() {
        serde_json::to_string_pretty(&predictor.predict_batch(&body)?)?
    } else {
        serde_json::to_string_pretty(&predictor.predict_one(&body)?)?
    };
    println!("{response}");
    Ok(())
}
