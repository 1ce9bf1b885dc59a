use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qst_core::UnitaryDict;
use qst_data::{load_data, DataPaths};
use qst_train::{resume, train, TrainConfig};
use serde::Serialize;
use tracing::info;

use super::{print_json, KindArg};

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// YAML run configuration; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Measurement outcomes, one configuration per line.
    #[arg(long)]
    pub train_samples: Option<PathBuf>,
    /// Basis of each measurement line.
    #[arg(long)]
    pub train_bases: Option<PathBuf>,
    /// Every basis that may appear in the data.
    #[arg(long)]
    pub unique_bases: Option<PathBuf>,
    /// Exact target wavefunction enabling fidelity and KL.
    #[arg(long)]
    pub target: Option<PathBuf>,
    /// Wavefunction family to train.
    #[arg(long, value_enum, default_value_t = KindArg::Positive)]
    pub kind: KindArg,
    /// Run directory for the model, metrics, manifest and checkpoints.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Override the number of epochs.
    #[arg(long)]
    pub epochs: Option<usize>,
    /// Override the master seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Continue from a checkpoint written by an earlier run.
    #[arg(long)]
    pub resume: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct TrainReport {
    kind: String,
    last_epoch: usize,
    epochs_run: usize,
    stopped_early: bool,
    params_hash: String,
    model_path: Option<PathBuf>,
    final_metrics: BTreeMap<String, f64>,
}

fn data_paths(args: &TrainArgs, config: &TrainConfig) -> Result<DataPaths, Box<dyn Error>> {
    let mut paths = config.data.clone().unwrap_or_default();
    if let Some(path) = &args.train_samples {
        paths.train_samples = path.clone();
    }
    if args.train_bases.is_some() {
        paths.train_bases = args.train_bases.clone();
    }
    if args.unique_bases.is_some() {
        paths.unique_bases = args.unique_bases.clone();
    }
    if args.target.is_some() {
        paths.target = args.target.clone();
    }
    if paths.train_samples.as_os_str().is_empty() {
        return Err("--train-samples is required unless the config names a data file".into());
    }
    Ok(paths)
}

pub fn run(args: &TrainArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::from_path(path)?,
        None => TrainConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    if args.out.is_some() {
        config.output.run_directory = args.out.clone();
    }
    config.validate()?;

    let paths = data_paths(args, &config)?;
    let data = load_data(&paths)?;
    let unitaries = UnitaryDict::standard();
    data.training.validate(
        data.training.num_visible(),
        &unitaries,
        data.unique_bases.as_deref(),
    )?;
    info!(
        rows = data.training.len(),
        sites = data.training.num_visible(),
        "data loaded"
    );

    let target = data.target.as_deref();
    let summary = match &args.resume {
        Some(checkpoint) => resume(checkpoint, &config, &data.training, target)?,
        None => train(&config, &data.training, target, args.kind.into(), unitaries)?,
    };
    let final_metrics = summary
        .history
        .last()
        .map(|record| {
            record
                .values
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect()
        })
        .unwrap_or_default();
    print_json(&TrainReport {
        kind: summary.model.kind().as_str().to_string(),
        last_epoch: summary.fit.last_epoch,
        epochs_run: summary.fit.epochs_run,
        stopped_early: summary.fit.stopped_early,
        params_hash: summary.fit.final_params_hash,
        model_path: summary.model_path,
        final_metrics,
    })
}
