use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use qst_core::errors::QstError;
use qst_core::{Complex64, UnitaryDict, MAX_EXACT_SITES};
use qst_data::TrainingSet;
use qst_rbm::{
    autoload, ComplexWaveFunction, LoadedModel, ModelKind, PositiveWaveFunction, RbmInit,
};
use tracing::{info, warn};

use crate::callbacks::{snapshot_epoch, Callback, EarlyStopping, MetricEvaluator, MetricRecord, ModelSaver};
use crate::config::TrainConfig;
use crate::determinism::init_seed;
use crate::fit::{fit, FitOptions, FitSummary};
use crate::manifest::{provenance, RunManifest};
use crate::optimizer::Sgd;

/// Result of [`train`] or [`resume`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Trained model.
    pub model: LoadedModel,
    /// Loop outcome.
    pub fit: FitSummary,
    /// Metric history.
    pub history: Vec<MetricRecord>,
    /// Final model artifact, if a run directory was configured.
    pub model_path: Option<PathBuf>,
    /// Metrics CSV, if written.
    pub metrics_path: Option<PathBuf>,
    /// Manifest JSON, if written.
    pub manifest_path: Option<PathBuf>,
    /// Checkpoints still on disk.
    pub checkpoints: Vec<PathBuf>,
}

/// Builds a freshly initialised model as described by `config`.
pub fn build_model(
    kind: ModelKind,
    num_visible: usize,
    config: &TrainConfig,
    unitaries: UnitaryDict,
) -> Result<LoadedModel, QstError> {
    let init = RbmInit {
        num_hidden: config.num_hidden,
        zero_weights: config.zero_weights,
        seed: init_seed(config.seed_policy.master_seed),
    };
    Ok(match kind {
        ModelKind::Positive => LoadedModel::Positive(
            PositiveWaveFunction::new(num_visible, &init)?.with_unitaries(unitaries),
        ),
        ModelKind::Complex => {
            LoadedModel::Complex(ComplexWaveFunction::new(num_visible, &init, unitaries)?)
        }
    })
}

/// Trains a new model of family `kind` on `data`.
///
/// Fidelity and KL are only evaluated when `target` is given. With a run
/// directory configured the model, metrics CSV, manifest and checkpoints
/// are written beneath it.
pub fn train(
    config: &TrainConfig,
    data: &TrainingSet,
    target: Option<&[Complex64]>,
    kind: ModelKind,
    unitaries: UnitaryDict,
) -> Result<RunSummary, QstError> {
    config.validate()?;
    data.validate(data.num_visible(), &unitaries, None)?;
    let model = build_model(kind, data.num_visible(), config, unitaries)?;
    run_model(config, data, target, model, 0)
}

/// Continues training from a snapshot written by a checkpointing run.
pub fn resume(
    checkpoint: &Path,
    config: &TrainConfig,
    data: &TrainingSet,
    target: Option<&[Complex64]>,
) -> Result<RunSummary, QstError> {
    config.validate()?;
    let (model, metadata) = autoload(checkpoint)?;
    let epoch = snapshot_epoch(&metadata, checkpoint)?;
    data.validate(
        model.as_wavefunction().num_visible(),
        model.as_wavefunction().unitaries(),
        None,
    )?;
    info!(path = %checkpoint.display(), epoch, "resuming from checkpoint");
    run_model(config, data, target, model, epoch)
}

fn build_evaluator(
    config: &TrainConfig,
    data: &TrainingSet,
    target: Option<&[Complex64]>,
) -> MetricEvaluator {
    let enumerable = data.num_visible() <= MAX_EXACT_SITES;
    let metrics = config
        .evaluation
        .metrics
        .iter()
        .copied()
        .filter(|metric| {
            if !enumerable {
                warn!(
                    metric = %metric,
                    sites = data.num_visible(),
                    max_sites = MAX_EXACT_SITES,
                    "skipping metric that needs the enumerated Hilbert space"
                );
                return false;
            }
            let keep = target.is_some() || !metric.requires_target();
            if !keep {
                info!(metric = %metric, "skipping metric without a target state");
            }
            keep
        })
        .collect();
    let mut evaluator = MetricEvaluator::new(config.evaluation.period, metrics, data.num_visible())
        .verbose(config.evaluation.verbose)
        .with_samples(data.clone());
    if let Some(target) = target {
        evaluator = evaluator.with_target(target.to_vec());
    }
    if data.bases().is_some() {
        evaluator = evaluator.with_bases(data.unique_bases());
    }
    evaluator
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn run_model(
    config: &TrainConfig,
    data: &TrainingSet,
    target: Option<&[Complex64]>,
    mut model: LoadedModel,
    starting_epoch: usize,
) -> Result<RunSummary, QstError> {
    let seed = config.seed_policy.master_seed;
    let run_dir = config.output.run_directory.clone();
    let mut evaluator = build_evaluator(config, data, target);
    let mut stopping = config.early_stopping.as_ref().map(|rule| {
        if !evaluator.metrics().contains(&rule.monitor) {
            warn!(monitor = %rule.monitor, "early stopping monitors a metric that is not evaluated");
        }
        EarlyStopping::new(rule.monitor.as_str(), rule.tolerance, rule.patience)
    });
    let mut saver = match (&run_dir, config.checkpoint.interval) {
        (Some(dir), interval) if interval > 0 => {
            let extension = config
                .output
                .model_file
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("json")
                .to_string();
            let mut metadata = BTreeMap::new();
            metadata.insert("seed".to_string(), seed.to_string());
            Some(
                ModelSaver::new(
                    dir.join(&config.output.checkpoint_dir),
                    interval,
                    config.checkpoint.max_to_keep,
                )
                .with_extension(extension)
                .with_metadata(metadata),
            )
        }
        _ => None,
    };

    let mut options = FitOptions::from_config(config);
    options.starting_epoch = starting_epoch;
    let mut optimizer = Sgd::new(config.learning_rate, config.momentum);
    info!(
        kind = model.kind().as_str(),
        epochs = config.epochs,
        starting_epoch,
        samples = data.len(),
        "training started"
    );
    let summary = {
        let mut callbacks: Vec<&mut dyn Callback> = vec![&mut evaluator];
        if let Some(stopping) = stopping.as_mut() {
            callbacks.push(stopping);
        }
        if let Some(saver) = saver.as_mut() {
            callbacks.push(saver);
        }
        fit(
            model.as_wavefunction_mut(),
            data,
            &options,
            &mut optimizer,
            &mut callbacks,
        )?
    };
    info!(
        epochs_run = summary.epochs_run,
        stopped_early = summary.stopped_early,
        params_hash = %summary.final_params_hash,
        "training finished"
    );

    let final_metrics: BTreeMap<String, f64> = evaluator
        .latest()
        .map(|record| {
            record
                .values
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect()
        })
        .unwrap_or_default();
    let checkpoints: Vec<PathBuf> = saver
        .as_ref()
        .map(|saver| saver.saved().to_vec())
        .unwrap_or_default();

    let (model_path, metrics_path, manifest_path) = match &run_dir {
        Some(dir) => {
            let model_path = dir.join(&config.output.model_file);
            let mut metadata: BTreeMap<String, String> = final_metrics
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect();
            metadata.insert("epoch".to_string(), summary.last_epoch.to_string());
            metadata.insert("seed".to_string(), seed.to_string());
            model.as_wavefunction().save(&model_path, metadata)?;

            let metrics_path = dir.join(&config.output.metrics_file);
            evaluator.write_csv(&metrics_path)?;

            let wavefunction = model.as_wavefunction();
            let manifest = RunManifest {
                config: config.clone(),
                master_seed: seed,
                seed_label: config.seed_policy.label.clone(),
                model_kind: wavefunction.kind(),
                num_visible: wavefunction.num_visible(),
                num_hidden: wavefunction.num_hidden(),
                starting_epoch,
                last_epoch: summary.last_epoch,
                stopped_early: summary.stopped_early,
                params_hash: summary.final_params_hash.clone(),
                model_file: Some(relative_to(&model_path, dir)),
                metrics_file: Some(relative_to(&metrics_path, dir)),
                checkpoints: checkpoints.iter().map(|path| relative_to(path, dir)).collect(),
                final_metrics,
                provenance: provenance(data, seed),
            };
            let manifest_path = dir.join(&config.output.manifest_file);
            manifest.write(&manifest_path)?;
            (Some(model_path), Some(metrics_path), Some(manifest_path))
        }
        None => (None, None, None),
    };

    Ok(RunSummary {
        model,
        fit: summary,
        history: evaluator.history().to_vec(),
        model_path,
        metrics_path,
        manifest_path,
        checkpoints,
    })
}
