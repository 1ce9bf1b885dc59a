use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use nalgebra::DMatrix;
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{hilbert_space, Basis, Complex64};
use qst_data::TrainingSet;
use qst_rbm::WaveFunction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::{MetricContext, MetricKind};

/// Values published during one epoch, keyed by name in publication order.
pub type EpochLog = IndexMap<String, f64>;

/// Whether training should go on after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    /// Keep training.
    Continue,
    /// Stop after the current epoch.
    Stop,
}

/// Hooks invoked by [`crate::fit`].
///
/// Callbacks run in order; `on_epoch_end` receives the log filled by the
/// callbacks before it, so monitors should follow the evaluators they read.
pub trait Callback {
    /// Before the first epoch.
    fn on_train_start(&mut self, _model: &dyn WaveFunction) -> Result<(), QstError> {
        Ok(())
    }

    /// Before each epoch.
    fn on_epoch_start(&mut self, _epoch: usize, _model: &dyn WaveFunction) -> Result<(), QstError> {
        Ok(())
    }

    /// After each parameter update.
    fn on_batch_end(
        &mut self,
        _epoch: usize,
        _batch: usize,
        _model: &dyn WaveFunction,
    ) -> Result<(), QstError> {
        Ok(())
    }

    /// After each epoch.
    fn on_epoch_end(
        &mut self,
        _epoch: usize,
        _model: &dyn WaveFunction,
        _log: &mut EpochLog,
    ) -> Result<CallbackFlow, QstError> {
        Ok(CallbackFlow::Continue)
    }

    /// After the last epoch, including early stops.
    fn on_train_end(&mut self, _model: &dyn WaveFunction) -> Result<(), QstError> {
        Ok(())
    }
}

/// Metric values recorded at one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Epoch at which the metrics were computed.
    pub epoch: usize,
    /// Metric values in evaluation order.
    pub values: IndexMap<String, f64>,
}

/// Computes metrics every `period` epochs and keeps their history.
pub struct MetricEvaluator {
    period: usize,
    metrics: Vec<MetricKind>,
    verbose: bool,
    num_visible: usize,
    space: Option<DMatrix<f64>>,
    target: Option<Vec<Complex64>>,
    bases: Option<Vec<Basis>>,
    samples: Option<TrainingSet>,
    history: Vec<MetricRecord>,
}

impl MetricEvaluator {
    /// Creates an evaluator for a model over `num_visible` sites.
    ///
    /// The Hilbert space is enumerated on the first evaluation that computes
    /// a metric, so an evaluator without metrics works at any width.
    pub fn new(period: usize, metrics: Vec<MetricKind>, num_visible: usize) -> Self {
        Self {
            period: period.max(1),
            metrics,
            verbose: false,
            num_visible,
            space: None,
            target: None,
            bases: None,
            samples: None,
            history: Vec::new(),
        }
    }

    /// Sets the target state for fidelity and KL.
    pub fn with_target(mut self, target: Vec<Complex64>) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the bases over which KL is averaged.
    pub fn with_bases(mut self, bases: Vec<Basis>) -> Self {
        self.bases = Some(bases);
        self
    }

    /// Sets the data used for the negative log-likelihood.
    pub fn with_samples(mut self, samples: TrainingSet) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Logs every evaluation at info level instead of debug.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Evaluates every metric now and records the result under `epoch`.
    pub fn evaluate(
        &mut self,
        epoch: usize,
        model: &dyn WaveFunction,
    ) -> Result<&MetricRecord, QstError> {
        let mut values = IndexMap::new();
        if self.metrics.is_empty() {
            self.history.push(MetricRecord { epoch, values });
            return Ok(&self.history[self.history.len() - 1]);
        }
        let space = match self.space.take() {
            Some(space) => space,
            None => hilbert_space(self.num_visible)?,
        };
        let space = self.space.insert(space);
        let ctx = MetricContext {
            model,
            space: &*space,
            target: self.target.as_deref(),
            bases: self.bases.as_deref(),
            samples: self
                .samples
                .as_ref()
                .map(|set| (set.samples(), set.bases())),
        };
        for metric in &self.metrics {
            values.insert(metric.as_str().to_string(), metric.evaluate(&ctx)?);
        }
        if self.verbose {
            info!(epoch, metrics = ?values, "evaluation");
        } else {
            debug!(epoch, metrics = ?values, "evaluation");
        }
        self.history.push(MetricRecord { epoch, values });
        Ok(&self.history[self.history.len() - 1])
    }

    /// Every recorded evaluation, oldest first.
    pub fn history(&self) -> &[MetricRecord] {
        &self.history
    }

    /// Most recent evaluation.
    pub fn latest(&self) -> Option<&MetricRecord> {
        self.history.last()
    }

    /// Series of one metric across the history.
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.history
            .iter()
            .filter_map(|record| record.values.get(name).copied())
            .collect()
    }

    /// Metrics computed by this evaluator.
    pub fn metrics(&self) -> &[MetricKind] {
        &self.metrics
    }

    /// Writes the history as `epoch,<metric>...` rows.
    pub fn write_csv(&self, path: &Path) -> Result<(), QstError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| QstError::io("metrics-mkdir", parent, err))?;
            }
        }
        let mut writer =
            csv::Writer::from_path(path).map_err(|err| QstError::io("metrics-write", path, err))?;
        let mut header = vec!["epoch".to_string()];
        header.extend(self.metrics.iter().map(|metric| metric.as_str().to_string()));
        writer
            .write_record(&header)
            .map_err(|err| QstError::io("metrics-write", path, err))?;
        for record in &self.history {
            let mut row = vec![record.epoch.to_string()];
            row.extend(header[1..].iter().map(|name| {
                record
                    .values
                    .get(name)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            }));
            writer
                .write_record(&row)
                .map_err(|err| QstError::io("metrics-write", path, err))?;
        }
        writer
            .flush()
            .map_err(|err| QstError::io("metrics-write", path, err))
    }
}

impl Callback for MetricEvaluator {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        model: &dyn WaveFunction,
        log: &mut EpochLog,
    ) -> Result<CallbackFlow, QstError> {
        if epoch % self.period == 0 {
            let record = self.evaluate(epoch, model)?;
            for (name, value) in &record.values {
                log.insert(name.clone(), *value);
            }
        }
        Ok(CallbackFlow::Continue)
    }
}

/// Stops training once a monitored value stalls.
///
/// A check counts as stalled when `|x_t - x_{t-1}| / |x_{t-1}|` falls below
/// `tolerance`; `patience` consecutive stalled checks stop the run.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    monitor: String,
    tolerance: f64,
    patience: usize,
    previous: Option<f64>,
    stalled: usize,
    stopped_at: Option<usize>,
}

impl EarlyStopping {
    /// Monitors `monitor` in the epoch log.
    pub fn new(monitor: impl Into<String>, tolerance: f64, patience: usize) -> Self {
        Self {
            monitor: monitor.into(),
            tolerance,
            patience: patience.max(1),
            previous: None,
            stalled: 0,
            stopped_at: None,
        }
    }

    /// Epoch at which the rule fired, if it did.
    pub fn stopped_at(&self) -> Option<usize> {
        self.stopped_at
    }
}

impl Callback for EarlyStopping {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        _model: &dyn WaveFunction,
        log: &mut EpochLog,
    ) -> Result<CallbackFlow, QstError> {
        let Some(&value) = log.get(&self.monitor) else {
            return Ok(CallbackFlow::Continue);
        };
        if let Some(previous) = self.previous {
            let scale = if previous == 0.0 { 1.0 } else { previous.abs() };
            if (value - previous).abs() / scale < self.tolerance {
                self.stalled += 1;
            } else {
                self.stalled = 0;
            }
        }
        self.previous = Some(value);
        if self.stalled >= self.patience {
            info!(epoch, monitor = %self.monitor, value, "early stopping");
            self.stopped_at = Some(epoch);
            return Ok(CallbackFlow::Stop);
        }
        Ok(CallbackFlow::Continue)
    }
}

/// Writes model snapshots every `period` epochs, keeping the newest `max_to_keep`.
#[derive(Debug, Clone)]
pub struct ModelSaver {
    directory: PathBuf,
    period: usize,
    max_to_keep: usize,
    extension: String,
    metadata: BTreeMap<String, String>,
    saved: Vec<PathBuf>,
}

impl ModelSaver {
    /// Saves into `directory` as `epoch_NNNNN.<extension>`.
    pub fn new(directory: impl Into<PathBuf>, period: usize, max_to_keep: usize) -> Self {
        Self {
            directory: directory.into(),
            period: period.max(1),
            max_to_keep: max_to_keep.max(1),
            extension: "json".to_string(),
            metadata: BTreeMap::new(),
            saved: Vec::new(),
        }
    }

    /// Snapshot file extension; `json` writes JSON, anything else binary.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Extra metadata stored in every snapshot.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Snapshots still on disk, oldest first.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    /// Path of the snapshot for `epoch`.
    pub fn snapshot_path(&self, epoch: usize) -> PathBuf {
        self.directory
            .join(format!("epoch_{epoch:05}.{}", self.extension))
    }
}

impl Callback for ModelSaver {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        model: &dyn WaveFunction,
        log: &mut EpochLog,
    ) -> Result<CallbackFlow, QstError> {
        if epoch % self.period != 0 {
            return Ok(CallbackFlow::Continue);
        }
        let mut metadata = self.metadata.clone();
        metadata.insert("epoch".to_string(), epoch.to_string());
        for (name, value) in log.iter() {
            metadata.insert(name.clone(), value.to_string());
        }
        let path = self.snapshot_path(epoch);
        model.save(&path, metadata)?;
        debug!(epoch, path = %path.display(), "checkpoint written");
        self.saved.push(path);
        while self.saved.len() > self.max_to_keep {
            let stale = self.saved.remove(0);
            fs::remove_file(&stale).map_err(|err| QstError::io("checkpoint-remove", &stale, err))?;
        }
        Ok(CallbackFlow::Continue)
    }
}

type EpochHook<'a> =
    Box<dyn FnMut(usize, &dyn WaveFunction, &mut EpochLog) -> Result<CallbackFlow, QstError> + 'a>;
type BatchHook<'a> = Box<dyn FnMut(usize, usize, &dyn WaveFunction) -> Result<(), QstError> + 'a>;
type TrainHook<'a> = Box<dyn FnMut(&dyn WaveFunction) -> Result<(), QstError> + 'a>;
type EpochStartHook<'a> = Box<dyn FnMut(usize, &dyn WaveFunction) -> Result<(), QstError> + 'a>;

/// Callback assembled from closures.
#[derive(Default)]
pub struct LambdaCallback<'a> {
    train_start: Option<TrainHook<'a>>,
    epoch_start: Option<EpochStartHook<'a>>,
    epoch_end: Option<EpochHook<'a>>,
    batch_end: Option<BatchHook<'a>>,
    train_end: Option<TrainHook<'a>>,
}

impl<'a> LambdaCallback<'a> {
    /// Empty callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` before the first epoch.
    pub fn with_train_start(
        mut self,
        hook: impl FnMut(&dyn WaveFunction) -> Result<(), QstError> + 'a,
    ) -> Self {
        self.train_start = Some(Box::new(hook));
        self
    }

    /// Runs `hook` before each epoch.
    pub fn with_epoch_start(
        mut self,
        hook: impl FnMut(usize, &dyn WaveFunction) -> Result<(), QstError> + 'a,
    ) -> Self {
        self.epoch_start = Some(Box::new(hook));
        self
    }

    /// Runs `hook` after each epoch.
    pub fn with_epoch_end(
        mut self,
        hook: impl FnMut(usize, &dyn WaveFunction, &mut EpochLog) -> Result<CallbackFlow, QstError>
            + 'a,
    ) -> Self {
        self.epoch_end = Some(Box::new(hook));
        self
    }

    /// Runs `hook` after each batch.
    pub fn with_batch_end(
        mut self,
        hook: impl FnMut(usize, usize, &dyn WaveFunction) -> Result<(), QstError> + 'a,
    ) -> Self {
        self.batch_end = Some(Box::new(hook));
        self
    }

    /// Runs `hook` once training finishes.
    pub fn with_train_end(
        mut self,
        hook: impl FnMut(&dyn WaveFunction) -> Result<(), QstError> + 'a,
    ) -> Self {
        self.train_end = Some(Box::new(hook));
        self
    }
}

impl Callback for LambdaCallback<'_> {
    fn on_train_start(&mut self, model: &dyn WaveFunction) -> Result<(), QstError> {
        match self.train_start.as_mut() {
            Some(hook) => hook(model),
            None => Ok(()),
        }
    }

    fn on_epoch_start(&mut self, epoch: usize, model: &dyn WaveFunction) -> Result<(), QstError> {
        match self.epoch_start.as_mut() {
            Some(hook) => hook(epoch, model),
            None => Ok(()),
        }
    }

    fn on_batch_end(
        &mut self,
        epoch: usize,
        batch: usize,
        model: &dyn WaveFunction,
    ) -> Result<(), QstError> {
        match self.batch_end.as_mut() {
            Some(hook) => hook(epoch, batch, model),
            None => Ok(()),
        }
    }

    fn on_epoch_end(
        &mut self,
        epoch: usize,
        model: &dyn WaveFunction,
        log: &mut EpochLog,
    ) -> Result<CallbackFlow, QstError> {
        match self.epoch_end.as_mut() {
            Some(hook) => hook(epoch, model, log),
            None => Ok(CallbackFlow::Continue),
        }
    }

    fn on_train_end(&mut self, model: &dyn WaveFunction) -> Result<(), QstError> {
        match self.train_end.as_mut() {
            Some(hook) => hook(model),
            None => Ok(()),
        }
    }
}

/// Reads the epoch stored in snapshot metadata by [`ModelSaver`].
pub fn snapshot_epoch(metadata: &BTreeMap<String, String>, path: &Path) -> Result<usize, QstError> {
    metadata
        .get("epoch")
        .and_then(|epoch| epoch.parse().ok())
        .ok_or_else(|| {
            QstError::Serde(
                ErrorInfo::new("checkpoint-epoch", "snapshot metadata carries no epoch")
                    .with_context("path", path.display().to_string()),
            )
        })
}
