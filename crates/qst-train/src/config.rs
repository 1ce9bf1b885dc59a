use std::fs;
use std::path::{Path, PathBuf};

use qst_core::errors::{ErrorInfo, QstError};
use qst_data::DataPaths;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricKind;

/// YAML-configurable parameters governing a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of passes over the training data.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Samples per positive-phase batch.
    #[serde(default = "default_batch_size")]
    pub pos_batch_size: usize,
    /// Chains per negative-phase batch; defaults to `pos_batch_size`.
    #[serde(default)]
    pub neg_batch_size: Option<usize>,
    /// Gibbs steps per negative-phase estimate.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Gradient-descent step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Momentum coefficient (0 disables momentum).
    #[serde(default)]
    pub momentum: f64,
    /// Hidden units per network; defaults to the number of sites.
    #[serde(default)]
    pub num_hidden: Option<usize>,
    /// Start from zero weights instead of Gaussian noise.
    #[serde(default)]
    pub zero_weights: bool,
    /// Master seed and its label.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Metric evaluation schedule.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Optional convergence-based stopping rule.
    #[serde(default)]
    pub early_stopping: Option<EarlyStoppingConfig>,
    /// Periodic model snapshots.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Output directory layout.
    #[serde(default)]
    pub output: OutputConfig,
    /// Input files; command-line paths take precedence.
    #[serde(default)]
    pub data: Option<DataPaths>,
}

fn default_epochs() -> usize {
    100
}

fn default_batch_size() -> usize {
    100
}

fn default_k() -> usize {
    1
}

fn default_learning_rate() -> f64 {
    1e-3
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            pos_batch_size: default_batch_size(),
            neg_batch_size: None,
            k: default_k(),
            learning_rate: default_learning_rate(),
            momentum: 0.0,
            num_hidden: None,
            zero_weights: false,
            seed_policy: SeedPolicy::default(),
            evaluation: EvaluationConfig::default(),
            early_stopping: None,
            checkpoint: CheckpointConfig::default(),
            output: OutputConfig::default(),
            data: None,
        }
    }
}

impl TrainConfig {
    /// Parses a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, QstError> {
        let config: TrainConfig = serde_yaml::from_str(yaml).map_err(|err| {
            QstError::Config(ErrorInfo::new("config-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self, QstError> {
        let text = fs::read_to_string(path).map_err(|err| {
            QstError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Effective negative batch size.
    pub fn neg_batch_size(&self) -> usize {
        self.neg_batch_size.unwrap_or(self.pos_batch_size)
    }

    /// Rejects zero sizes and non-positive rates.
    pub fn validate(&self) -> Result<(), QstError> {
        let invalid = |field: &str, value: String| {
            Err(QstError::Config(
                ErrorInfo::new("invalid-config", "configuration value out of range")
                    .with_context("field", field)
                    .with_context("value", value),
            ))
        };
        if self.epochs == 0 {
            return invalid("epochs", self.epochs.to_string());
        }
        if self.pos_batch_size == 0 {
            return invalid("pos_batch_size", self.pos_batch_size.to_string());
        }
        if self.neg_batch_size == Some(0) {
            return invalid("neg_batch_size", "0".to_string());
        }
        if self.k == 0 {
            return invalid("k", self.k.to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return invalid("learning_rate", self.learning_rate.to_string());
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return invalid("momentum", self.momentum.to_string());
        }
        if self.num_hidden == Some(0) {
            return invalid("num_hidden", "0".to_string());
        }
        if self.evaluation.period == 0 {
            return invalid("evaluation.period", "0".to_string());
        }
        if let Some(stopping) = &self.early_stopping {
            if stopping.patience == 0 {
                return invalid("early_stopping.patience", "0".to_string());
            }
            if !(stopping.tolerance > 0.0) {
                return invalid("early_stopping.tolerance", stopping.tolerance.to_string());
            }
        }
        if self.checkpoint.interval > 0 && self.checkpoint.max_to_keep == 0 {
            return invalid("checkpoint.max_to_keep", "0".to_string());
        }
        Ok(())
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed from which every random stream is derived.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Metric evaluation schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Evaluate every `period` epochs.
    #[serde(default = "default_period")]
    pub period: usize,
    /// Metrics to compute.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricKind>,
    /// Log every evaluation at info level.
    #[serde(default)]
    pub verbose: bool,
}

fn default_period() -> usize {
    1
}

fn default_metrics() -> Vec<MetricKind> {
    vec![MetricKind::Fidelity, MetricKind::Kl]
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            metrics: default_metrics(),
            verbose: false,
        }
    }
}

/// Stop once a monitored metric stops changing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    /// Metric to monitor.
    #[serde(default = "default_monitor")]
    pub monitor: MetricKind,
    /// Relative change below which a check counts as stalled.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Consecutive stalled checks before stopping.
    #[serde(default = "default_patience")]
    pub patience: usize,
}

fn default_monitor() -> MetricKind {
    MetricKind::Kl
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_patience() -> usize {
    3
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            monitor: default_monitor(),
            tolerance: default_tolerance(),
            patience: default_patience(),
        }
    }
}

/// Checkpointing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in epochs between snapshots (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Maximum number of snapshots to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Nothing is written when unset.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Trained model filename relative to `run_directory`; `.json` selects JSON.
    #[serde(default = "default_model_filename")]
    pub model_file: PathBuf,
    /// Metrics filename relative to `run_directory`.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

fn default_model_filename() -> PathBuf {
    PathBuf::from("model.json")
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("metrics.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            model_file: default_model_filename(),
            metrics_file: default_metrics_filename(),
            manifest_file: default_manifest_filename(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}
