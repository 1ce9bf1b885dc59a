#![deny(missing_docs)]

//! Contrastive-divergence training of RBM wavefunctions with metric
//! tracking, checkpointing and reproducible run manifests.

/// Training hooks: metric evaluation, early stopping and snapshots.
pub mod callbacks;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// The epoch/batch training loop.
pub mod fit;
/// Run manifest serialization helpers.
pub mod manifest;
/// Fidelity, KL divergence and negative log-likelihood.
pub mod metrics;
/// Parameter update rules.
pub mod optimizer;
/// Public `train`/`resume` entry points.
pub mod run;

pub use callbacks::{
    Callback, CallbackFlow, EarlyStopping, EpochLog, LambdaCallback, MetricEvaluator,
    MetricRecord, ModelSaver,
};
pub use config::{
    CheckpointConfig, EarlyStoppingConfig, EvaluationConfig, OutputConfig, SeedPolicy,
    TrainConfig,
};
pub use fit::{fit, FitOptions, FitSummary};
pub use manifest::RunManifest;
pub use metrics::{fidelity, kl_divergence, negative_log_likelihood, MetricContext, MetricKind};
pub use optimizer::{Optimizer, Sgd};
pub use run::{build_model, resume, train, RunSummary};
