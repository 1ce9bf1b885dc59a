use qst_core::errors::{ErrorInfo, QstError};
use qst_core::RngHandle;
use qst_data::TrainingSet;
use qst_rbm::WaveFunction;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::callbacks::{Callback, CallbackFlow, EpochLog};
use crate::config::TrainConfig;
use crate::determinism::epoch_seed;
use crate::optimizer::Optimizer;

/// Loop parameters for [`fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Last epoch to run (epochs are numbered from 1).
    pub epochs: usize,
    /// Samples per positive-phase batch.
    pub pos_batch_size: usize,
    /// Chains per negative-phase batch; defaults to `pos_batch_size`.
    pub neg_batch_size: Option<usize>,
    /// Gibbs steps per negative-phase estimate.
    pub k: usize,
    /// Master seed for shuffling and sampling.
    pub seed: u64,
    /// Epochs already completed, e.g. when resuming.
    pub starting_epoch: usize,
}

impl FitOptions {
    /// Loop parameters taken from a run configuration.
    pub fn from_config(config: &TrainConfig) -> Self {
        Self {
            epochs: config.epochs,
            pos_batch_size: config.pos_batch_size,
            neg_batch_size: config.neg_batch_size,
            k: config.k,
            seed: config.seed_policy.master_seed,
            starting_epoch: 0,
        }
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self::from_config(&TrainConfig::default())
    }
}

/// Outcome of [`fit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitSummary {
    /// Epochs executed by this call.
    pub epochs_run: usize,
    /// Last completed epoch.
    pub last_epoch: usize,
    /// True when a callback requested the stop.
    pub stopped_early: bool,
    /// Parameter hash after the last update.
    pub final_params_hash: String,
}

fn check_inputs(
    model: &dyn WaveFunction,
    data: &TrainingSet,
    options: &FitOptions,
) -> Result<(), QstError> {
    if data.is_empty() {
        return Err(QstError::Training(ErrorInfo::new(
            "empty-data",
            "training requires at least one sample",
        )));
    }
    if data.num_visible() != model.num_visible() {
        return Err(QstError::Data(
            ErrorInfo::new("site-mismatch", "sample width differs from visible units")
                .with_context("expected", model.num_visible().to_string())
                .with_context("found", data.num_visible().to_string()),
        ));
    }
    if options.pos_batch_size == 0 || options.neg_batch_size == Some(0) || options.k == 0 {
        return Err(QstError::Config(
            ErrorInfo::new("invalid-config", "batch sizes and k must be positive")
                .with_context("pos_batch_size", options.pos_batch_size.to_string())
                .with_context("k", options.k.to_string()),
        ));
    }
    Ok(())
}

/// Trains `model` on `data` by contrastive divergence.
///
/// Each epoch shuffles the rows with a seed derived from `(seed, epoch)`,
/// walks them in positive batches (the last one may be short) and pairs each
/// with a negative batch. When both batch sizes agree and the data has no
/// bases the negative batch reuses the positive rows; otherwise chain seeds
/// are drawn with replacement from the reference-basis rows, or from every
/// row when none was measured in the reference basis.
pub fn fit(
    model: &mut dyn WaveFunction,
    data: &TrainingSet,
    options: &FitOptions,
    optimizer: &mut dyn Optimizer,
    callbacks: &mut [&mut dyn Callback],
) -> Result<FitSummary, QstError> {
    check_inputs(model, data, options)?;
    let pos_size = options.pos_batch_size;
    let neg_size = options.neg_batch_size.unwrap_or(pos_size);
    let shared_batches = neg_size == pos_size && data.bases().is_none();
    let mut neg_pool = data.reference_samples();
    if neg_pool.nrows() == 0 {
        neg_pool = data.samples().clone();
    }

    for callback in callbacks.iter_mut() {
        callback.on_train_start(model)?;
    }

    let mut last_epoch = options.starting_epoch;
    let mut stopped_early = false;
    for epoch in (options.starting_epoch + 1)..=options.epochs {
        for callback in callbacks.iter_mut() {
            callback.on_epoch_start(epoch, model)?;
        }
        let mut rng = RngHandle::from_seed(epoch_seed(options.seed, epoch));
        let mut order: Vec<usize> = (0..data.len()).collect();
        order.shuffle(&mut rng);

        for (batch, rows) in order.chunks(pos_size).enumerate() {
            let positive = data.subset(rows);
            let negative = if shared_batches {
                positive.samples().clone()
            } else {
                let picks: Vec<usize> = (0..neg_size)
                    .map(|_| rng.gen_range(0..neg_pool.nrows()))
                    .collect();
                neg_pool.select_rows(picks.iter())
            };
            let grads = model
                .compute_batch_gradients(
                    options.k,
                    positive.samples(),
                    &negative,
                    positive.bases(),
                    &mut rng,
                )
                .map_err(|err| with_epoch(err, epoch))?;
            optimizer
                .step(model, &grads)
                .map_err(|err| with_epoch(err, epoch))?;
            for callback in callbacks.iter_mut() {
                callback.on_batch_end(epoch, batch, model)?;
            }
        }

        let mut log = EpochLog::new();
        for callback in callbacks.iter_mut() {
            if callback.on_epoch_end(epoch, model, &mut log)? == CallbackFlow::Stop {
                stopped_early = true;
            }
        }
        debug!(epoch, values = ?log, "epoch complete");
        last_epoch = epoch;
        if stopped_early {
            break;
        }
    }

    for callback in callbacks.iter_mut() {
        callback.on_train_end(model)?;
    }

    Ok(FitSummary {
        epochs_run: last_epoch - options.starting_epoch,
        last_epoch,
        stopped_early,
        final_params_hash: model.params_hash(),
    })
}

fn with_epoch(err: QstError, epoch: usize) -> QstError {
    err.with_context("epoch", epoch.to_string())
}
