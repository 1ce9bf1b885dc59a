use qst_core::errors::{ErrorInfo, QstError};
use qst_core::RngHandle;
use qst_rbm::WaveFunction;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::observable::Observable;

/// Sampled estimate after a given number of Gibbs steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    /// Gibbs steps applied to the chains so far.
    pub steps: usize,
    /// Sample mean of the observable.
    pub mean: f64,
    /// `100 |mean - reference| / |reference|`.
    pub percent_error: f64,
}

/// Tracks an observable while `num_samples` chains are driven towards
/// equilibrium.
///
/// Chains start from uniform random bits and are advanced cumulatively, so
/// `steps` must be non-decreasing. Each entry of the result corresponds to
/// the matching entry of `steps`.
pub fn energy_convergence(
    model: &dyn WaveFunction,
    observable: &dyn Observable,
    steps: &[usize],
    num_samples: usize,
    reference: f64,
    rng: &mut RngHandle,
) -> Result<Vec<ConvergencePoint>, QstError> {
    if num_samples == 0 {
        return Err(QstError::Config(ErrorInfo::new(
            "invalid-sample-count",
            "convergence study needs at least one chain",
        )));
    }
    if reference == 0.0 || !reference.is_finite() {
        return Err(QstError::Config(
            ErrorInfo::new("invalid-reference", "reference value must be finite and non-zero")
                .with_context("reference", reference.to_string()),
        ));
    }
    if let Some(pair) = steps.windows(2).find(|pair| pair[1] < pair[0]) {
        return Err(QstError::Config(
            ErrorInfo::new("unsorted-steps", "step counts must be non-decreasing")
                .with_context("previous", pair[0].to_string())
                .with_context("next", pair[1].to_string()),
        ));
    }

    let mut chains = model.sample(0, num_samples, None, rng)?;
    let mut done = 0;
    let mut points = Vec::with_capacity(steps.len());
    for &target in steps {
        if target > done {
            chains = model.sample(target - done, num_samples, Some(&chains), rng)?;
            done = target;
        }
        let mean = observable.estimate(model, &chains)?;
        let percent_error = 100.0 * (mean - reference).abs() / reference.abs();
        debug!(steps = done, mean, percent_error, observable = %observable.name(), "convergence point");
        points.push(ConvergencePoint {
            steps: done,
            mean,
            percent_error,
        });
    }
    Ok(points)
}
