use std::fmt::{self, Display};

use nalgebra::DMatrix;
use qst_core::cplx::{self, safe_ln};
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{rotate_psi, rotate_psi_inner_prod, Basis, Complex64};
use qst_rbm::WaveFunction;
use serde::{Deserialize, Serialize};

fn check_target(target: &[Complex64], space: &DMatrix<f64>) -> Result<(), QstError> {
    if target.len() != space.nrows() {
        return Err(QstError::Training(
            ErrorInfo::new("psi-size-mismatch", "target size does not match the Hilbert space")
                .with_context("expected", space.nrows().to_string())
                .with_context("found", target.len().to_string()),
        ));
    }
    Ok(())
}

/// Squared overlap `|<target|psi/sqrt(Z)>|^2` over the enumerated `space`.
///
/// The target is normalised on the fly, so unnormalised inputs are accepted.
pub fn fidelity(
    model: &dyn WaveFunction,
    target: &[Complex64],
    space: &DMatrix<f64>,
) -> Result<f64, QstError> {
    check_target(target, space)?;
    let psi = model.psi_space(space);
    let z = model.normalization(space)?;
    let overlap = cplx::inner_prod(target, &psi).norm_sqr();
    Ok(overlap / (z * cplx::norm_sqr(target)))
}

fn kl_from_probabilities(target: &[f64], model: &[f64]) -> f64 {
    target
        .iter()
        .zip(model)
        .map(|(&pt, &pm)| pt * safe_ln(pt) - pt * safe_ln(pm))
        .sum()
}

/// Kullback-Leibler divergence between target and model measurement statistics.
///
/// Without bases the computational-basis distributions are compared;
/// otherwise both states are rotated into every basis and the divergences
/// are averaged.
pub fn kl_divergence(
    model: &dyn WaveFunction,
    target: &[Complex64],
    space: &DMatrix<f64>,
    bases: Option<&[Basis]>,
) -> Result<f64, QstError> {
    check_target(target, space)?;
    let target = cplx::normalize(target);
    let psi = cplx::normalize(&model.psi_space(space));
    match bases {
        Some(bases) if !bases.is_empty() => {
            let mut total = 0.0;
            for basis in bases {
                let rotated_target = rotate_psi(model.unitaries(), basis, &target)?;
                let rotated_model = rotate_psi(model.unitaries(), basis, &psi)?;
                total += kl_from_probabilities(
                    &cplx::probabilities(&rotated_target),
                    &cplx::probabilities(&rotated_model),
                );
            }
            Ok(total / bases.len() as f64)
        }
        _ => Ok(kl_from_probabilities(
            &cplx::probabilities(&target),
            &cplx::probabilities(&psi),
        )),
    }
}

/// Average negative log-likelihood of `samples` under the model.
pub fn negative_log_likelihood(
    model: &dyn WaveFunction,
    samples: &DMatrix<f64>,
    bases: Option<&[Basis]>,
    space: &DMatrix<f64>,
) -> Result<f64, QstError> {
    if samples.nrows() == 0 {
        return Err(QstError::Training(ErrorInfo::new(
            "empty-data",
            "negative log-likelihood needs at least one sample",
        )));
    }
    if let Some(bases) = bases {
        if bases.len() != samples.nrows() {
            return Err(QstError::Data(
                ErrorInfo::new("row-mismatch", "samples and bases have different row counts")
                    .with_context("samples", samples.nrows().to_string())
                    .with_context("bases", bases.len().to_string()),
            ));
        }
    }
    let log_z = model.log_normalization(space)?;
    let mut sample = vec![0.0; samples.ncols()];
    let mut total = 0.0;
    for row in 0..samples.nrows() {
        for (col, slot) in sample.iter_mut().enumerate() {
            *slot = samples[(row, col)];
        }
        let log_weight = match bases.map(|bases| &bases[row]) {
            Some(basis) if !basis.is_reference() => {
                let projected =
                    rotate_psi_inner_prod(model.unitaries(), basis, &sample, |v| model.psi(v))?;
                safe_ln(projected.total.norm_sqr())
            }
            _ => 2.0 * model.log_amplitude(&sample),
        };
        total += log_weight - log_z;
    }
    Ok(-total / samples.nrows() as f64)
}

/// Named training metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Overlap with the target state.
    Fidelity,
    /// Divergence from the target measurement statistics.
    Kl,
    /// Negative log-likelihood of the training data.
    Nll,
}

/// Inputs available to metric evaluation.
#[derive(Clone, Copy)]
pub struct MetricContext<'a> {
    /// Model under evaluation.
    pub model: &'a dyn WaveFunction,
    /// Enumerated Hilbert space.
    pub space: &'a DMatrix<f64>,
    /// Target amplitudes, if known.
    pub target: Option<&'a [Complex64]>,
    /// Bases over which KL is averaged.
    pub bases: Option<&'a [Basis]>,
    /// Training samples with their per-row bases.
    pub samples: Option<(&'a DMatrix<f64>, Option<&'a [Basis]>)>,
}

impl MetricKind {
    /// Column name used in histories and CSV files.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Fidelity => "fidelity",
            MetricKind::Kl => "kl",
            MetricKind::Nll => "nll",
        }
    }

    /// True when the metric compares against a target state.
    pub fn requires_target(&self) -> bool {
        matches!(self, MetricKind::Fidelity | MetricKind::Kl)
    }

    /// Computes the metric.
    pub fn evaluate(&self, ctx: &MetricContext<'_>) -> Result<f64, QstError> {
        let missing = |what: &str| {
            QstError::Training(
                ErrorInfo::new("missing-metric-input", "metric input not provided")
                    .with_context("metric", self.as_str())
                    .with_context("input", what),
            )
        };
        match self {
            MetricKind::Fidelity => {
                let target = ctx.target.ok_or_else(|| missing("target"))?;
                fidelity(ctx.model, target, ctx.space)
            }
            MetricKind::Kl => {
                let target = ctx.target.ok_or_else(|| missing("target"))?;
                kl_divergence(ctx.model, target, ctx.space, ctx.bases)
            }
            MetricKind::Nll => {
                let (samples, bases) = ctx.samples.ok_or_else(|| missing("samples"))?;
                negative_log_likelihood(ctx.model, samples, bases, ctx.space)
            }
        }
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
