use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::DMatrix;
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{Basis, Complex64, RngHandle, UnitaryDict};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::artifact::ModelArtifact;
use crate::gradient::RbmGradient;
use crate::hash::params_hash;
use crate::rbm::BinaryRbm;

/// Family of an RBM wavefunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Real, non-negative amplitudes from a single RBM.
    Positive,
    /// Amplitude and phase RBMs.
    Complex,
}

impl ModelKind {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Positive => "positive",
            ModelKind::Complex => "complex",
        }
    }

    /// Number of RBMs the family carries.
    pub fn num_networks(&self) -> usize {
        match self {
            ModelKind::Positive => 1,
            ModelKind::Complex => 2,
        }
    }
}

/// Wavefunction `psi(v) = exp(-E_am(v)/2) * exp(i * phase(v))` parameterised by RBMs.
///
/// The amplitude network always comes first in [`WaveFunction::networks`] and
/// in every gradient list; the phase network (if any) follows.
pub trait WaveFunction: Send + Sync {
    /// Model family.
    fn kind(&self) -> ModelKind;

    /// RBM parameterising the amplitudes.
    fn amplitude_rbm(&self) -> &BinaryRbm;

    /// RBM parameterising the phases, if the family has one.
    fn phase_rbm(&self) -> Option<&BinaryRbm>;

    /// Mutable access to every network, amplitude first.
    fn networks_mut(&mut self) -> Vec<&mut BinaryRbm>;

    /// Rotations used to relate measurement bases to the computational basis.
    fn unitaries(&self) -> &UnitaryDict;

    /// Positive-phase gradients summed (not averaged) over `samples`.
    fn positive_phase_gradients(
        &self,
        samples: &DMatrix<f64>,
        bases: Option<&[Basis]>,
    ) -> Result<Vec<RbmGradient>, QstError>;

    /// Every network, amplitude first.
    fn networks(&self) -> Vec<&BinaryRbm> {
        let mut networks = vec![self.amplitude_rbm()];
        networks.extend(self.phase_rbm());
        networks
    }

    /// Number of visible units (sites).
    fn num_visible(&self) -> usize {
        self.amplitude_rbm().num_visible()
    }

    /// Number of hidden units of the amplitude network.
    fn num_hidden(&self) -> usize {
        self.amplitude_rbm().num_hidden()
    }

    /// `ln |psi(v)|`.
    ///
    /// This and the other single-configuration evaluators below expect
    /// `v.len() == num_visible()` and panic otherwise; `psi_space` and the
    /// batch methods validate widths and return errors instead.
    fn log_amplitude(&self, v: &[f64]) -> f64 {
        -self.amplitude_rbm().effective_energy(v) / 2.0
    }

    /// Unnormalised amplitude `|psi(v)|`.
    fn amplitude(&self, v: &[f64]) -> f64 {
        self.log_amplitude(v).exp()
    }

    /// Phase of `psi(v)`.
    fn phase(&self, v: &[f64]) -> f64 {
        self.phase_rbm()
            .map(|rbm| -rbm.effective_energy(v) / 2.0)
            .unwrap_or(0.0)
    }

    /// Unnormalised complex amplitude.
    fn psi(&self, v: &[f64]) -> Complex64 {
        Complex64::from_polar(self.amplitude(v), self.phase(v))
    }

    /// `psi(numerator) / psi(denominator)` evaluated in log space.
    fn psi_ratio(&self, numerator: &[f64], denominator: &[f64]) -> Complex64 {
        let modulus = (self.log_amplitude(numerator) - self.log_amplitude(denominator)).exp();
        Complex64::from_polar(modulus, self.phase(numerator) - self.phase(denominator))
    }

    /// Unnormalised amplitudes of every row of `space`.
    fn psi_space(&self, space: &DMatrix<f64>) -> Vec<Complex64> {
        let mut buffer = vec![0.0; space.ncols()];
        (0..space.nrows())
            .map(|row| {
                for (col, slot) in buffer.iter_mut().enumerate() {
                    *slot = space[(row, col)];
                }
                self.psi(&buffer)
            })
            .collect()
    }

    /// `ln Z` over the enumerated `space`.
    fn log_normalization(&self, space: &DMatrix<f64>) -> Result<f64, QstError> {
        self.amplitude_rbm().log_partition(space)
    }

    /// Normalisation constant `Z = Σ_v |psi(v)|^2`.
    fn normalization(&self, space: &DMatrix<f64>) -> Result<f64, QstError> {
        self.amplitude_rbm().partition(space)
    }

    /// Born probability `|psi(v)|^2 / Z`.
    fn probability(&self, v: &[f64], normalization: f64) -> f64 {
        (-self.amplitude_rbm().effective_energy(v)).exp() / normalization
    }

    /// Draws samples from `|psi|^2` with `k` Gibbs steps per chain.
    ///
    /// Without an initial state every chain starts from uniform random bits;
    /// otherwise `initial` must hold `num_samples` rows.
    fn sample(
        &self,
        k: usize,
        num_samples: usize,
        initial: Option<&DMatrix<f64>>,
        rng: &mut RngHandle,
    ) -> Result<DMatrix<f64>, QstError> {
        let num_visible = self.num_visible();
        match initial {
            Some(state) => {
                if state.nrows() != num_samples || state.ncols() != num_visible {
                    return Err(QstError::Model(
                        ErrorInfo::new("initial-state-shape", "initial chain state has the wrong shape")
                            .with_context("expected", format!("{num_samples}x{num_visible}"))
                            .with_context("found", format!("{}x{}", state.nrows(), state.ncols())),
                    ));
                }
                self.amplitude_rbm().gibbs_steps(k, state, rng)
            }
            None => {
                let start = DMatrix::from_fn(num_samples, num_visible, |_, _| {
                    if rng.gen::<bool>() {
                        1.0
                    } else {
                        0.0
                    }
                });
                self.amplitude_rbm().gibbs_steps(k, &start, rng)
            }
        }
    }

    /// Contrastive-divergence gradients for one batch.
    ///
    /// The positive phase is averaged over `samples`; the negative phase runs
    /// `k` Gibbs steps from `neg_batch` and is subtracted from the amplitude
    /// gradient.
    fn compute_batch_gradients(
        &self,
        k: usize,
        samples: &DMatrix<f64>,
        neg_batch: &DMatrix<f64>,
        bases: Option<&[Basis]>,
        rng: &mut RngHandle,
    ) -> Result<Vec<RbmGradient>, QstError> {
        if samples.nrows() == 0 || neg_batch.nrows() == 0 {
            return Err(QstError::Training(
                ErrorInfo::new("empty-batch", "gradient batches must be non-empty")
                    .with_context("positive", samples.nrows().to_string())
                    .with_context("negative", neg_batch.nrows().to_string()),
            ));
        }
        let mut grads = self.positive_phase_gradients(samples, bases)?;
        let pos_scale = 1.0 / samples.nrows() as f64;
        for grad in grads.iter_mut() {
            grad.scale(pos_scale);
        }

        let chains = self.sample(k, neg_batch.nrows(), Some(neg_batch), rng)?;
        let model_grad = self.amplitude_rbm().effective_energy_gradient_batch(&chains)?;
        grads[0].add_scaled(&model_grad, -1.0 / neg_batch.nrows() as f64);
        Ok(grads)
    }

    /// Canonical SHA-256 hash of the parameters.
    fn params_hash(&self) -> String {
        params_hash(self.kind(), &self.networks())
    }

    /// Snapshot of the model suitable for persistence.
    fn to_artifact(&self, metadata: BTreeMap<String, String>) -> ModelArtifact {
        ModelArtifact::from_model(self, metadata)
    }

    /// Writes the model and `metadata` to `path`.
    fn save(&self, path: &Path, metadata: BTreeMap<String, String>) -> Result<(), QstError> {
        self.to_artifact(metadata).store(path)
    }

    /// Overwrites the parameters with those stored in `artifact`.
    fn load_parameters(&mut self, artifact: &ModelArtifact) -> Result<(), QstError> {
        if artifact.kind != self.kind() {
            return Err(QstError::Model(
                ErrorInfo::new("kind-mismatch", "artifact holds a different model family")
                    .with_context("expected", self.kind().as_str())
                    .with_context("found", artifact.kind.as_str()),
            ));
        }
        let restored = artifact.networks()?;
        for (network, stored) in self.networks_mut().into_iter().zip(restored.iter()) {
            network.assign(stored)?;
        }
        Ok(())
    }

    /// Reads `path` and overwrites the parameters with the stored ones.
    fn load(&mut self, path: &Path) -> Result<ModelArtifact, QstError> {
        let artifact = ModelArtifact::load(path)?;
        self.load_parameters(&artifact)?;
        Ok(artifact)
    }
}

/// Fails when `bases` does not provide one basis per sample row.
pub(crate) fn check_bases_alignment(
    samples: &DMatrix<f64>,
    bases: &[Basis],
) -> Result<(), QstError> {
    if bases.len() != samples.nrows() {
        return Err(QstError::Data(
            ErrorInfo::new("row-mismatch", "samples and bases have different row counts")
                .with_context("samples", samples.nrows().to_string())
                .with_context("bases", bases.len().to_string()),
        ));
    }
    if let Some(bad) = bases.iter().find(|basis| basis.len() != samples.ncols()) {
        return Err(QstError::Data(
            ErrorInfo::new("site-mismatch", "basis site count differs from sample width")
                .with_context("basis", bad.to_string())
                .with_context("sites", samples.ncols().to_string()),
        ));
    }
    Ok(())
}
