use nalgebra::DMatrix;
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{Basis, UnitaryDict};

use crate::gradient::RbmGradient;
use crate::rbm::{BinaryRbm, RbmInit};
use crate::wavefunction::{check_bases_alignment, ModelKind, WaveFunction};

/// Wavefunction with real, non-negative amplitudes `sqrt(p(v))`.
#[derive(Debug, Clone, PartialEq)]
pub struct PositiveWaveFunction {
    rbm_am: BinaryRbm,
    unitaries: UnitaryDict,
}

impl PositiveWaveFunction {
    /// Creates a freshly initialised model over `num_visible` sites.
    pub fn new(num_visible: usize, init: &RbmInit) -> Result<Self, QstError> {
        Ok(Self {
            rbm_am: BinaryRbm::new(num_visible, init)?,
            unitaries: UnitaryDict::standard(),
        })
    }

    /// Wraps an existing amplitude network.
    pub fn from_rbm(rbm_am: BinaryRbm) -> Self {
        Self {
            rbm_am,
            unitaries: UnitaryDict::standard(),
        }
    }

    /// Replaces the unitary dictionary used when evaluating rotated metrics.
    pub fn with_unitaries(mut self, unitaries: UnitaryDict) -> Self {
        self.unitaries = unitaries;
        self
    }
}

impl WaveFunction for PositiveWaveFunction {
    fn kind(&self) -> ModelKind {
        ModelKind::Positive
    }

    fn amplitude_rbm(&self) -> &BinaryRbm {
        &self.rbm_am
    }

    fn phase_rbm(&self) -> Option<&BinaryRbm> {
        None
    }

    fn networks_mut(&mut self) -> Vec<&mut BinaryRbm> {
        vec![&mut self.rbm_am]
    }

    fn unitaries(&self) -> &UnitaryDict {
        &self.unitaries
    }

    fn positive_phase_gradients(
        &self,
        samples: &DMatrix<f64>,
        bases: Option<&[Basis]>,
    ) -> Result<Vec<RbmGradient>, QstError> {
        if let Some(bases) = bases {
            check_bases_alignment(samples, bases)?;
            if let Some(rotated) = bases.iter().find(|basis| !basis.is_reference()) {
                return Err(QstError::Model(
                    ErrorInfo::new(
                        "rotated-basis-unsupported",
                        "positive wavefunctions only learn from computational-basis data",
                    )
                    .with_context("basis", rotated.to_string())
                    .with_hint("train a complex wavefunction on rotated measurements"),
                ));
            }
        }
        Ok(vec![self.rbm_am.effective_energy_gradient_batch(samples)?])
    }
}
