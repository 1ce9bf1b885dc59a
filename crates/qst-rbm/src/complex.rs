use nalgebra::DMatrix;
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{derive_substream_seed, rotate_psi_inner_prod, Basis, UnitaryDict};
use tracing::warn;

use crate::gradient::RbmGradient;
use crate::rbm::{BinaryRbm, RbmInit};
use crate::wavefunction::{check_bases_alignment, ModelKind, WaveFunction};

const VANISHING_AMPLITUDE: f64 = 1e-300;

/// Wavefunction with an amplitude RBM and a phase RBM.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexWaveFunction {
    rbm_am: BinaryRbm,
    rbm_ph: BinaryRbm,
    unitaries: UnitaryDict,
}

impl ComplexWaveFunction {
    /// Creates a freshly initialised model; the two networks draw their
    /// weights from independent substreams of `init.seed`.
    pub fn new(num_visible: usize, init: &RbmInit, unitaries: UnitaryDict) -> Result<Self, QstError> {
        let am_init = RbmInit {
            seed: derive_substream_seed(init.seed, 0),
            ..init.clone()
        };
        let ph_init = RbmInit {
            seed: derive_substream_seed(init.seed, 1),
            ..init.clone()
        };
        Ok(Self {
            rbm_am: BinaryRbm::new(num_visible, &am_init)?,
            rbm_ph: BinaryRbm::new(num_visible, &ph_init)?,
            unitaries,
        })
    }

    /// Wraps existing amplitude and phase networks.
    pub fn from_rbms(
        rbm_am: BinaryRbm,
        rbm_ph: BinaryRbm,
        unitaries: UnitaryDict,
    ) -> Result<Self, QstError> {
        if rbm_am.num_visible() != rbm_ph.num_visible() {
            return Err(QstError::Model(
                ErrorInfo::new(
                    "visible-size-mismatch",
                    "amplitude and phase networks disagree on the number of sites",
                )
                .with_context("amplitude", rbm_am.num_visible().to_string())
                .with_context("phase", rbm_ph.num_visible().to_string()),
            ));
        }
        Ok(Self {
            rbm_am,
            rbm_ph,
            unitaries,
        })
    }

    /// Accumulates the gradient of `-ln |<σ|U psi>|^2` for one rotated sample.
    ///
    /// With `w_v = Ut(v) psi(v) / Σ_v Ut(v) psi(v)` the amplitude gradient is
    /// `Σ Re(w_v) ∂E_am(v)` and the phase gradient `Σ -Im(w_v) ∂E_ph(v)`.
    fn accumulate_rotated(
        &self,
        basis: &Basis,
        sample: &[f64],
        am: &mut RbmGradient,
        ph: &mut RbmGradient,
    ) -> Result<(), QstError> {
        let projected = rotate_psi_inner_prod(&self.unitaries, basis, sample, |v| self.psi(v))?;
        if projected.total.norm_sqr() < VANISHING_AMPLITUDE {
            warn!(basis = %basis, "skipping sample with vanishing rotated amplitude");
            return Ok(());
        }
        let mut buffer = vec![0.0; sample.len()];
        for (row, term) in projected.terms.iter().enumerate() {
            for (col, slot) in buffer.iter_mut().enumerate() {
                *slot = projected.configs[(row, col)];
            }
            let weight = term / projected.total;
            self.rbm_am.accumulate_gradient(am, &buffer, weight.re);
            self.rbm_ph.accumulate_gradient(ph, &buffer, -weight.im);
        }
        Ok(())
    }
}

impl WaveFunction for ComplexWaveFunction {
    fn kind(&self) -> ModelKind {
        ModelKind::Complex
    }

    fn amplitude_rbm(&self) -> &BinaryRbm {
        &self.rbm_am
    }

    fn phase_rbm(&self) -> Option<&BinaryRbm> {
        Some(&self.rbm_ph)
    }

    fn networks_mut(&mut self) -> Vec<&mut BinaryRbm> {
        vec![&mut self.rbm_am, &mut self.rbm_ph]
    }

    fn unitaries(&self) -> &UnitaryDict {
        &self.unitaries
    }

    fn positive_phase_gradients(
        &self,
        samples: &DMatrix<f64>,
        bases: Option<&[Basis]>,
    ) -> Result<Vec<RbmGradient>, QstError> {
        let mut am = RbmGradient::zeros(self.rbm_am.num_hidden(), self.rbm_am.num_visible());
        let mut ph = RbmGradient::zeros(self.rbm_ph.num_hidden(), self.rbm_ph.num_visible());
        if samples.ncols() != self.num_visible() {
            return Err(QstError::Model(
                ErrorInfo::new("visible-size-mismatch", "configuration size does not match RBM")
                    .with_context("expected", self.num_visible().to_string())
                    .with_context("found", samples.ncols().to_string()),
            ));
        }
        if let Some(bases) = bases {
            check_bases_alignment(samples, bases)?;
        }
        let mut sample = vec![0.0; samples.ncols()];
        for row in 0..samples.nrows() {
            for (col, slot) in sample.iter_mut().enumerate() {
                *slot = samples[(row, col)];
            }
            match bases.map(|bases| &bases[row]) {
                Some(basis) if !basis.is_reference() => {
                    self.accumulate_rotated(basis, &sample, &mut am, &mut ph)?;
                }
                _ => self.rbm_am.accumulate_gradient(&mut am, &sample, 1.0),
            }
        }
        Ok(vec![am, ph])
    }
}
