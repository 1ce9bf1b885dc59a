use nalgebra::{DMatrix, DVector};
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::RngHandle;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::gradient::RbmGradient;

/// Initialisation options for a fresh machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbmInit {
    /// Number of hidden units; defaults to the number of visible units.
    pub num_hidden: Option<usize>,
    /// Start from all-zero weights instead of scaled Gaussian noise.
    pub zero_weights: bool,
    /// Seed for the weight initialisation.
    pub seed: u64,
}

impl Default for RbmInit {
    fn default() -> Self {
        Self {
            num_hidden: None,
            zero_weights: false,
            seed: 0,
        }
    }
}

/// Restricted Boltzmann machine over binary visible and hidden units.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRbm {
    weights: DMatrix<f64>,
    visible_bias: DVector<f64>,
    hidden_bias: DVector<f64>,
}

fn sigmoid(x: f64) -> f64 {
    (1.0 / (1.0 + (-x).exp())).clamp(0.0, 1.0)
}

fn softplus(x: f64) -> f64 {
    if x > 30.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

fn bernoulli(probabilities: &DVector<f64>, rng: &mut RngHandle) -> DVector<f64> {
    probabilities.map(|p| if rng.gen::<f64>() < p { 1.0 } else { 0.0 })
}

fn row_vector(samples: &DMatrix<f64>, row: usize) -> DVector<f64> {
    DVector::from_iterator(samples.ncols(), samples.row(row).iter().copied())
}

fn stack_rows(rows: &[DVector<f64>], ncols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), ncols, |row, col| rows[row][col])
}

impl BinaryRbm {
    /// Creates a machine with Gaussian weights scaled by `1/sqrt(num_visible)`
    /// (or zeros) and zero biases.
    pub fn new(num_visible: usize, init: &RbmInit) -> Result<Self, QstError> {
        let num_hidden = init.num_hidden.unwrap_or(num_visible);
        if num_visible == 0 || num_hidden == 0 {
            return Err(QstError::Model(
                ErrorInfo::new("empty-layer", "RBM layers must contain at least one unit")
                    .with_context("num_visible", num_visible.to_string())
                    .with_context("num_hidden", num_hidden.to_string()),
            ));
        }
        let weights = if init.zero_weights {
            DMatrix::zeros(num_hidden, num_visible)
        } else {
            let mut rng = RngHandle::from_seed(init.seed);
            let scale = 1.0 / (num_visible as f64).sqrt();
            DMatrix::from_fn(num_hidden, num_visible, |_, _| {
                rng.sample::<f64, _>(StandardNormal) * scale
            })
        };
        Ok(Self {
            weights,
            visible_bias: DVector::zeros(num_visible),
            hidden_bias: DVector::zeros(num_hidden),
        })
    }

    /// Assembles a machine from explicit tensors.
    pub fn from_parts(
        weights: DMatrix<f64>,
        visible_bias: DVector<f64>,
        hidden_bias: DVector<f64>,
    ) -> Result<Self, QstError> {
        if weights.ncols() != visible_bias.len() || weights.nrows() != hidden_bias.len() {
            return Err(QstError::Model(
                ErrorInfo::new("shape-mismatch", "RBM tensors have inconsistent shapes")
                    .with_context("weights", format!("{}x{}", weights.nrows(), weights.ncols()))
                    .with_context("visible_bias", visible_bias.len().to_string())
                    .with_context("hidden_bias", hidden_bias.len().to_string()),
            ));
        }
        if weights.is_empty() {
            return Err(QstError::Model(ErrorInfo::new(
                "empty-layer",
                "RBM layers must contain at least one unit",
            )));
        }
        Ok(Self {
            weights,
            visible_bias,
            hidden_bias,
        })
    }

    /// Number of visible units.
    pub fn num_visible(&self) -> usize {
        self.weights.ncols()
    }

    /// Number of hidden units.
    pub fn num_hidden(&self) -> usize {
        self.weights.nrows()
    }

    /// Total number of trainable parameters.
    pub fn num_params(&self) -> usize {
        self.weights.len() + self.visible_bias.len() + self.hidden_bias.len()
    }

    /// Weight matrix, `num_hidden x num_visible`.
    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Visible bias vector.
    pub fn visible_bias(&self) -> &DVector<f64> {
        &self.visible_bias
    }

    /// Hidden bias vector.
    pub fn hidden_bias(&self) -> &DVector<f64> {
        &self.hidden_bias
    }

    fn check_visible(&self, len: usize) -> Result<(), QstError> {
        if len != self.num_visible() {
            return Err(QstError::Model(
                ErrorInfo::new("visible-size-mismatch", "configuration size does not match RBM")
                    .with_context("expected", self.num_visible().to_string())
                    .with_context("found", len.to_string()),
            ));
        }
        Ok(())
    }

    fn hidden_probabilities(&self, v: &DVector<f64>) -> DVector<f64> {
        (&self.weights * v + &self.hidden_bias).map(sigmoid)
    }

    fn visible_probabilities(&self, h: &DVector<f64>) -> DVector<f64> {
        (self.weights.tr_mul(h) + &self.visible_bias).map(sigmoid)
    }

    /// Effective energy `-(v·b + Σ_j softplus((Wv + c)_j))`.
    ///
    /// `exp(-E(v))` is the unnormalised marginal probability of `v`.
    ///
    /// # Panics
    ///
    /// `v` must hold exactly `num_visible` values. Use
    /// [`BinaryRbm::effective_energy_batch`] for a checked variant.
    pub fn effective_energy(&self, v: &[f64]) -> f64 {
        debug_assert_eq!(
            v.len(),
            self.num_visible(),
            "configuration width must match the visible units"
        );
        let v = DVector::from_column_slice(v);
        let visible_term = v.dot(&self.visible_bias);
        let hidden_term: f64 = (&self.weights * &v + &self.hidden_bias)
            .iter()
            .map(|&x| softplus(x))
            .sum();
        -(visible_term + hidden_term)
    }

    /// Effective energy of every row of `samples`.
    pub fn effective_energy_batch(&self, samples: &DMatrix<f64>) -> Result<DVector<f64>, QstError> {
        self.check_visible(samples.ncols())?;
        let mut buffer = vec![0.0; samples.ncols()];
        Ok(DVector::from_iterator(
            samples.nrows(),
            (0..samples.nrows()).map(|row| {
                for (col, slot) in buffer.iter_mut().enumerate() {
                    *slot = samples[(row, col)];
                }
                self.effective_energy(&buffer)
            }),
        ))
    }

    /// Gradient of the effective energy at `v`.
    pub fn effective_energy_gradient(&self, v: &[f64]) -> RbmGradient {
        let mut grad = RbmGradient::zeros(self.num_hidden(), self.num_visible());
        self.accumulate_gradient(&mut grad, v, 1.0);
        grad
    }

    /// Adds `weight * ∂E(v)` to `grad`.
    ///
    /// `v` must hold `num_visible` values and `grad` must match the RBM shape.
    pub fn accumulate_gradient(&self, grad: &mut RbmGradient, v: &[f64], weight: f64) {
        debug_assert_eq!(
            v.len(),
            self.num_visible(),
            "configuration width must match the visible units"
        );
        let v = DVector::from_column_slice(v);
        let prob = self.hidden_probabilities(&v);
        grad.weights.ger(-weight, &prob, &v, 1.0);
        grad.visible_bias.axpy(-weight, &v, 1.0);
        grad.hidden_bias.axpy(-weight, &prob, 1.0);
    }

    /// Sum of effective-energy gradients over the rows of `samples`.
    pub fn effective_energy_gradient_batch(
        &self,
        samples: &DMatrix<f64>,
    ) -> Result<RbmGradient, QstError> {
        self.check_visible(samples.ncols())?;
        let mut grad = RbmGradient::zeros(self.num_hidden(), self.num_visible());
        for row in 0..samples.nrows() {
            let v = row_vector(samples, row);
            self.accumulate_gradient(&mut grad, v.as_slice(), 1.0);
        }
        Ok(grad)
    }

    /// `p(h_j = 1 | v)` for every row of `v`.
    pub fn prob_h_given_v(&self, v: &DMatrix<f64>) -> Result<DMatrix<f64>, QstError> {
        self.check_visible(v.ncols())?;
        let rows: Vec<DVector<f64>> = (0..v.nrows())
            .map(|row| self.hidden_probabilities(&row_vector(v, row)))
            .collect();
        Ok(stack_rows(&rows, self.num_hidden()))
    }

    /// `p(v_i = 1 | h)` for every row of `h`.
    pub fn prob_v_given_h(&self, h: &DMatrix<f64>) -> Result<DMatrix<f64>, QstError> {
        if h.ncols() != self.num_hidden() {
            return Err(QstError::Model(
                ErrorInfo::new("hidden-size-mismatch", "hidden configuration size does not match RBM")
                    .with_context("expected", self.num_hidden().to_string())
                    .with_context("found", h.ncols().to_string()),
            ));
        }
        let rows: Vec<DVector<f64>> = (0..h.nrows())
            .map(|row| self.visible_probabilities(&row_vector(h, row)))
            .collect();
        Ok(stack_rows(&rows, self.num_visible()))
    }

    /// Draws hidden units for every row of `v`.
    pub fn sample_h_given_v(
        &self,
        v: &DMatrix<f64>,
        rng: &mut RngHandle,
    ) -> Result<DMatrix<f64>, QstError> {
        Ok(self.prob_h_given_v(v)?.map(|p| if rng.gen::<f64>() < p { 1.0 } else { 0.0 }))
    }

    /// Draws visible units for every row of `h`.
    pub fn sample_v_given_h(
        &self,
        h: &DMatrix<f64>,
        rng: &mut RngHandle,
    ) -> Result<DMatrix<f64>, QstError> {
        Ok(self.prob_v_given_h(h)?.map(|p| if rng.gen::<f64>() < p { 1.0 } else { 0.0 }))
    }

    /// Runs `k` block Gibbs sweeps on every row of `initial`.
    ///
    /// Rows are independent Markov chains executed in parallel. Chain `i`
    /// draws from the substream `i` of a base seed taken from `rng`, so the
    /// output only depends on `rng` and not on thread scheduling.
    pub fn gibbs_steps(
        &self,
        k: usize,
        initial: &DMatrix<f64>,
        rng: &mut RngHandle,
    ) -> Result<DMatrix<f64>, QstError> {
        self.check_visible(initial.ncols())?;
        let base_seed = rng.next_u64();
        let chains: Vec<DVector<f64>> = (0..initial.nrows())
            .into_par_iter()
            .map(|chain| {
                let mut chain_rng = RngHandle::substream(base_seed, chain as u64);
                let mut v = row_vector(initial, chain);
                for _ in 0..k {
                    let h = bernoulli(&self.hidden_probabilities(&v), &mut chain_rng);
                    v = bernoulli(&self.visible_probabilities(&h), &mut chain_rng);
                }
                v
            })
            .collect();
        Ok(stack_rows(&chains, self.num_visible()))
    }

    /// `ln Σ_v exp(-E(v))` over the rows of `space`.
    pub fn log_partition(&self, space: &DMatrix<f64>) -> Result<f64, QstError> {
        let energies = self.effective_energy_batch(space)?;
        let max = energies
            .iter()
            .map(|e| -e)
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Ok(max);
        }
        let sum: f64 = energies.iter().map(|e| (-e - max).exp()).sum();
        Ok(max + sum.ln())
    }

    /// `Σ_v exp(-E(v))` over the rows of `space`.
    pub fn partition(&self, space: &DMatrix<f64>) -> Result<f64, QstError> {
        Ok(self.log_partition(space)?.exp())
    }

    /// Subtracts `step` from the parameters.
    pub fn apply_step(&mut self, step: &RbmGradient) -> Result<(), QstError> {
        if step.weights.shape() != self.weights.shape()
            || step.visible_bias.len() != self.visible_bias.len()
            || step.hidden_bias.len() != self.hidden_bias.len()
        {
            return Err(QstError::Model(
                ErrorInfo::new("step-shape-mismatch", "update step does not match RBM shape")
                    .with_context("num_visible", self.num_visible().to_string())
                    .with_context("num_hidden", self.num_hidden().to_string()),
            ));
        }
        self.weights -= &step.weights;
        self.visible_bias -= &step.visible_bias;
        self.hidden_bias -= &step.hidden_bias;
        Ok(())
    }

    /// Replaces all parameters with those of `other`, which must have the same shape.
    pub fn assign(&mut self, other: &BinaryRbm) -> Result<(), QstError> {
        if other.weights.shape() != self.weights.shape() {
            return Err(QstError::Model(
                ErrorInfo::new("shape-mismatch", "cannot assign parameters of a different shape")
                    .with_context("expected", format!("{:?}", self.weights.shape()))
                    .with_context("found", format!("{:?}", other.weights.shape())),
            ));
        }
        self.weights.copy_from(&other.weights);
        self.visible_bias.copy_from(&other.visible_bias);
        self.hidden_bias.copy_from(&other.hidden_bias);
        Ok(())
    }
}
