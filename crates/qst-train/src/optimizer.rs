use qst_core::errors::{ErrorInfo, QstError};
use qst_rbm::{RbmGradient, WaveFunction};

/// Turns gradients into parameter updates.
pub trait Optimizer {
    /// Applies one update; `grads` follows the order of [`WaveFunction::networks`].
    fn step(&mut self, model: &mut dyn WaveFunction, grads: &[RbmGradient]) -> Result<(), QstError>;

    /// Current step size.
    fn learning_rate(&self) -> f64;

    /// Changes the step size for subsequent updates.
    fn set_learning_rate(&mut self, learning_rate: f64);
}

/// Stochastic gradient descent with optional momentum.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f64,
    momentum: f64,
    velocity: Vec<RbmGradient>,
}

impl Sgd {
    /// Creates an optimizer; `momentum = 0` gives plain SGD.
    pub fn new(learning_rate: f64, momentum: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: Vec::new(),
        }
    }

    /// Momentum coefficient.
    pub fn momentum(&self) -> f64 {
        self.momentum
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, model: &mut dyn WaveFunction, grads: &[RbmGradient]) -> Result<(), QstError> {
        let networks = model.networks_mut();
        if networks.len() != grads.len() {
            return Err(QstError::Training(
                ErrorInfo::new("gradient-count-mismatch", "one gradient per network is required")
                    .with_context("networks", networks.len().to_string())
                    .with_context("gradients", grads.len().to_string()),
            ));
        }
        if let Some(index) = grads.iter().position(|grad| !grad.is_finite()) {
            return Err(QstError::Training(
                ErrorInfo::new("non-finite-gradient", "gradient contains NaN or infinity")
                    .with_context("network", index.to_string())
                    .with_hint("lower the learning rate or increase k"),
            ));
        }
        if self.momentum > 0.0 {
            if self.velocity.len() != grads.len()
                || !self.velocity.iter().zip(grads).all(|(v, g)| v.same_shape(g))
            {
                self.velocity = grads
                    .iter()
                    .map(|g| RbmGradient::zeros(g.weights.nrows(), g.weights.ncols()))
                    .collect();
            }
            for ((network, grad), velocity) in networks.into_iter().zip(grads).zip(&mut self.velocity) {
                velocity.scale(self.momentum);
                velocity.add_scaled(grad, 1.0);
                let mut update = velocity.clone();
                update.scale(self.learning_rate);
                network.apply_step(&update)?;
            }
        } else {
            for (network, grad) in networks.into_iter().zip(grads) {
                let mut update = grad.clone();
                update.scale(self.learning_rate);
                network.apply_step(&update)?;
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }
}
