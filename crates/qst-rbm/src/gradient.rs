use nalgebra::{DMatrix, DVector};

/// Gradient (or update step) with the same layout as a [`crate::BinaryRbm`].
#[derive(Debug, Clone, PartialEq)]
pub struct RbmGradient {
    /// Weight component, `num_hidden x num_visible`.
    pub weights: DMatrix<f64>,
    /// Visible bias component.
    pub visible_bias: DVector<f64>,
    /// Hidden bias component.
    pub hidden_bias: DVector<f64>,
}

impl RbmGradient {
    /// Zero gradient for a machine of the given size.
    pub fn zeros(num_hidden: usize, num_visible: usize) -> Self {
        Self {
            weights: DMatrix::zeros(num_hidden, num_visible),
            visible_bias: DVector::zeros(num_visible),
            hidden_bias: DVector::zeros(num_hidden),
        }
    }

    /// `self += alpha * other`.
    pub fn add_scaled(&mut self, other: &RbmGradient, alpha: f64) {
        self.weights += &other.weights * alpha;
        self.visible_bias.axpy(alpha, &other.visible_bias, 1.0);
        self.hidden_bias.axpy(alpha, &other.hidden_bias, 1.0);
    }

    /// Multiplies every component by `alpha`.
    pub fn scale(&mut self, alpha: f64) {
        self.weights *= alpha;
        self.visible_bias *= alpha;
        self.hidden_bias *= alpha;
    }

    /// Euclidean norm over all components.
    pub fn norm(&self) -> f64 {
        (self.weights.norm_squared()
            + self.visible_bias.norm_squared()
            + self.hidden_bias.norm_squared())
        .sqrt()
    }

    /// Returns true when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.weights
            .iter()
            .chain(self.visible_bias.iter())
            .chain(self.hidden_bias.iter())
            .all(|value| value.is_finite())
    }

    /// Returns true when `other` has the same shape.
    pub fn same_shape(&self, other: &RbmGradient) -> bool {
        self.weights.shape() == other.weights.shape()
            && self.visible_bias.len() == other.visible_bias.len()
            && self.hidden_bias.len() == other.hidden_bias.len()
    }
}
