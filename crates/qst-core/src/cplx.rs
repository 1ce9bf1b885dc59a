//! Complex helpers used by wavefunctions, metrics and observables.
//!
//! On disk a wavefunction is a pair of real/imaginary columns; in memory it
//! is a dense `Vec<Complex64>` indexed by computational basis state.

pub use num_complex::Complex64;

use crate::errors::{ErrorInfo, QstError};

/// Imaginary unit.
pub const I: Complex64 = Complex64::new(0.0, 1.0);

/// Builds complex amplitudes from separate real and imaginary parts.
pub fn from_parts(re: &[f64], im: &[f64]) -> Result<Vec<Complex64>, QstError> {
    if re.len() != im.len() {
        return Err(QstError::Data(
            ErrorInfo::new("complex-parts-mismatch", "real and imaginary parts differ in length")
                .with_context("real", re.len().to_string())
                .with_context("imag", im.len().to_string()),
        ));
    }
    Ok(re
        .iter()
        .zip(im)
        .map(|(&re, &im)| Complex64::new(re, im))
        .collect())
}

/// Splits complex amplitudes into real and imaginary parts.
pub fn into_parts(values: &[Complex64]) -> (Vec<f64>, Vec<f64>) {
    values.iter().map(|z| (z.re, z.im)).unzip()
}

/// Hermitian inner product `Σ conj(a_i) b_i`.
pub fn inner_prod(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

/// Squared Euclidean norm of a complex vector.
pub fn norm_sqr(values: &[Complex64]) -> f64 {
    values.iter().map(|z| z.norm_sqr()).sum()
}

/// Born-rule weights `|z_i|^2`.
pub fn probabilities(values: &[Complex64]) -> Vec<f64> {
    values.iter().map(|z| z.norm_sqr()).collect()
}

/// Element-wise quotient `a_i / b_i`.
pub fn elementwise_division(a: &[Complex64], b: &[Complex64]) -> Vec<Complex64> {
    a.iter().zip(b).map(|(x, y)| x / y).collect()
}

/// Returns a unit-norm copy of `values`; the zero vector is returned unchanged.
pub fn normalize(values: &[Complex64]) -> Vec<Complex64> {
    let norm = norm_sqr(values).sqrt();
    if norm == 0.0 {
        return values.to_vec();
    }
    values.iter().map(|z| z / norm).collect()
}

/// Natural logarithm with the argument clamped to machine epsilon.
pub fn safe_ln(p: f64) -> f64 {
    p.max(f64::EPSILON).ln()
}
