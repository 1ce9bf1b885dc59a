use nalgebra::{DMatrix, DVector};
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::Complex64;
use qst_rbm::WaveFunction;

/// A quantity whose expectation is the mean of a per-sample local value.
///
/// For an operator `O` the local value of a configuration `s` is
/// `Σ_s' O[s, s'] psi(s') / psi(s)`; averaging it over samples drawn from
/// `|psi|^2` estimates `<psi|O|psi> / <psi|psi>`.
pub trait Observable {
    /// Descriptive name.
    fn name(&self) -> String;

    /// Short symbol used in tables.
    fn symbol(&self) -> String;

    /// One local value per row of `samples`.
    fn apply(
        &self,
        model: &dyn WaveFunction,
        samples: &DMatrix<f64>,
    ) -> Result<DVector<f64>, QstError>;

    /// Sample mean of the local values.
    fn estimate(&self, model: &dyn WaveFunction, samples: &DMatrix<f64>) -> Result<f64, QstError> {
        if samples.nrows() == 0 {
            return Err(QstError::Data(
                ErrorInfo::new("empty-data", "cannot estimate from zero samples")
                    .with_context("observable", self.name()),
            ));
        }
        Ok(self.apply(model, samples)?.mean())
    }

    /// Expectation weighted by exact Born probabilities over `space`.
    fn exact_expectation(
        &self,
        model: &dyn WaveFunction,
        space: &DMatrix<f64>,
    ) -> Result<f64, QstError> {
        let z = model.normalization(space)?;
        let values = self.apply(model, space)?;
        let mut row = vec![0.0; space.ncols()];
        let mut total = 0.0;
        for (idx, value) in values.iter().enumerate() {
            copy_row(space, idx, &mut row);
            total += model.probability(&row, z) * value;
        }
        Ok(total)
    }
}

pub(crate) fn check_width(model: &dyn WaveFunction, samples: &DMatrix<f64>) -> Result<(), QstError> {
    if samples.ncols() != model.num_visible() {
        return Err(QstError::Data(
            ErrorInfo::new("site-mismatch", "sample width differs from visible units")
                .with_context("expected", model.num_visible().to_string())
                .with_context("found", samples.ncols().to_string()),
        ));
    }
    Ok(())
}

pub(crate) fn copy_row(samples: &DMatrix<f64>, row: usize, out: &mut [f64]) {
    for (col, slot) in out.iter_mut().enumerate() {
        *slot = samples[(row, col)];
    }
}

/// `psi(flip_i(s)) / psi(s)` for every site `i`.
pub(crate) fn flip_ratios(model: &dyn WaveFunction, sample: &[f64]) -> Vec<Complex64> {
    let mut flipped = sample.to_vec();
    (0..sample.len())
        .map(|site| {
            flipped[site] = 1.0 - sample[site];
            let ratio = model.psi_ratio(&flipped, sample);
            flipped[site] = sample[site];
            ratio
        })
        .collect()
}

/// Applies `local` to every row after checking the sample width.
pub(crate) fn map_rows<F>(
    model: &dyn WaveFunction,
    samples: &DMatrix<f64>,
    mut local: F,
) -> Result<DVector<f64>, QstError>
where
    F: FnMut(&[f64]) -> f64,
{
    check_width(model, samples)?;
    let mut row = vec![0.0; samples.ncols()];
    Ok(DVector::from_iterator(
        samples.nrows(),
        (0..samples.nrows()).map(|idx| {
            copy_row(samples, idx, &mut row);
            local(&row)
        }),
    ))
}
