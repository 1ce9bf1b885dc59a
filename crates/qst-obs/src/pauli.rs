use nalgebra::{DMatrix, DVector};
use qst_core::cplx::I;
use qst_core::errors::QstError;
use qst_core::{to_pm1, Complex64};
use qst_rbm::WaveFunction;

use crate::observable::{flip_ratios, map_rows, Observable};

/// Average z-magnetisation `Σ_i s_i / N` with `s_i = ±1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigmaZ {
    /// Report `|Σ_i s_i| / N` instead.
    pub absolute: bool,
}

impl Observable for SigmaZ {
    fn name(&self) -> String {
        "SigmaZ".to_string()
    }

    fn symbol(&self) -> String {
        "Z".to_string()
    }

    fn apply(
        &self,
        model: &dyn WaveFunction,
        samples: &DMatrix<f64>,
    ) -> Result<DVector<f64>, QstError> {
        map_rows(model, samples, |row| {
            let total: f64 = row.iter().map(|&bit| to_pm1(bit)).sum();
            let value = total / row.len() as f64;
            if self.absolute {
                value.abs()
            } else {
                value
            }
        })
    }
}

/// Average x-magnetisation, from single-site flip amplitude ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigmaX {
    /// Take the modulus of the summed ratios instead of the real part.
    pub absolute: bool,
}

impl Observable for SigmaX {
    fn name(&self) -> String {
        "SigmaX".to_string()
    }

    fn symbol(&self) -> String {
        "X".to_string()
    }

    fn apply(
        &self,
        model: &dyn WaveFunction,
        samples: &DMatrix<f64>,
    ) -> Result<DVector<f64>, QstError> {
        map_rows(model, samples, |row| {
            let total: Complex64 = flip_ratios(model, row).into_iter().sum();
            let value = total / row.len() as f64;
            if self.absolute {
                value.norm()
            } else {
                value.re
            }
        })
    }
}

/// Average y-magnetisation.
///
/// `Y` flips a site like `X` with coefficient `-i s_i` taken from the row
/// configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigmaY {
    /// Take the modulus of the summed local terms instead of the real part.
    pub absolute: bool,
}

impl Observable for SigmaY {
    fn name(&self) -> String {
        "SigmaY".to_string()
    }

    fn symbol(&self) -> String {
        "Y".to_string()
    }

    fn apply(
        &self,
        model: &dyn WaveFunction,
        samples: &DMatrix<f64>,
    ) -> Result<DVector<f64>, QstError> {
        map_rows(model, samples, |row| {
            let total: Complex64 = flip_ratios(model, row)
                .into_iter()
                .zip(row)
                .map(|(ratio, &bit)| -I * to_pm1(bit) * ratio)
                .sum();
            let value = total / row.len() as f64;
            if self.absolute {
                value.norm()
            } else {
                value.re
            }
        })
    }
}
