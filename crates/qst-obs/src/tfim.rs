use nalgebra::{DMatrix, DVector};
use qst_core::errors::QstError;
use qst_core::to_pm1;
use qst_rbm::WaveFunction;

use crate::observable::{flip_ratios, map_rows, Observable};

/// Local energy of the open transverse-field Ising chain
/// `H = -Σ_i Z_i Z_{i+1} - h Σ_i X_i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TfimChainEnergy {
    /// Transverse field `h`.
    pub field: f64,
    /// Divide by the number of sites.
    pub density: bool,
}

impl TfimChainEnergy {
    /// Energy per site at field `field`.
    pub fn per_site(field: f64) -> Self {
        Self {
            field,
            density: true,
        }
    }
}

impl Observable for TfimChainEnergy {
    fn name(&self) -> String {
        format!("TfimChainEnergy(h={})", self.field)
    }

    fn symbol(&self) -> String {
        "E".to_string()
    }

    fn apply(
        &self,
        model: &dyn WaveFunction,
        samples: &DMatrix<f64>,
    ) -> Result<DVector<f64>, QstError> {
        map_rows(model, samples, |row| {
            let interaction: f64 = row
                .windows(2)
                .map(|pair| to_pm1(pair[0]) * to_pm1(pair[1]))
                .sum();
            let transverse: f64 = flip_ratios(model, row).iter().map(|ratio| ratio.re).sum();
            let energy = -interaction - self.field * transverse;
            if self.density {
                energy / row.len() as f64
            } else {
                energy
            }
        })
    }
}
