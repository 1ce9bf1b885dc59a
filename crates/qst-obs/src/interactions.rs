use nalgebra::{DMatrix, DVector};
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::to_pm1;
use qst_rbm::WaveFunction;

use crate::observable::{map_rows, Observable};

/// Mean of `s_i s_{i+d}` over the bonds of a chain.
///
/// Open chains have `N - d` bonds; periodic chains wrap around and have `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighbourInteraction {
    /// Wrap bonds around the chain ends.
    pub periodic: bool,
    /// Bond length `d`.
    pub distance: usize,
}

impl Default for NeighbourInteraction {
    fn default() -> Self {
        Self {
            periodic: false,
            distance: 1,
        }
    }
}

impl Observable for NeighbourInteraction {
    fn name(&self) -> String {
        format!(
            "NeighbourInteraction(periodic={}, distance={})",
            self.periodic, self.distance
        )
    }

    fn symbol(&self) -> String {
        format!("Z_i Z_(i+{})", self.distance)
    }

    fn apply(
        &self,
        model: &dyn WaveFunction,
        samples: &DMatrix<f64>,
    ) -> Result<DVector<f64>, QstError> {
        let num_sites = samples.ncols();
        let bonds = if self.periodic {
            num_sites
        } else {
            num_sites.saturating_sub(self.distance)
        };
        if self.distance == 0 || bonds == 0 {
            return Err(QstError::Config(
                ErrorInfo::new("invalid-distance", "bond length leaves no bonds on the chain")
                    .with_context("distance", self.distance.to_string())
                    .with_context("sites", num_sites.to_string()),
            ));
        }
        map_rows(model, samples, |row| {
            let total: f64 = (0..bonds)
                .map(|site| to_pm1(row[site]) * to_pm1(row[(site + self.distance) % num_sites]))
                .sum();
            total / bonds as f64
        })
    }
}
