use std::collections::BTreeSet;

use nalgebra::DMatrix;
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{Basis, UnitaryDict};

/// Measurement outcomes paired row-by-row with the basis they were taken in.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    samples: DMatrix<f64>,
    bases: Option<Vec<Basis>>,
}

impl TrainingSet {
    /// Pairs `samples` with `bases`, which must supply one basis per row.
    pub fn new(samples: DMatrix<f64>, bases: Option<Vec<Basis>>) -> Result<Self, QstError> {
        if let Some(bases) = &bases {
            if bases.len() != samples.nrows() {
                return Err(QstError::Data(
                    ErrorInfo::new("row-mismatch", "samples and bases have different row counts")
                        .with_context("samples", samples.nrows().to_string())
                        .with_context("bases", bases.len().to_string())
                        .with_hint("every sample line needs a matching line in the bases file"),
                ));
            }
        }
        Ok(Self { samples, bases })
    }

    /// Sample matrix, one row per measurement.
    pub fn samples(&self) -> &DMatrix<f64> {
        &self.samples
    }

    /// Per-row bases, if the record is not purely computational.
    pub fn bases(&self) -> Option<&[Basis]> {
        self.bases.as_deref()
    }

    /// Number of sites per sample.
    pub fn num_visible(&self) -> usize {
        self.samples.ncols()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    /// True when the record holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    /// Rows measured in the reference basis (every row when there are no bases).
    pub fn reference_samples(&self) -> DMatrix<f64> {
        match &self.bases {
            None => self.samples.clone(),
            Some(bases) => {
                let rows: Vec<usize> = bases
                    .iter()
                    .enumerate()
                    .filter(|(_, basis)| basis.is_reference())
                    .map(|(row, _)| row)
                    .collect();
                self.samples.select_rows(rows.iter())
            }
        }
    }

    /// Distinct bases in sorted order.
    pub fn unique_bases(&self) -> Vec<Basis> {
        match &self.bases {
            None => vec![Basis::reference(self.num_visible())],
            Some(bases) => bases
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    /// Selects rows by index, keeping their bases.
    pub fn subset(&self, rows: &[usize]) -> TrainingSet {
        TrainingSet {
            samples: self.samples.select_rows(rows.iter()),
            bases: self
                .bases
                .as_ref()
                .map(|bases| rows.iter().map(|&row| bases[row].clone()).collect()),
        }
    }

    /// Checks the record against a model of `num_visible` sites.
    ///
    /// Every basis must have `num_visible` labels known to `dict`; when
    /// `unique_bases` is given every row's basis must be listed there.
    pub fn validate(
        &self,
        num_visible: usize,
        dict: &UnitaryDict,
        unique_bases: Option<&[Basis]>,
    ) -> Result<(), QstError> {
        if self.num_visible() != num_visible {
            return Err(QstError::Data(
                ErrorInfo::new("site-mismatch", "sample width differs from visible units")
                    .with_context("expected", num_visible.to_string())
                    .with_context("found", self.num_visible().to_string()),
            ));
        }
        let Some(bases) = &self.bases else {
            return Ok(());
        };
        let listed: Option<BTreeSet<&Basis>> = unique_bases.map(|list| list.iter().collect());
        for (row, basis) in bases.iter().enumerate() {
            if basis.len() != num_visible {
                return Err(QstError::Data(
                    ErrorInfo::new("site-mismatch", "basis site count differs from visible units")
                        .with_context("row", (row + 1).to_string())
                        .with_context("basis", basis.to_string())
                        .with_context("expected", num_visible.to_string()),
                ));
            }
            dict.check_basis(basis)?;
            if let Some(listed) = &listed {
                if !listed.contains(basis) {
                    return Err(QstError::Basis(
                        ErrorInfo::new("basis-not-listed", "basis missing from unique-bases list")
                            .with_context("row", (row + 1).to_string())
                            .with_context("basis", basis.to_string()),
                    ));
                }
            }
        }
        Ok(())
    }
}
