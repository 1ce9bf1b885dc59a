//! Unitary dictionary and local basis rotations.

use std::collections::BTreeMap;
use std::f64::consts::FRAC_1_SQRT_2;

use nalgebra::{DMatrix, Matrix2};
use num_complex::Complex64;

use crate::basis::{Basis, REFERENCE_LABEL};
use crate::errors::{ErrorInfo, QstError};

/// Single-site rotation. Rows index the measured outcome, columns the
/// computational state.
pub type Unitary = Matrix2<Complex64>;

/// Real and imaginary planes of a unitary, `[plane][row][col]`.
pub type UnitaryPlanes = [[[f64; 2]; 2]; 2];

const UNITARY_TOLERANCE: f64 = 1e-9;

/// Mapping from basis label to the rotation applied before measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitaryDict {
    entries: BTreeMap<char, Unitary>,
}

impl UnitaryDict {
    /// Dictionary containing the `X`, `Y` and `Z` rotations.
    pub fn standard() -> Self {
        let r = Complex64::new(FRAC_1_SQRT_2, 0.0);
        let i = Complex64::new(0.0, FRAC_1_SQRT_2);
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        let mut entries = BTreeMap::new();
        entries.insert('X', Matrix2::new(r, r, r, -r));
        entries.insert('Y', Matrix2::new(r, -i, r, i));
        entries.insert(REFERENCE_LABEL, Matrix2::new(one, zero, zero, one));
        Self { entries }
    }

    /// Adds or replaces a rotation after checking that it is unitary.
    pub fn insert(&mut self, label: char, unitary: Unitary) -> Result<(), QstError> {
        let product = unitary * unitary.adjoint();
        let deviation = (product - Unitary::identity())
            .iter()
            .map(|z| z.norm())
            .fold(0.0, f64::max);
        if deviation > UNITARY_TOLERANCE {
            return Err(QstError::Basis(
                ErrorInfo::new("non-unitary", "rotation matrix is not unitary")
                    .with_context("label", label.to_string())
                    .with_context("deviation", format!("{deviation:e}")),
            ));
        }
        self.entries.insert(label, unitary);
        Ok(())
    }

    /// Looks up the rotation for `label`.
    pub fn get(&self, label: char) -> Result<&Unitary, QstError> {
        self.entries.get(&label).ok_or_else(|| {
            QstError::Basis(
                ErrorInfo::new("unknown-basis-label", "basis label missing from unitary dictionary")
                    .with_context("label", label.to_string())
                    .with_hint("register the rotation with UnitaryDict::insert"),
            )
        })
    }

    /// Returns true when `label` has a registered rotation.
    pub fn contains(&self, label: char) -> bool {
        self.entries.contains_key(&label)
    }

    /// Registered labels in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = char> + '_ {
        self.entries.keys().copied()
    }

    /// Fails if any label of `basis` is unknown.
    pub fn check_basis(&self, basis: &Basis) -> Result<(), QstError> {
        for &label in basis.labels() {
            self.get(label).map_err(|err| match err {
                QstError::Basis(info) => {
                    QstError::Basis(info.with_context("basis", basis.to_string()))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Exports every rotation as real/imaginary planes.
    pub fn to_planes(&self) -> BTreeMap<String, UnitaryPlanes> {
        self.entries
            .iter()
            .map(|(label, unitary)| {
                let mut planes = [[[0.0; 2]; 2]; 2];
                for row in 0..2 {
                    for col in 0..2 {
                        planes[0][row][col] = unitary[(row, col)].re;
                        planes[1][row][col] = unitary[(row, col)].im;
                    }
                }
                (label.to_string(), planes)
            })
            .collect()
    }

    /// Rebuilds a dictionary from real/imaginary planes.
    pub fn from_planes(planes: &BTreeMap<String, UnitaryPlanes>) -> Result<Self, QstError> {
        let mut dict = Self {
            entries: BTreeMap::new(),
        };
        for (name, plane) in planes {
            let mut chars = name.chars();
            let label = match (chars.next(), chars.next()) {
                (Some(label), None) => label,
                _ => {
                    return Err(QstError::Basis(
                        ErrorInfo::new("invalid-basis-label", "unitary labels must be one character")
                            .with_context("label", name.clone()),
                    ))
                }
            };
            let unitary = Matrix2::from_fn(|row, col| {
                Complex64::new(plane[0][row][col], plane[1][row][col])
            });
            dict.insert(label, unitary)?;
        }
        Ok(dict)
    }
}

impl Default for UnitaryDict {
    fn default() -> Self {
        Self::standard()
    }
}

/// Applies `⊗_s U_s` of `basis` to a full state vector.
pub fn rotate_psi(
    dict: &UnitaryDict,
    basis: &Basis,
    psi: &[Complex64],
) -> Result<Vec<Complex64>, QstError> {
    let num_sites = basis.len();
    if psi.len() != 1usize << num_sites {
        return Err(QstError::Basis(
            ErrorInfo::new("psi-size-mismatch", "state vector does not match basis size")
                .with_context("sites", num_sites.to_string())
                .with_context("amplitudes", psi.len().to_string()),
        ));
    }
    let mut rotated = psi.to_vec();
    for (site, &label) in basis.labels().iter().enumerate() {
        let unitary = dict.get(label)?;
        let stride = 1usize << (num_sites - 1 - site);
        for base in 0..rotated.len() {
            if base & stride != 0 {
                continue;
            }
            let a = rotated[base];
            let b = rotated[base + stride];
            rotated[base] = unitary[(0, 0)] * a + unitary[(0, 1)] * b;
            rotated[base + stride] = unitary[(1, 0)] * a + unitary[(1, 1)] * b;
        }
    }
    Ok(rotated)
}

/// Computational configurations contributing to one rotated measurement.
#[derive(Debug, Clone)]
pub struct RotatedState {
    /// Products `Π_s U_s[σ_s, v_s]` over rotated sites, one per row of `configs`.
    pub coefficients: Vec<Complex64>,
    /// Configurations `v` agreeing with the sample on unrotated sites.
    pub configs: DMatrix<f64>,
}

/// Expands a measured `sample` in `basis` into computational configurations.
pub fn rotate_basis_state(
    dict: &UnitaryDict,
    basis: &Basis,
    sample: &[f64],
) -> Result<RotatedState, QstError> {
    if sample.len() != basis.len() {
        return Err(QstError::Basis(
            ErrorInfo::new("basis-size-mismatch", "sample and basis differ in site count")
                .with_context("sample_sites", sample.len().to_string())
                .with_context("basis_sites", basis.len().to_string()),
        ));
    }
    let sites = basis.rotated_sites();
    let unitaries = sites
        .iter()
        .map(|&site| dict.get(basis.labels()[site]))
        .collect::<Result<Vec<_>, _>>()?;
    let count = 1usize << sites.len();
    let mut configs = DMatrix::zeros(count, sample.len());
    let mut coefficients = Vec::with_capacity(count);
    for row in 0..count {
        for (col, &bit) in sample.iter().enumerate() {
            configs[(row, col)] = bit;
        }
        let mut coefficient = Complex64::new(1.0, 0.0);
        for (pos, (&site, unitary)) in sites.iter().zip(&unitaries).enumerate() {
            let v_bit = (row >> (sites.len() - 1 - pos)) & 1;
            let sigma_bit = usize::from(sample[site] > 0.5);
            configs[(row, site)] = v_bit as f64;
            coefficient *= unitary[(sigma_bit, v_bit)];
        }
        coefficients.push(coefficient);
    }
    Ok(RotatedState {
        coefficients,
        configs,
    })
}

/// Rotated amplitude of one measurement together with its per-configuration terms.
#[derive(Debug, Clone)]
pub struct RotatedAmplitude {
    /// `Σ_v Ut(v) psi(v)`.
    pub total: Complex64,
    /// `Ut(v) psi(v)` for every row of `configs`.
    pub terms: Vec<Complex64>,
    /// Configurations `v`.
    pub configs: DMatrix<f64>,
}

/// Projects the wavefunction `psi` onto a measured configuration in `basis`.
pub fn rotate_psi_inner_prod<F>(
    dict: &UnitaryDict,
    basis: &Basis,
    sample: &[f64],
    psi: F,
) -> Result<RotatedAmplitude, QstError>
where
    F: Fn(&[f64]) -> Complex64,
{
    let rotated = rotate_basis_state(dict, basis, sample)?;
    let mut row_buf = vec![0.0; sample.len()];
    let terms: Vec<Complex64> = rotated
        .coefficients
        .iter()
        .enumerate()
        .map(|(row, coefficient)| {
            for (col, slot) in row_buf.iter_mut().enumerate() {
                *slot = rotated.configs[(row, col)];
            }
            coefficient * psi(&row_buf)
        })
        .collect();
    Ok(RotatedAmplitude {
        total: terms.iter().sum(),
        terms,
        configs: rotated.configs,
    })
}
