#![allow(dead_code)]

use nalgebra::{DMatrix, SymmetricEigen};
use qst_core::cplx::{self, Complex64};
use qst_core::{hilbert_space, rotate_psi, to_pm1, Basis, RngHandle, UnitaryDict};
use qst_data::TrainingSet;
use rand::Rng;

/// Ground state of the open transverse-field Ising chain `-Σ ZZ - h Σ X`.
pub fn tfim_ground_state(num_sites: usize, field: f64) -> Vec<Complex64> {
    let space = hilbert_space(num_sites).unwrap();
    let dim = space.nrows();
    let mut hamiltonian = DMatrix::<f64>::zeros(dim, dim);
    for state in 0..dim {
        for site in 0..num_sites - 1 {
            hamiltonian[(state, state)] -=
                to_pm1(space[(state, site)]) * to_pm1(space[(state, site + 1)]);
        }
        for site in 0..num_sites {
            let flipped = state ^ (1 << (num_sites - 1 - site));
            hamiltonian[(flipped, state)] -= field;
        }
    }
    let eigen = SymmetricEigen::new(hamiltonian);
    let (ground, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (idx, &value)| {
            if value < best.1 {
                (idx, value)
            } else {
                best
            }
        });
    eigen
        .eigenvectors
        .column(ground)
        .iter()
        .map(|&amp| Complex64::new(amp.abs(), 0.0))
        .collect()
}

fn draw_index(probabilities: &[f64], rng: &mut RngHandle) -> usize {
    let total: f64 = probabilities.iter().sum();
    let mut draw = rng.gen::<f64>() * total;
    for (idx, &p) in probabilities.iter().enumerate() {
        if draw < p {
            return idx;
        }
        draw -= p;
    }
    probabilities.len() - 1
}

/// Exact measurement record of `psi`: `per_basis` outcomes in every basis.
pub fn measurement_record(
    psi: &[Complex64],
    bases: &[Basis],
    per_basis: usize,
    seed: u64,
) -> TrainingSet {
    let num_sites = bases[0].len();
    let space = hilbert_space(num_sites).unwrap();
    let dict = UnitaryDict::standard();
    let mut rng = RngHandle::from_seed(seed);
    let mut rows = Vec::new();
    let mut row_bases = Vec::new();
    for basis in bases {
        let rotated = rotate_psi(&dict, basis, psi).unwrap();
        let probabilities = cplx::probabilities(&rotated);
        for _ in 0..per_basis {
            rows.push(draw_index(&probabilities, &mut rng));
            row_bases.push(basis.clone());
        }
    }
    let samples = DMatrix::from_fn(rows.len(), num_sites, |row, col| space[(rows[row], col)]);
    let all_reference = row_bases.iter().all(Basis::is_reference);
    TrainingSet::new(samples, if all_reference { None } else { Some(row_bases) }).unwrap()
}

/// Two-qubit state used by the complex-wavefunction walkthrough.
pub fn two_qubit_state() -> Vec<Complex64> {
    cplx::normalize(&[
        Complex64::new(0.2861, 0.0539),
        Complex64::new(0.3687, -0.3023),
        Complex64::new(-0.1672, -0.3529),
        Complex64::new(-0.5659, -0.4639),
    ])
}

pub fn bases(labels: &[&str]) -> Vec<Basis> {
    labels.iter().map(|label| Basis::parse(label).unwrap()).collect()
}
