use nalgebra::{DMatrix, DVector};
use qst_core::{hilbert_space, state_index, RngHandle};
use qst_rbm::{BinaryRbm, PositiveWaveFunction, RbmInit, WaveFunction};

fn sample_rbm() -> BinaryRbm {
    let weights = DMatrix::from_row_slice(2, 3, &[1.2, -0.8, 0.5, -0.6, 0.9, 0.7]);
    let visible_bias = DVector::from_vec(vec![0.4, -0.2, 0.1]);
    let hidden_bias = DVector::from_vec(vec![0.3, -0.5]);
    BinaryRbm::from_parts(weights, visible_bias, hidden_bias).unwrap()
}

#[test]
fn gibbs_chains_are_reproducible() {
    let rbm = sample_rbm();
    let initial = DMatrix::from_fn(64, 3, |row, col| ((row + col) % 2) as f64);
    let a = rbm
        .gibbs_steps(5, &initial, &mut RngHandle::from_seed(99))
        .unwrap();
    let b = rbm
        .gibbs_steps(5, &initial, &mut RngHandle::from_seed(99))
        .unwrap();
    assert_eq!(a, b);
    assert!(a.iter().all(|&x| x == 0.0 || x == 1.0));
}

#[test]
fn zero_steps_return_initial_state() {
    let rbm = sample_rbm();
    let initial = DMatrix::from_fn(8, 3, |row, col| ((row >> col) & 1) as f64);
    let out = rbm
        .gibbs_steps(0, &initial, &mut RngHandle::from_seed(1))
        .unwrap();
    assert_eq!(out, initial);
}

#[test]
fn long_chains_match_exact_distribution() {
    let model = PositiveWaveFunction::from_rbm(sample_rbm());
    let space = hilbert_space(3).unwrap();
    let z = model.normalization(&space).unwrap();
    let mut rng = RngHandle::from_seed(2024);
    let samples = model.sample(40, 20_000, None, &mut rng).unwrap();

    let mut counts = [0usize; 8];
    for row in 0..samples.nrows() {
        counts[state_index(samples.row(row).iter())] += 1;
    }
    let mut buffer = [0.0; 3];
    for (index, count) in counts.iter().enumerate() {
        for (col, slot) in buffer.iter_mut().enumerate() {
            *slot = space[(index, col)];
        }
        let exact = model.probability(&buffer, z);
        let empirical = *count as f64 / samples.nrows() as f64;
        assert!(
            (exact - empirical).abs() < 0.02,
            "state {index}: exact {exact} empirical {empirical}"
        );
    }
}

#[test]
fn sample_rejects_misshaped_initial_state() {
    let model = PositiveWaveFunction::new(3, &RbmInit::default()).unwrap();
    let err = model
        .sample(1, 4, Some(&DMatrix::zeros(3, 3)), &mut RngHandle::from_seed(0))
        .unwrap_err();
    assert_eq!(err.code(), "initial-state-shape");
}
