use nalgebra::{DMatrix, DVector};
use qst_core::hilbert_space;
use qst_rbm::{BinaryRbm, PositiveWaveFunction, RbmInit, WaveFunction};

fn sample_rbm() -> BinaryRbm {
    let weights = DMatrix::from_row_slice(2, 3, &[0.3, -0.2, 0.5, -0.4, 0.1, 0.25]);
    let visible_bias = DVector::from_vec(vec![0.1, -0.3, 0.2]);
    let hidden_bias = DVector::from_vec(vec![-0.05, 0.15]);
    BinaryRbm::from_parts(weights, visible_bias, hidden_bias).unwrap()
}

fn perturbed(rbm: &BinaryRbm, delta: f64, target: Target) -> BinaryRbm {
    let mut weights = rbm.weights().clone();
    let mut visible_bias = rbm.visible_bias().clone();
    let mut hidden_bias = rbm.hidden_bias().clone();
    match target {
        Target::Weight(row, col) => weights[(row, col)] += delta,
        Target::Visible(idx) => visible_bias[idx] += delta,
        Target::Hidden(idx) => hidden_bias[idx] += delta,
    }
    BinaryRbm::from_parts(weights, visible_bias, hidden_bias).unwrap()
}

#[derive(Clone, Copy)]
enum Target {
    Weight(usize, usize),
    Visible(usize),
    Hidden(usize),
}

#[test]
fn effective_energy_matches_closed_form() {
    let rbm = sample_rbm();
    let v = [1.0, 0.0, 1.0];
    let visible = 0.1 + 0.2;
    let pre = [0.3 + 0.5 - 0.05, -0.4 + 0.25 + 0.15];
    let hidden: f64 = pre.iter().map(|x: &f64| (1.0 + x.exp()).ln()).sum();
    assert!((rbm.effective_energy(&v) + visible + hidden).abs() < 1e-12);
}

#[test]
fn energy_gradient_matches_finite_differences() {
    let rbm = sample_rbm();
    let v = [1.0, 1.0, 0.0];
    let grad = rbm.effective_energy_gradient(&v);
    let eps = 1e-6;
    let mut targets = Vec::new();
    for row in 0..2 {
        for col in 0..3 {
            targets.push((Target::Weight(row, col), grad.weights[(row, col)]));
        }
    }
    for idx in 0..3 {
        targets.push((Target::Visible(idx), grad.visible_bias[idx]));
    }
    for idx in 0..2 {
        targets.push((Target::Hidden(idx), grad.hidden_bias[idx]));
    }
    for (target, analytic) in targets {
        let plus = perturbed(&rbm, eps, target).effective_energy(&v);
        let minus = perturbed(&rbm, -eps, target).effective_energy(&v);
        let numeric = (plus - minus) / (2.0 * eps);
        assert!((numeric - analytic).abs() < 1e-6, "{numeric} vs {analytic}");
    }
}

#[test]
fn batch_gradient_is_sum_of_rows() {
    let rbm = sample_rbm();
    let samples = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
    let batch = rbm.effective_energy_gradient_batch(&samples).unwrap();
    let mut expected = rbm.effective_energy_gradient(&[1.0, 0.0, 1.0]);
    expected.add_scaled(&rbm.effective_energy_gradient(&[0.0, 1.0, 1.0]), 1.0);
    let mut diff = batch.clone();
    diff.add_scaled(&expected, -1.0);
    assert!(diff.norm() < 1e-12);
}

#[test]
fn partition_sums_unnormalised_probabilities() {
    let rbm = sample_rbm();
    let space = hilbert_space(3).unwrap();
    let energies = rbm.effective_energy_batch(&space).unwrap();
    let direct: f64 = energies.iter().map(|e| (-e).exp()).sum();
    assert!((rbm.partition(&space).unwrap() - direct).abs() < 1e-10);
    assert!((rbm.log_partition(&space).unwrap() - direct.ln()).abs() < 1e-12);
}

#[test]
fn construction_rejects_bad_shapes() {
    let err = BinaryRbm::from_parts(
        DMatrix::zeros(2, 3),
        DVector::zeros(2),
        DVector::zeros(2),
    )
    .unwrap_err();
    assert_eq!(err.code(), "shape-mismatch");

    let err = BinaryRbm::new(0, &RbmInit::default()).unwrap_err();
    assert_eq!(err.code(), "empty-layer");

    let rbm = sample_rbm();
    let err = rbm.effective_energy_batch(&DMatrix::zeros(1, 4)).unwrap_err();
    assert_eq!(err.code(), "visible-size-mismatch");
}

#[test]
fn initialisation_is_seeded_and_hidden_defaults_to_visible() {
    let init = RbmInit {
        seed: 17,
        ..RbmInit::default()
    };
    let a = BinaryRbm::new(5, &init).unwrap();
    let b = BinaryRbm::new(5, &init).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.num_hidden(), 5);
    assert_eq!(a.num_params(), 25 + 5 + 5);
    assert!(a.visible_bias().iter().all(|&x| x == 0.0));

    let zeros = BinaryRbm::new(
        4,
        &RbmInit {
            num_hidden: Some(2),
            zero_weights: true,
            seed: 1,
        },
    )
    .unwrap();
    assert!(zeros.weights().iter().all(|&x| x == 0.0));
    assert_eq!(zeros.weights().shape(), (2, 4));
}

#[test]
#[should_panic]
fn single_configuration_energy_rejects_wrong_width() {
    sample_rbm().effective_energy(&[1.0, 0.0]);
}

#[test]
#[should_panic]
fn amplitude_rejects_wrong_width() {
    let model = PositiveWaveFunction::new(3, &RbmInit::default()).unwrap();
    model.psi(&[1.0, 0.0]);
}
