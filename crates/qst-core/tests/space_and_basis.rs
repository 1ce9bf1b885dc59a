use qst_core::{hilbert_space, state_index, to_01, to_pm1, Basis, QstError, MAX_EXACT_SITES};

#[test]
fn hilbert_space_is_big_endian() {
    let space = hilbert_space(3).unwrap();
    assert_eq!(space.nrows(), 8);
    assert_eq!(space.ncols(), 3);
    let row: Vec<f64> = space.row(1).iter().copied().collect();
    assert_eq!(row, vec![0.0, 0.0, 1.0]);
    let row: Vec<f64> = space.row(6).iter().copied().collect();
    assert_eq!(row, vec![1.0, 1.0, 0.0]);
    for index in 0..space.nrows() {
        assert_eq!(state_index(space.row(index).iter()), index);
    }
}

#[test]
fn oversized_space_is_rejected() {
    match hilbert_space(MAX_EXACT_SITES + 1) {
        Err(QstError::Space(info)) => assert_eq!(info.code, "space-too-large"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn spin_conversions_invert() {
    assert_eq!(to_pm1(0.0), -1.0);
    assert_eq!(to_pm1(1.0), 1.0);
    assert_eq!(to_01(to_pm1(1.0)), 1.0);
    assert_eq!(to_01(-1.0), 0.0);
}

#[test]
fn basis_parsing_ignores_whitespace() {
    let spaced = Basis::parse("X Z  Y").unwrap();
    let packed = Basis::parse("XZY").unwrap();
    assert_eq!(spaced, packed);
    assert_eq!(spaced.to_string(), "XZY");
    assert_eq!(spaced.rotated_sites(), vec![0, 2]);
    assert!(!spaced.is_reference());
    assert!(Basis::reference(4).is_reference());
}

#[test]
fn basis_parsing_rejects_garbage() {
    assert!(Basis::parse("   ").is_err());
    assert!(Basis::parse("X,Z").is_err());
}
