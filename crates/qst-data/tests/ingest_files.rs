use std::fs;

use nalgebra::DMatrix;
use qst_core::Basis;
use qst_data::{
    load_data, load_samples, load_unique_bases, parse_bases, parse_samples, parse_wavefunction,
    write_samples, DataPaths,
};
use tempfile::tempdir;

#[test]
fn samples_accept_separated_and_contiguous_digits() {
    let spaced = parse_samples("1 0 1\n\n0 0 1\n", "inline").unwrap();
    let packed = parse_samples("101\n001\n", "inline").unwrap();
    assert_eq!(spaced, packed);
    assert_eq!(spaced, DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn ragged_and_invalid_samples_are_rejected() {
    let err = parse_samples("1 0 1\n1 0\n", "train.txt").unwrap_err();
    assert_eq!(err.code(), "ragged-rows");
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("2"));

    let err = parse_samples("1 2 0\n", "train.txt").unwrap_err();
    assert_eq!(err.code(), "invalid-bit");

    let err = parse_samples("\n\n", "train.txt").unwrap_err();
    assert_eq!(err.code(), "empty-data");
}

#[test]
fn bases_parse_with_or_without_spaces() {
    let bases = parse_bases("X Z\nZZ\n\nY Z\n", "bases").unwrap();
    assert_eq!(
        bases,
        vec![
            Basis::parse("XZ").unwrap(),
            Basis::reference(2),
            Basis::parse("YZ").unwrap()
        ]
    );
    let err = parse_bases("X?\n", "bases").unwrap_err();
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("1"));
}

#[test]
fn wavefunction_accepts_one_or_two_columns() {
    let psi = parse_wavefunction("0.5 0.1\n0.5 -0.1\n0.5 0\n0.5 0\n", "psi").unwrap();
    assert_eq!(psi.len(), 4);
    assert_eq!(psi[1].im, -0.1);

    let real = parse_wavefunction("0.6\n0.8\n", "psi").unwrap();
    assert_eq!(real[1].im, 0.0);

    let err = parse_wavefunction("0.6\n0.8\n0.0\n", "psi").unwrap_err();
    assert_eq!(err.code(), "psi-length");
    let err = parse_wavefunction("0.6 0.1\n0.8\n", "psi").unwrap_err();
    assert_eq!(err.code(), "ragged-rows");
}

#[test]
fn load_data_bundles_and_checks_alignment() {
    let dir = tempdir().unwrap();
    let samples = dir.path().join("samples.txt");
    let bases = dir.path().join("bases.txt");
    let unique = dir.path().join("unique.txt");
    let target = dir.path().join("psi.txt");
    fs::write(&samples, "1 0\n0 1\n1 1\n").unwrap();
    fs::write(&bases, "ZZ\nXZ\nZY\n").unwrap();
    fs::write(&unique, "ZZ\nXZ\nZX\nZY\nYZ\n").unwrap();
    fs::write(&target, "0.5 0\n0.5 0\n0.5 0\n0.5 0\n").unwrap();

    let paths = DataPaths {
        train_samples: samples.clone(),
        train_bases: Some(bases.clone()),
        unique_bases: Some(unique),
        target: Some(target),
    };
    let data = load_data(&paths).unwrap();
    assert_eq!(data.training.len(), 3);
    assert_eq!(data.unique_bases.as_ref().map(Vec::len), Some(5));
    assert_eq!(data.target.as_ref().map(Vec::len), Some(4));

    fs::write(&bases, "ZZ\nXZ\n").unwrap();
    let err = load_data(&paths).unwrap_err();
    assert_eq!(err.code(), "row-mismatch");
}

#[test]
fn duplicate_unique_bases_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("unique.txt");
    fs::write(&path, "ZZ\nXZ\nZZ\n").unwrap();
    assert_eq!(load_unique_bases(&path).unwrap_err().code(), "duplicate-basis");
}

#[test]
fn written_samples_load_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out").join("samples.txt");
    let samples = DMatrix::from_row_slice(2, 4, &[1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0]);
    write_samples(&path, &samples).unwrap();
    assert_eq!(load_samples(&path).unwrap(), samples);
}

#[test]
fn missing_files_surface_as_io_errors() {
    let dir = tempdir().unwrap();
    let err = load_samples(&dir.path().join("absent.txt")).unwrap_err();
    assert_eq!(err.code(), "read-failed");
}
