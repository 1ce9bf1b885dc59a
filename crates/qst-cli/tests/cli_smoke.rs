use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

fn qst(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qst"))
        .args(args)
        .output()
        .expect("run qst")
}

fn json_stdout(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "qst failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json on stdout")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

fn write_fixtures(dir: &Path) {
    let rows = ["0 0", "1 1", "1 1", "0 0", "0 1", "1 1", "0 0", "1 0"];
    fs::write(dir.join("samples.txt"), rows.join("\n")).unwrap();
    let bases = ["Z Z", "Z Z", "X Z", "Z X", "Z Z", "X Z", "Z Z", "Z X"];
    fs::write(dir.join("bases.txt"), bases.join("\n")).unwrap();
    fs::write(dir.join("unique.txt"), "ZZ\nXZ\nZX\n").unwrap();
    fs::write(
        dir.join("psi.txt"),
        "0.7071067811865476 0\n0 0\n0 0\n0.7071067811865476 0\n",
    )
    .unwrap();
}

#[test]
fn validate_reports_data_shape() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    let value = json_stdout(&qst(&[
        "validate",
        "--train-samples",
        path_str(&dir.path().join("samples.txt")),
        "--train-bases",
        path_str(&dir.path().join("bases.txt")),
        "--unique-bases",
        path_str(&dir.path().join("unique.txt")),
        "--target",
        path_str(&dir.path().join("psi.txt")),
    ]));
    assert_eq!(value["rows"], 8);
    assert_eq!(value["sites"], 2);
    assert_eq!(value["reference_rows"], 4);
    assert_eq!(value["has_target"], true);
    assert_eq!(value["bases"].as_array().unwrap().len(), 3);

    fs::write(dir.path().join("short.txt"), "ZZ\nZZ\n").unwrap();
    let output = qst(&[
        "validate",
        "--train-samples",
        path_str(&dir.path().join("samples.txt")),
        "--train-bases",
        path_str(&dir.path().join("short.txt")),
    ]);
    assert!(!output.status.success());
}

#[test]
fn train_then_use_the_saved_model() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    let run_dir = dir.path().join("run");
    let trained = json_stdout(&qst(&[
        "train",
        "--train-samples",
        path_str(&dir.path().join("samples.txt")),
        "--train-bases",
        path_str(&dir.path().join("bases.txt")),
        "--unique-bases",
        path_str(&dir.path().join("unique.txt")),
        "--target",
        path_str(&dir.path().join("psi.txt")),
        "--kind",
        "complex",
        "--epochs",
        "3",
        "--seed",
        "4",
        "--out",
        path_str(&run_dir),
    ]));
    assert_eq!(trained["kind"], "complex");
    assert_eq!(trained["last_epoch"], 3);
    assert!(trained["final_metrics"]["fidelity"].is_number());
    for file in ["model.json", "metrics.csv", "manifest.json"] {
        assert!(run_dir.join(file).exists(), "missing {file}");
    }
    let model = run_dir.join("model.json");

    let inspected = json_stdout(&qst(&["inspect", "--model", path_str(&model)]));
    assert_eq!(inspected["num_visible"], 2);
    assert_eq!(inspected["params_hash"], trained["params_hash"]);
    assert_eq!(inspected["metadata"]["epoch"], "3");

    let samples = dir.path().join("drawn.txt");
    let output = qst(&[
        "sample",
        "--model",
        path_str(&model),
        "--num-samples",
        "12",
        "-k",
        "3",
        "--out",
        path_str(&samples),
    ]);
    assert!(output.status.success());
    let drawn = fs::read_to_string(&samples).unwrap();
    assert_eq!(drawn.lines().count(), 12);
    assert!(drawn.lines().all(|line| line.split_whitespace().count() == 2));

    let evaluated = json_stdout(&qst(&[
        "evaluate",
        "--model",
        path_str(&model),
        "--target",
        path_str(&dir.path().join("psi.txt")),
        "--samples",
        path_str(&dir.path().join("samples.txt")),
        "--sample-bases",
        path_str(&dir.path().join("bases.txt")),
    ]));
    let fidelity = evaluated["fidelity"].as_f64().unwrap();
    assert!((0.0..=1.0 + 1e-9).contains(&fidelity));
    assert!(evaluated["nll"].as_f64().unwrap() > 0.0);

    let energy = json_stdout(&qst(&[
        "energy",
        "--model",
        path_str(&model),
        "--steps",
        "0,2,4",
        "--num-samples",
        "64",
    ]));
    assert_eq!(energy["points"].as_array().unwrap().len(), 3);
    assert!(energy["reference"].is_number());
}
