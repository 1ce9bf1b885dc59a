use std::fs;

use qst_train::{MetricKind, TrainConfig};
use tempfile::tempdir;

#[test]
fn empty_document_yields_defaults() {
    let config = TrainConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, TrainConfig::default());
    assert_eq!(config.epochs, 100);
    assert_eq!(config.pos_batch_size, 100);
    assert_eq!(config.neg_batch_size(), 100);
    assert_eq!(config.k, 1);
    assert_eq!(config.learning_rate, 1e-3);
    assert_eq!(
        config.evaluation.metrics,
        vec![MetricKind::Fidelity, MetricKind::Kl]
    );
    assert!(config.early_stopping.is_none());
    assert_eq!(config.checkpoint.interval, 0);
}

#[test]
fn partial_documents_override_fields() {
    let yaml = r#"
epochs: 500
pos_batch_size: 100
neg_batch_size: 200
k: 10
learning_rate: 0.01
seed_policy:
  master_seed: 1234
evaluation:
  period: 10
  metrics: [fidelity, nll]
early_stopping:
  monitor: nll
  patience: 5
output:
  run_directory: runs/tfim
  model_file: model.bin
data:
  train_samples: data/samples.txt
  target: data/psi.txt
"#;
    let config = TrainConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.epochs, 500);
    assert_eq!(config.neg_batch_size(), 200);
    assert_eq!(config.seed_policy.master_seed, 1234);
    assert_eq!(config.evaluation.metrics, vec![MetricKind::Fidelity, MetricKind::Nll]);
    let stopping = config.early_stopping.unwrap();
    assert_eq!(stopping.monitor, MetricKind::Nll);
    assert_eq!(stopping.patience, 5);
    assert_eq!(stopping.tolerance, 1e-4);
    assert_eq!(config.output.metrics_file.to_str(), Some("metrics.csv"));
    let data = config.data.unwrap();
    assert!(data.train_bases.is_none());
    assert_eq!(data.target.unwrap().to_str(), Some("data/psi.txt"));
}

#[test]
fn out_of_range_values_are_rejected() {
    for yaml in [
        "epochs: 0",
        "pos_batch_size: 0",
        "neg_batch_size: 0",
        "k: 0",
        "learning_rate: -0.1",
        "momentum: 1.5",
        "evaluation: { period: 0 }",
    ] {
        let err = TrainConfig::from_yaml_str(yaml).unwrap_err();
        assert_eq!(err.code(), "invalid-config", "{yaml}");
    }
    let err = TrainConfig::from_yaml_str("epochs: [1, 2]").unwrap_err();
    assert_eq!(err.code(), "config-parse");
    let err = TrainConfig::from_yaml_str("evaluation: { metrics: [energy] }").unwrap_err();
    assert_eq!(err.code(), "config-parse");
}

#[test]
fn files_report_their_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.yaml");
    fs::write(&path, "epochs: 0\n").unwrap();
    let err = TrainConfig::from_path(&path).unwrap_err();
    assert_eq!(
        err.info().context.get("path").map(String::as_str),
        Some(path.display().to_string().as_str())
    );
}
