mod common;

use std::path::PathBuf;

use nalgebra::DMatrix;
use qst_core::UnitaryDict;
use qst_data::TrainingSet;
use qst_rbm::{autoload, ModelKind};
use qst_train::{
    fit, resume, train, CheckpointConfig, EarlyStoppingConfig, EvaluationConfig, FitOptions,
    MetricKind, OutputConfig, RunManifest, SeedPolicy, Sgd, TrainConfig,
};
use tempfile::tempdir;

use common::{bases, measurement_record, tfim_ground_state};

fn small_config(seed: u64, run_directory: Option<PathBuf>) -> TrainConfig {
    TrainConfig {
        epochs: 10,
        pos_batch_size: 32,
        k: 2,
        learning_rate: 0.05,
        seed_policy: SeedPolicy {
            master_seed: seed,
            label: Some("small".to_string()),
        },
        evaluation: EvaluationConfig {
            period: 5,
            metrics: vec![MetricKind::Fidelity, MetricKind::Kl],
            verbose: false,
        },
        checkpoint: CheckpointConfig {
            interval: 5,
            max_to_keep: 4,
        },
        output: OutputConfig {
            run_directory,
            ..OutputConfig::default()
        },
        ..TrainConfig::default()
    }
}

#[test]
fn identical_seeds_give_identical_parameters() {
    let target = tfim_ground_state(3, 1.0);
    let data = measurement_record(&target, &bases(&["ZZZ"]), 128, 5);
    let run = |seed| {
        train(
            &small_config(seed, None),
            &data,
            None,
            ModelKind::Positive,
            UnitaryDict::standard(),
        )
        .unwrap()
    };
    let first = run(42);
    let second = run(42);
    let other = run(43);
    assert_eq!(first.fit.final_params_hash, second.fit.final_params_hash);
    assert_eq!(first.model, second.model);
    assert_ne!(first.fit.final_params_hash, other.fit.final_params_hash);
    assert!(first.model_path.is_none());
    assert!(first.checkpoints.is_empty());
}

#[test]
fn resumed_run_matches_uninterrupted_run() {
    let target = tfim_ground_state(3, 0.5);
    let data = measurement_record(&target, &bases(&["ZZZ"]), 100, 8);
    let full_dir = tempdir().unwrap();
    let full = train(
        &small_config(9, Some(full_dir.path().to_path_buf())),
        &data,
        Some(target.as_slice()),
        ModelKind::Positive,
        UnitaryDict::standard(),
    )
    .unwrap();
    assert_eq!(full.checkpoints.len(), 2);

    let checkpoint = full_dir.path().join("checkpoints").join("epoch_00005.json");
    let (_, metadata) = autoload(&checkpoint).unwrap();
    assert_eq!(metadata.get("epoch").map(String::as_str), Some("5"));
    assert_eq!(metadata.get("seed").map(String::as_str), Some("9"));
    assert!(metadata.contains_key("fidelity"));

    let resumed_dir = tempdir().unwrap();
    let resumed = resume(
        &checkpoint,
        &small_config(9, Some(resumed_dir.path().to_path_buf())),
        &data,
        Some(target.as_slice()),
    )
    .unwrap();
    assert_eq!(resumed.fit.epochs_run, 5);
    assert_eq!(resumed.fit.last_epoch, 10);
    assert_eq!(resumed.fit.final_params_hash, full.fit.final_params_hash);

    let manifest = RunManifest::load(resumed.manifest_path.as_ref().unwrap()).unwrap();
    assert_eq!(manifest.starting_epoch, 5);
    assert_eq!(manifest.last_epoch, 10);
}

#[test]
fn run_directory_receives_every_output() {
    let target = tfim_ground_state(2, 1.0);
    let data = measurement_record(&target, &bases(&["ZZ"]), 64, 13);
    let dir = tempdir().unwrap();
    let mut config = small_config(3, Some(dir.path().to_path_buf()));
    config.checkpoint.max_to_keep = 1;
    config.output.model_file = PathBuf::from("final.bin");
    let run = train(
        &config,
        &data,
        Some(target.as_slice()),
        ModelKind::Complex,
        UnitaryDict::standard(),
    )
    .unwrap();

    let model_path = run.model_path.clone().unwrap();
    assert_eq!(model_path, dir.path().join("final.bin"));
    let (loaded, metadata) = autoload(&model_path).unwrap();
    assert_eq!(loaded, run.model);
    assert_eq!(loaded.kind(), ModelKind::Complex);
    assert_eq!(metadata.get("epoch").map(String::as_str), Some("10"));

    assert_eq!(run.checkpoints, vec![dir.path().join("checkpoints").join("epoch_00010.bin")]);
    assert!(!dir.path().join("checkpoints").join("epoch_00005.bin").exists());

    let mut reader = csv::Reader::from_path(run.metrics_path.as_ref().unwrap()).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, vec!["epoch", "fidelity", "kl"]);
    assert_eq!(reader.records().count(), 2);

    let manifest = RunManifest::load(run.manifest_path.as_ref().unwrap()).unwrap();
    assert_eq!(manifest.config, config);
    assert_eq!(manifest.master_seed, 3);
    assert_eq!(manifest.seed_label.as_deref(), Some("small"));
    assert_eq!(manifest.model_kind, ModelKind::Complex);
    assert_eq!(manifest.num_visible, 2);
    assert_eq!(manifest.params_hash, run.model.as_wavefunction().params_hash());
    assert_eq!(manifest.model_file, Some(PathBuf::from("final.bin")));
    assert_eq!(manifest.checkpoints, vec![PathBuf::from("checkpoints/epoch_00010.bin")]);
    assert_eq!(manifest.final_metrics.keys().collect::<Vec<_>>(), vec!["fidelity", "kl"]);
    assert_eq!(manifest.provenance.seed, 3);
    assert_eq!(manifest.provenance.input_hash.len(), 64);
}

#[test]
fn early_stopping_ends_the_run() {
    let target = tfim_ground_state(2, 1.0);
    let data = measurement_record(&target, &bases(&["ZZ"]), 64, 21);
    let mut config = small_config(17, None);
    config.epochs = 50;
    config.evaluation.period = 1;
    config.early_stopping = Some(EarlyStoppingConfig {
        monitor: MetricKind::Kl,
        tolerance: 10.0,
        patience: 2,
    });
    let run = train(
        &config,
        &data,
        Some(target.as_slice()),
        ModelKind::Positive,
        UnitaryDict::standard(),
    )
    .unwrap();
    assert!(run.fit.stopped_early);
    assert_eq!(run.fit.last_epoch, 3);
    assert_eq!(run.history.len(), 3);
}

#[test]
fn fit_validates_its_inputs() {
    let target = tfim_ground_state(2, 1.0);
    let data = measurement_record(&target, &bases(&["ZZ"]), 8, 1);
    let mut model = qst_train::build_model(
        ModelKind::Positive,
        3,
        &TrainConfig::default(),
        UnitaryDict::standard(),
    )
    .unwrap();
    let mut optimizer = Sgd::new(0.1, 0.0);
    let err = fit(
        model.as_wavefunction_mut(),
        &data,
        &FitOptions::default(),
        &mut optimizer,
        &mut [],
    )
    .unwrap_err();
    assert_eq!(err.code(), "site-mismatch");

    let mut model = qst_train::build_model(
        ModelKind::Positive,
        2,
        &TrainConfig::default(),
        UnitaryDict::standard(),
    )
    .unwrap();
    let options = FitOptions {
        k: 0,
        ..FitOptions::default()
    };
    let err = fit(model.as_wavefunction_mut(), &data, &options, &mut optimizer, &mut [])
        .unwrap_err();
    assert_eq!(err.code(), "invalid-config");
}

#[test]
fn wide_chains_train_without_enumerating_the_space() {
    let samples = DMatrix::from_fn(8, 22, |row, col| ((row + col) % 2) as f64);
    let data = TrainingSet::new(samples, None).unwrap();
    for metrics in [vec![], vec![MetricKind::Nll]] {
        let dir = tempdir().unwrap();
        let config = TrainConfig {
            epochs: 2,
            pos_batch_size: 4,
            evaluation: EvaluationConfig {
                period: 1,
                metrics,
                verbose: false,
            },
            output: OutputConfig {
                run_directory: Some(dir.path().to_path_buf()),
                ..OutputConfig::default()
            },
            ..TrainConfig::default()
        };
        let run = train(
            &config,
            &data,
            None,
            ModelKind::Positive,
            UnitaryDict::standard(),
        )
        .unwrap();
        assert_eq!(run.fit.last_epoch, 2);
        assert_eq!(run.history.len(), 2);
        assert!(run.history.iter().all(|record| record.values.is_empty()));
        assert_eq!(run.model.as_wavefunction().num_visible(), 22);
        assert!(run.model_path.unwrap().exists());
    }
}
