use std::cell::Cell;
use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use qst_core::hilbert_space;
use qst_rbm::{autoload, BinaryRbm, PositiveWaveFunction, RbmGradient, WaveFunction};
use qst_train::{
    Callback, CallbackFlow, EarlyStopping, EpochLog, LambdaCallback, MetricEvaluator, MetricKind,
    ModelSaver, Optimizer, Sgd,
};
use tempfile::tempdir;

fn model() -> PositiveWaveFunction {
    let rbm = BinaryRbm::from_parts(
        DMatrix::from_row_slice(1, 2, &[0.5, -0.5]),
        DVector::from_vec(vec![0.1, 0.2]),
        DVector::from_vec(vec![0.3]),
    )
    .unwrap();
    PositiveWaveFunction::from_rbm(rbm)
}

fn unit_gradient() -> RbmGradient {
    RbmGradient {
        weights: DMatrix::from_element(1, 2, 1.0),
        visible_bias: DVector::from_element(2, 1.0),
        hidden_bias: DVector::from_element(1, 1.0),
    }
}

#[test]
fn sgd_subtracts_scaled_gradients() {
    let mut model = model();
    let mut sgd = Sgd::new(0.1, 0.0);
    sgd.step(&mut model, &[unit_gradient()]).unwrap();
    let rbm = model.amplitude_rbm();
    assert!((rbm.weights()[(0, 0)] - 0.4).abs() < 1e-12);
    assert!((rbm.visible_bias()[1] - 0.1).abs() < 1e-12);
    assert!((rbm.hidden_bias()[0] - 0.2).abs() < 1e-12);

    sgd.set_learning_rate(0.5);
    assert_eq!(sgd.learning_rate(), 0.5);
}

#[test]
fn momentum_accumulates_velocity() {
    let mut model = model();
    let mut sgd = Sgd::new(0.1, 0.5);
    sgd.step(&mut model, &[unit_gradient()]).unwrap();
    sgd.step(&mut model, &[unit_gradient()]).unwrap();
    // 0.1 * 1 + 0.1 * (0.5 + 1)
    assert!((model.amplitude_rbm().weights()[(0, 0)] - (0.5 - 0.25)).abs() < 1e-12);
}

#[test]
fn invalid_gradients_are_rejected() {
    let mut model = model();
    let mut sgd = Sgd::new(0.1, 0.0);
    let err = sgd.step(&mut model, &[]).unwrap_err();
    assert_eq!(err.code(), "gradient-count-mismatch");

    let mut bad = unit_gradient();
    bad.visible_bias[0] = f64::NAN;
    let err = sgd.step(&mut model, &[bad]).unwrap_err();
    assert_eq!(err.code(), "non-finite-gradient");
}

#[test]
fn early_stopping_waits_for_patience() {
    let model = model();
    let values = [1.0, 0.5, 0.49999, 0.49999, 0.49999, 0.2];
    let mut rule = EarlyStopping::new("kl", 1e-3, 2);
    let mut stopped = None;
    for (epoch, value) in values.iter().enumerate() {
        let mut log = EpochLog::new();
        log.insert("kl".to_string(), *value);
        if rule.on_epoch_end(epoch + 1, &model, &mut log).unwrap() == CallbackFlow::Stop {
            stopped = Some(epoch + 1);
            break;
        }
    }
    assert_eq!(stopped, Some(4));
    assert_eq!(rule.stopped_at(), Some(4));

    let mut absent = EarlyStopping::new("nll", 1.0, 1);
    let mut log = EpochLog::new();
    for epoch in 1..5 {
        assert_eq!(
            absent.on_epoch_end(epoch, &model, &mut log).unwrap(),
            CallbackFlow::Continue
        );
    }
}

#[test]
fn evaluator_records_history_and_csv() {
    let model = model();
    let target = model.psi_space(&hilbert_space(2).unwrap());
    let mut evaluator = MetricEvaluator::new(2, vec![MetricKind::Fidelity, MetricKind::Kl], 2)
        .with_target(target);
    let mut log = EpochLog::new();
    for epoch in 1..=4 {
        evaluator.on_epoch_end(epoch, &model, &mut log).unwrap();
    }
    assert_eq!(evaluator.history().len(), 2);
    assert_eq!(evaluator.latest().unwrap().epoch, 4);
    assert_eq!(evaluator.values("fidelity").len(), 2);
    assert!((log["fidelity"] - 1.0).abs() < 1e-12);

    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    evaluator.write_csv(&path).unwrap();
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, vec!["epoch", "fidelity", "kl"]);
    let epochs: Vec<String> = reader
        .records()
        .map(|record| record.unwrap()[0].to_string())
        .collect();
    assert_eq!(epochs, vec!["2", "4"]);
}

#[test]
fn model_saver_keeps_newest_snapshots() {
    let model = model();
    let dir = tempdir().unwrap();
    let mut metadata = BTreeMap::new();
    metadata.insert("seed".to_string(), "9".to_string());
    let mut saver = ModelSaver::new(dir.path().join("ckpt"), 2, 2).with_metadata(metadata);
    let mut log = EpochLog::new();
    log.insert("kl".to_string(), 0.25);
    for epoch in 1..=7 {
        saver.on_epoch_end(epoch, &model, &mut log).unwrap();
    }
    let names: Vec<String> = saver
        .saved()
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["epoch_00004.json", "epoch_00006.json"]);
    assert!(!dir.path().join("ckpt").join("epoch_00002.json").exists());

    let (_, stored) = autoload(&saver.saved()[1]).unwrap();
    assert_eq!(stored.get("epoch").map(String::as_str), Some("6"));
    assert_eq!(stored.get("seed").map(String::as_str), Some("9"));
    assert_eq!(stored.get("kl").map(String::as_str), Some("0.25"));
}

#[test]
fn lambda_callbacks_forward_to_closures() {
    let model = model();
    let batches = Cell::new(0);
    let started = Cell::new(0);
    let mut callback = LambdaCallback::new()
        .with_epoch_start(|epoch, _| {
            started.set(epoch);
            Ok(())
        })
        .with_batch_end(|_, _, _| {
            batches.set(batches.get() + 1);
            Ok(())
        })
        .with_epoch_end(|epoch, _, log| {
            log.insert("epoch".to_string(), epoch as f64);
            Ok(if epoch >= 2 {
                CallbackFlow::Stop
            } else {
                CallbackFlow::Continue
            })
        });
    callback.on_epoch_start(1, &model).unwrap();
    callback.on_batch_end(1, 0, &model).unwrap();
    callback.on_batch_end(1, 1, &model).unwrap();
    let mut log = EpochLog::new();
    assert_eq!(
        callback.on_epoch_end(1, &model, &mut log).unwrap(),
        CallbackFlow::Continue
    );
    assert_eq!(
        callback.on_epoch_end(2, &model, &mut log).unwrap(),
        CallbackFlow::Stop
    );
    callback.on_train_end(&model).unwrap();
    drop(callback);
    assert_eq!(batches.get(), 2);
    assert_eq!(started.get(), 1);
    assert_eq!(log["epoch"], 2.0);
}

#[test]
fn evaluator_without_metrics_skips_enumeration() {
    let model = model();
    let mut evaluator = MetricEvaluator::new(1, Vec::new(), 30);
    let record = evaluator.evaluate(3, &model).unwrap();
    assert_eq!(record.epoch, 3);
    assert!(record.values.is_empty());
}
