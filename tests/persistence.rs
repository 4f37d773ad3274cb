//! Snapshot and configuration persistence tests.

use cwboost::*;
use std::sync::Arc;
use tempfile::tempdir;

mod common;
use common::*;

fn loggers() -> LoggerList {
    let mut loggers = LoggerList::new();
    loggers
        .register(IterationLogger::new("iterations", true, 20).unwrap())
        .unwrap();
    loggers
        .register(InbagRiskLogger::new("risk", false, PlateauConfig::default(), None).unwrap())
        .unwrap();
    loggers
}

fn restore_from(snapshot: EngineSnapshot) -> Result<Engine> {
    let (data, response) = create_test_data!(regression, NUM_SAMPLES);
    Engine::restore(
        snapshot,
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        loggers(),
        create_registry(&data),
    )
}

#[test]
fn test_bincode_snapshot_round_trip() {
    let mut engine = create_regression_engine(0.1, loggers());
    engine.train(50).unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.num_entries(), 20);

    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.bin");
    snapshot.save(&path).unwrap();
    let loaded = EngineSnapshot::load(&path).unwrap();
    assert_eq!(loaded, snapshot);

    let restored = restore_from(loaded).unwrap();
    assert_eq!(restored.state(), EngineState::StoppedByLogger);
    assert_eq!(restored.track(), engine.track());
    assert_eq!(restored.risk_vector(), engine.risk_vector());
    assert_eq!(restored.logger_data(), engine.logger_data());
    assert_vectors_close(&restored.prediction(false), &engine.prediction(false), 1e-9);
}

#[test]
fn test_json_snapshot_round_trip() {
    let mut engine = create_regression_engine(0.1, loggers());
    engine.train(50).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.json");
    engine.save_snapshot(&path).unwrap();
    let loaded = EngineSnapshot::load(&path).unwrap();
    assert_eq!(loaded.iteration, 20);
    assert_eq!(loaded.loss_name, "quadratic");

    let restored = restore_from(loaded).unwrap();
    assert_eq!(restored.selected_learner_ids(), engine.selected_learner_ids());
    assert_vectors_close(&restored.prediction(false), &engine.prediction(false), 1e-9);
}

#[test]
fn test_restored_engine_continues_like_original() {
    let mut original = create_regression_engine(0.1, loggers());
    original.train(50).unwrap();
    let mut restored = restore_from(original.snapshot()).unwrap();

    original.continue_training(15).unwrap();
    restored.continue_training(15).unwrap();

    assert_eq!(restored.trained_iterations(), 35);
    assert_eq!(restored.selected_learner_ids(), original.selected_learner_ids());
    assert_vectors_close(&restored.prediction(false), &original.prediction(false), 1e-9);
    assert_eq!(
        restored.logger_data().column("iterations"),
        original.logger_data().column("iterations")
    );
}

#[test]
fn test_restore_keeps_active_iteration() {
    let mut engine = create_regression_engine(0.1, loggers());
    engine.train(50).unwrap();
    engine.set_to_iteration(8).unwrap();

    let restored = restore_from(engine.snapshot()).unwrap();
    assert_eq!(restored.iteration(), 8);
    assert_eq!(restored.trained_iterations(), 20);
    assert_vectors_close(&restored.prediction(false), &engine.prediction(false), 1e-9);
}

#[test]
fn test_restore_rejects_other_loss() {
    let mut engine = create_regression_engine(0.1, loggers());
    engine.train(5).unwrap();
    let (data, response) = create_test_data!(regression, NUM_SAMPLES);
    let result = Engine::restore(
        engine.snapshot(),
        response.view(),
        Arc::new(AbsoluteLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        loggers(),
        create_registry(&data),
    );
    assert!(matches!(result, Err(CwBoostError::Serialization { .. })));
}

#[test]
fn test_restore_rejects_unknown_learner() {
    let mut engine = create_regression_engine(0.1, loggers());
    engine.train(10).unwrap();
    let mut snapshot = engine.snapshot();
    snapshot.entries[0].learner_id = "unknown_learner".to_string();

    let result = restore_from(snapshot);
    assert!(matches!(result, Err(CwBoostError::UnknownIdentifier { .. })));
}

#[test]
fn test_corrupt_snapshot_is_rejected() {
    let mut engine = create_regression_engine(0.1, loggers());
    engine.train(10).unwrap();
    let mut snapshot = engine.snapshot();
    snapshot.risk.pop();
    assert!(snapshot.check().is_err());

    let dir = tempdir().unwrap();
    assert!(engine.snapshot().save(dir.path().join("engine.txt")).is_err());
}

#[test]
fn test_config_file_round_trip() {
    let config = BoostingConfigBuilder::new()
        .learning_rate(0.05)
        .max_iterations(750)
        .use_offset(false)
        .stop_if_all_stoppers(true)
        .trace(25)
        .build()
        .unwrap();

    let dir = tempdir().unwrap();
    for name in ["config.json", "config.toml"] {
        let path = dir.path().join(name);
        config.save_to_file(&path).unwrap();
        let loaded = BoostingConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    assert!(config.save_to_file(dir.path().join("config.yaml")).is_err());

    let invalid = dir.path().join("invalid.json");
    std::fs::write(&invalid, r#"{"learning_rate": 3.0}"#).unwrap();
    assert!(BoostingConfig::load_from_file(&invalid).is_err());
}
