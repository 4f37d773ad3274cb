//! Integration tests of training with the line-search optimizer.

use approx::assert_abs_diff_eq;
use cwboost::*;
use std::sync::Arc;

mod common;
use common::*;

fn line_search_engine(registry: FactoryRegistry, loggers: LoggerList) -> (Engine, InMemoryData) {
    let (data, response) = create_test_data!(regression, NUM_SAMPLES);
    let engine = Engine::new(
        create_config(0.1),
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(LineSearchOptimizer::with_inner(GreedyOptimizer::sequential())),
        loggers,
        registry,
    )
    .unwrap();
    (engine, data)
}

fn polynomial_registry(data: &InMemoryData) -> FactoryRegistry {
    let mut registry = FactoryRegistry::new();
    for key in ["x1", "x2", "x3"] {
        registry
            .register(PolynomialFactory::new(data, key, PolynomialConfig::with_degree(2)).unwrap())
            .unwrap();
    }
    registry
}

#[test]
fn test_least_squares_learners_take_unit_steps() {
    let (data, response) = create_test_data!(regression, NUM_SAMPLES);
    let (mut searched, _) = line_search_engine(polynomial_registry(&data), LoggerList::new());
    searched.train(40).unwrap();
    for step in searched.track().step_sizes() {
        assert_abs_diff_eq!(step, 1.0, epsilon = 1e-4);
    }

    let mut greedy = Engine::new(
        create_config(0.1),
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        LoggerList::new(),
        polynomial_registry(&data),
    )
    .unwrap();
    greedy.train(40).unwrap();
    assert_eq!(searched.selected_learner_ids(), greedy.selected_learner_ids());
    assert_vectors_close(&searched.prediction(false), &greedy.prediction(false), 1e-4);
}

#[test]
fn test_penalized_learners_take_at_least_unit_steps() {
    let (data, _) = create_test_data!(regression, NUM_SAMPLES);
    let (mut engine, data) = line_search_engine(create_registry(&data), LoggerList::new());
    engine.train(60).unwrap();

    let steps = engine.track().step_sizes();
    assert_eq!(steps.len(), 60);
    // A penalized smoother shrinks, so the optimal step is at least one.
    assert!(steps.iter().all(|&s| s > 1.0 - 1e-4 && s <= 10.0));

    let risk = engine.risk_vector();
    assert!(risk.windows(2).all(|w| w[1] <= w[0] + 1e-12));

    let fitted = engine.predict(&data.to_new_data(), false).unwrap();
    assert_vectors_close(&fitted, &engine.prediction(false), 1e-9);
}

#[test]
fn test_replay_and_continue_keep_step_sizes() {
    let (data, _) = create_test_data!(regression, NUM_SAMPLES);
    let (mut engine, _) = line_search_engine(create_registry(&data), LoggerList::new());
    engine.train(20).unwrap();
    let at_twenty = engine.prediction(false);

    engine.continue_training(10).unwrap();
    assert_eq!(engine.track().step_sizes().len(), 30);
    engine.set_to_iteration(20).unwrap();
    assert_vectors_close(&engine.prediction(false), &at_twenty, 1e-9);
}

#[test]
fn test_oob_risk_uses_step_sizes() {
    let (data, response) = create_test_data!(regression, 200);
    let split = HoldoutSplit::new(data.num_observations(), 0.25, 3).unwrap();
    let mut train = InMemoryData::new();
    let mut holdout = NewData::new();
    for key in ["x1", "x2", "x3"] {
        let raw = data.get(key).unwrap();
        train.insert(key, split.train_rows(&raw)).unwrap();
        holdout.insert(key, split.holdout_rows(&raw));
    }
    let (train_response, holdout_response) = split.split_response(&response);

    let mut loggers = LoggerList::new();
    loggers
        .register(
            OobRiskLogger::new(
                "oob",
                false,
                holdout.clone(),
                holdout_response.clone(),
                PlateauConfig::default(),
                None,
            )
            .unwrap(),
        )
        .unwrap();
    let mut engine = Engine::new(
        create_config(0.1),
        train_response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(LineSearchOptimizer::with_inner(GreedyOptimizer::sequential())),
        loggers,
        create_registry(&train),
    )
    .unwrap();
    engine.train(40).unwrap();

    let values = engine.logger_data().recorded("oob").unwrap();
    let scores = engine.predict(&holdout, false).unwrap();
    let expected = QuadraticLoss::new()
        .empirical_risk(&holdout_response.view(), &scores.view())
        .unwrap();
    assert_abs_diff_eq!(values[39].1, expected, epsilon = 1e-9);
}
