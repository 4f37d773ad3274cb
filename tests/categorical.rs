//! Integration tests of the categorical base learners.

use approx::assert_abs_diff_eq;
use cwboost::*;
use ndarray::Array1;
use rand::prelude::*;
use std::sync::Arc;

mod common;
use common::*;

const EFFECTS: [(&str, f64); 3] = [("a", 2.0), ("b", -1.0), ("c", 0.5)];

/// Numeric `x1..x3` plus a group `g` shifting the regression response.
fn grouped_problem(n: usize) -> (InMemoryData, Vector) {
    let (mut data, mut response) = create_test_data!(regression, n);
    let mut rng = StdRng::seed_from_u64(5);
    let mut labels = Vec::with_capacity(n);
    for y in response.iter_mut() {
        let (label, effect) = EFFECTS[rng.gen_range(0..EFFECTS.len())];
        *y += effect;
        labels.push(label.to_string());
    }
    data.insert_categorical("g", labels).unwrap();
    (data, response)
}

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_single_ridge_step_recovers_class_means() {
    let data = InMemoryData::new()
        .with_categorical("g", ["a", "b", "a", "c", "b", "a"])
        .unwrap();
    let response = Array1::from(vec![1.0, 4.0, 3.0, -2.0, 6.0, 2.0]);
    let mut registry = FactoryRegistry::new();
    registry
        .register(CategoricalRidgeFactory::new(&data, "g", CategoricalRidgeConfig::default()).unwrap())
        .unwrap();
    let mut engine = Engine::new(
        create_config(1.0),
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        LoggerList::new(),
        registry,
    )
    .unwrap();
    engine.train(1).unwrap();

    let fitted = engine.prediction(false);
    let expected = Array1::from(vec![2.0, 5.0, 2.0, -2.0, 5.0, 2.0]);
    assert_vectors_close(&fitted, &expected, 1e-10);

    let mut new_data = NewData::new();
    new_data.insert_categorical("g", labels(&["c", "unseen", "b"]));
    let scores = engine.predict(&new_data, false).unwrap();
    assert_abs_diff_eq!(scores[0], -2.0, epsilon = 1e-10);
    assert_abs_diff_eq!(scores[1], engine.offset(), epsilon = 1e-12);
    assert_abs_diff_eq!(scores[2], 5.0, epsilon = 1e-10);
}

#[test]
fn test_grouped_effects_are_selected_and_recovered() {
    let (data, response) = grouped_problem(300);
    let mut registry = create_registry(&data);
    registry
        .register(CategoricalRidgeFactory::new(&data, "g", CategoricalRidgeConfig::with_df(2.0)).unwrap())
        .unwrap();
    let mut engine = Engine::new(
        create_config(0.1),
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        LoggerList::new(),
        registry,
    )
    .unwrap();
    engine.train(500).unwrap();
    assert!(engine
        .selected_learner_ids()
        .iter()
        .any(|id| id == "g_categorical_ridge"));

    // Same numeric rows for every class, so score differences are group effects.
    let mut new_data = NewData::new();
    for key in ["x1", "x2", "x3"] {
        new_data.insert(key, column(&[0.0, 0.0, 0.0]));
    }
    new_data.insert_categorical("g", labels(&["a", "b", "c"]));
    let scores = engine.predict(&new_data, false).unwrap();
    assert!(((scores[0] - scores[1]) - 3.0).abs() < 0.3, "{scores}");
    assert!(((scores[0] - scores[2]) - 1.5).abs() < 0.3, "{scores}");
}

#[test]
fn test_binary_learners_per_class() {
    let (data, response) = grouped_problem(200);
    let mut registry = FactoryRegistry::new();
    for factory in CategoricalBinaryFactory::for_all_classes(&data, "g").unwrap() {
        registry.register(factory).unwrap();
    }
    assert_eq!(registry.len(), 3);
    let mut engine = Engine::new(
        create_config(0.2),
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        LoggerList::new(),
        registry,
    )
    .unwrap();
    engine.train(50).unwrap();

    let parameter = engine.parameter().unwrap();
    assert!(parameter
        .keys()
        .all(|id| id.starts_with("g_") && id.ends_with("_categorical_binary")));
    assert!(parameter.values().all(|p| p.len() == 1));

    let fitted = engine.predict(&data.to_new_data(), false).unwrap();
    assert_vectors_close(&fitted, &engine.prediction(false), 1e-9);
}

#[test]
fn test_missing_labels_fail_prediction() {
    let (data, response) = grouped_problem(60);
    let mut registry = FactoryRegistry::new();
    registry
        .register(CategoricalRidgeFactory::new(&data, "g", CategoricalRidgeConfig::default()).unwrap())
        .unwrap();
    let mut engine = Engine::new(
        create_config(0.5),
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        LoggerList::new(),
        registry,
    )
    .unwrap();
    engine.train(3).unwrap();

    let mut numeric_only = NewData::new();
    numeric_only.insert("g", column(&[1.0]));
    assert!(matches!(
        engine.predict(&numeric_only, false),
        Err(CwBoostError::UnknownIdentifier { .. })
    ));
}
