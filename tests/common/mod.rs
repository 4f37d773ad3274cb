//! Common test utilities for cwboost integration tests.

#![allow(dead_code)]

use cwboost::*;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use std::sync::Arc;

/// Sample size used by most integration tests.
pub const NUM_SAMPLES: usize = 120;

/// Uniform features `x1`, `x2`, `x3` on `[-3, 3]`.
pub fn create_features(num_samples: usize, seed: u64) -> InMemoryData {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = InMemoryData::new();
    for key in ["x1", "x2", "x3"] {
        let column: Array1<f64> = (0..num_samples).map(|_| rng.gen_range(-3.0..3.0)).collect();
        data.insert(key, column.insert_axis(ndarray::Axis(1))).unwrap();
    }
    data
}

/// Additive response `sin(x1) + 0.5 x2 + noise`; `x3` is pure noise.
pub fn create_regression_response(data: &InMemoryData, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let x1 = data.get("x1").unwrap();
    let x2 = data.get("x2").unwrap();
    (0..data.num_observations())
        .map(|i| x1[[i, 0]].sin() + 0.5 * x2[[i, 0]] + rng.gen_range(-0.1..0.1))
        .collect()
}

/// Labels in `{0, 1}` from a noisy linear boundary on `x1` and `x2`.
pub fn create_binary_response(data: &InMemoryData, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let x1 = data.get("x1").unwrap();
    let x2 = data.get("x2").unwrap();
    (0..data.num_observations())
        .map(|i| {
            let score = 1.5 * x1[[i, 0]] - x2[[i, 0]] + rng.gen_range(-0.5..0.5);
            if score > 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Linear P-spline and polynomial factories for every feature.
pub fn create_registry(data: &InMemoryData) -> FactoryRegistry {
    let mut registry = FactoryRegistry::new();
    for key in ["x1", "x2", "x3"] {
        let spline = PSplineConfig {
            n_knots: 10,
            ..PSplineConfig::default()
        };
        registry
            .register(PSplineFactory::new(data, key, spline).unwrap())
            .unwrap();
        registry
            .register(PolynomialFactory::new(data, key, PolynomialConfig::default()).unwrap())
            .unwrap();
    }
    registry
}

/// Validated configuration with the given learning rate.
pub fn create_config(learning_rate: f64) -> BoostingConfig {
    BoostingConfigBuilder::new()
        .learning_rate(learning_rate)
        .parallel_fit(false)
        .build()
        .unwrap()
}

/// Quadratic-loss engine on the standard regression problem.
pub fn create_regression_engine(learning_rate: f64, loggers: LoggerList) -> Engine {
    let data = create_features(NUM_SAMPLES, 42);
    let response = create_regression_response(&data, 7);
    Engine::new(
        create_config(learning_rate),
        response.view(),
        Arc::new(QuadraticLoss::new()),
        Box::new(GreedyOptimizer::sequential()),
        loggers,
        create_registry(&data),
    )
    .unwrap()
}

/// Raw matrix with one column.
pub fn column(values: &[f64]) -> Array2<f64> {
    Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap()
}

/// Assert two vectors agree element-wise within `eps`.
pub fn assert_vectors_close(a: &Array1<f64>, b: &Array1<f64>, eps: f64) {
    assert_eq!(a.len(), b.len(), "length mismatch");
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!(
            (x - y).abs() <= eps,
            "element {i} differs: {x} vs {y} (eps {eps})"
        );
    }
}

/// Build standard test data: `create_test_data!(regression, n)` or `create_test_data!(binary, n)`.
#[macro_export]
macro_rules! create_test_data {
    (regression, $n:expr) => {{
        let data = $crate::common::create_features($n, 42);
        let response = $crate::common::create_regression_response(&data, 7);
        (data, response)
    }};
    (binary, $n:expr) => {{
        let data = $crate::common::create_features($n, 123);
        let response = $crate::common::create_binary_response(&data, 11);
        (data, response)
    }};
}
