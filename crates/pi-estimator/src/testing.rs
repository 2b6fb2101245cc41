//! Deterministic data generators shared by unit tests, integration tests
//! and benches.

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Uniform features in `[min, max]`, shape `[rows, cols]`.
pub fn random_features(rows: usize, cols: usize, seed: u64, min: f64, max: f64) -> Array2<f64> {
    assert!(max >= min);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let width = max - min;
    Array2::from_shape_simple_fn((rows, cols), || min + rng.random::<f64>() * width)
}

/// Features in `[-1, 1]` and targets that are mostly linear in them.
///
/// Each output is `bias + x·w + 0.5·sin(3·x0) + noise` with noise amplitude
/// 0.05, so both linear models and trees recover most of the variance.
pub fn synthetic_regression(
    rows: usize,
    cols: usize,
    outputs: usize,
    seed: u64,
) -> (Array2<f64>, Array2<f64>) {
    let x = random_features(rows, cols, seed, -1.0, 1.0);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(0x9E37_79B9));

    // Keep weights away from zero so every output depends on every feature.
    let weights = Array2::from_shape_simple_fn((cols, outputs), || {
        let w: f64 = rng.random_range(0.5..2.0);
        if rng.random::<bool>() { w } else { -w }
    });
    let bias: Vec<f64> = (0..outputs).map(|_| rng.random_range(-1.0..1.0)).collect();

    let mut y = x.dot(&weights);
    for (mut row, features) in y.rows_mut().into_iter().zip(x.rows()) {
        let wave = 0.5 * (3.0 * features[0]).sin();
        for (j, v) in row.iter_mut().enumerate() {
            *v += bias[j] + wave + rng.random_range(-0.05..0.05);
        }
    }
    (x, y)
}

/// Strictly positive targets whose log10 is linear in the features.
///
/// Returns `(x, y, log_y)` where `y = 10^log_y` and `log_y = 1 + x·w`.
pub fn synthetic_positive_targets(
    rows: usize,
    cols: usize,
    outputs: usize,
    seed: u64,
) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
    let x = random_features(rows, cols, seed, 0.0, 1.0);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed ^ 0xA5A5);
    let weights = Array2::from_shape_simple_fn((cols, outputs), || rng.random_range(-1.0..1.0));
    let log_y = x.dot(&weights) + 1.0;
    let y = log_y.mapv(|v| 10f64.powf(v));
    (x, y, log_y)
}
