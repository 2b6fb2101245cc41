//! Fit the two-stage estimator on synthetic photosynthesis parameters,
//! save it, and restore it from disk.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example fit_predict
//! ```

use pi_estimator::testing::synthetic_positive_targets;
use pi_estimator::{EstimatorConfig, Params, PiEstimator, Result, TargetTransform};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // =========================================================================
    // 1. Prepare Data
    // =========================================================================
    // Two strictly positive targets (PBmax, Ek) driven by six features.
    let (x, y, _) = synthetic_positive_targets(400, 6, 2, 42);
    let n_train = 320;
    let (x_train, x_test) = x.view().split_at(ndarray::Axis(0), n_train);
    let (y_train, y_test) = y.view().split_at(ndarray::Axis(0), n_train);

    // =========================================================================
    // 2. Configure and Fit
    // =========================================================================
    let model_dir = std::env::temp_dir().join("pi-estimator-demo");
    let config = EstimatorConfig::builder()
        .log_flags(TargetTransform::from_pairs([("PBmax", true), ("Ek", true)]))
        .residual_params(
            Params::new()
                .with("n_estimators", 100)
                .with("oob_score", true)
                .with("random_state", 0),
        )
        .save(true)
        .save_path(&model_dir)
        .build()?;

    let mut estimator = PiEstimator::new(config)?;
    estimator.fit(x_train, y_train)?;

    // =========================================================================
    // 3. Evaluate
    // =========================================================================
    println!("train R²: {:.4}", estimator.score(x_train, y_train)?);
    println!("test R²:  {:.4}", estimator.score(x_test, y_test)?);
    println!("residual OOB R²: {:.4}", estimator.oob_score()?);
    println!("residual importances: {:.3}", estimator.feature_importances()?);

    // =========================================================================
    // 4. Restore
    // =========================================================================
    let Some(artifact) = estimator.last_artifact() else {
        return Ok(());
    };
    let file_name = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let restored = PiEstimator::new(
        EstimatorConfig::builder()
            .restore(true)
            .restore_path(&model_dir)
            .model_name(file_name)
            .build()?,
    )?;
    let same = restored.predict(x_test)? == estimator.predict(x_test)?;
    println!("restored predictions identical: {same}");
    Ok(())
}
