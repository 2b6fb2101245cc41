//! Save / restore through the filesystem.

use std::fs;

use pi_estimator::persist::{ArtifactCodec, DeserializeError, ARTIFACT_EXTENSION};
use pi_estimator::testing::synthetic_positive_targets;
use pi_estimator::{EstimatorConfig, EstimatorError, EstimatorState, Params, PiEstimator};

fn saving_config(dir: &std::path::Path) -> EstimatorConfig {
    EstimatorConfig::builder()
        .residual_params(
            Params::new()
                .with("n_estimators", 15)
                .with("oob_score", true)
                .with("random_state", 3),
        )
        .save(true)
        .save_path(dir.join("Model"))
        .model_name("pbmax_ek")
        .build()
        .unwrap()
}

fn restoring_config(dir: &std::path::Path, file_name: &str) -> EstimatorConfig {
    EstimatorConfig::builder()
        .restore(true)
        .restore_path(dir.join("Model"))
        .model_name(file_name)
        .build()
        .unwrap()
}

#[test]
fn fit_saves_timestamped_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (x, y, _) = synthetic_positive_targets(30, 3, 2, 0);

    let mut est = PiEstimator::new(saving_config(dir.path())).unwrap();
    est.fit(x.view(), y.view()).unwrap();

    let path = est.last_artifact().unwrap().to_path_buf();
    assert!(path.starts_with(dir.path().join("Model")));
    assert!(path.is_file());

    let name = path.file_name().unwrap().to_str().unwrap();
    let stem = name
        .strip_prefix("pbmax_ek_")
        .and_then(|s| s.strip_suffix(&format!("_v1.0.{ARTIFACT_EXTENSION}")))
        .unwrap();
    // YYYYMMDD_HHMMSS
    assert_eq!(stem.len(), 15);
    assert_eq!(stem.as_bytes()[8], b'_');
    assert!(stem.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
}

#[test]
fn restore_reproduces_predictions_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let (x, y, _) = synthetic_positive_targets(40, 3, 2, 1);

    let mut original = PiEstimator::new(saving_config(dir.path())).unwrap();
    original.fit(x.view(), y.view()).unwrap();
    let path = original.last_artifact().unwrap().to_path_buf();
    let file_name = path.file_name().unwrap().to_str().unwrap();

    let restored = PiEstimator::new(restoring_config(dir.path(), file_name)).unwrap();
    assert!(restored.is_fitted());
    assert_eq!(restored.state(), original.state());
    assert_eq!(
        restored.predict(x.view()).unwrap(),
        original.predict(x.view()).unwrap()
    );
    assert_eq!(restored.oob_score().unwrap(), original.oob_score().unwrap());

    // The restored configuration is the saved one, not the restoring one.
    assert_eq!(restored.config().model_name, "pbmax_ek");
    assert!(restored.config().save);
}

#[test]
fn save_model_without_save_flag_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let config = EstimatorConfig::builder()
        .save_path(dir.path().join("never"))
        .build()
        .unwrap();
    let mut est = PiEstimator::new(config).unwrap();
    assert!(est.save_model().unwrap().is_none());
    assert!(!dir.path().join("never").exists());
}

#[test]
fn explicit_save_of_unfit_estimator_restores_unfit() {
    let dir = tempfile::tempdir().unwrap();
    let mut est = PiEstimator::new(saving_config(dir.path())).unwrap();
    let path = est.save_model().unwrap().unwrap();

    let file_name = path.file_name().unwrap().to_str().unwrap();
    let restored = PiEstimator::new(restoring_config(dir.path(), file_name)).unwrap();
    assert!(!restored.is_fitted());
}

#[test]
fn restore_with_base_name_fails_with_io_error() {
    // Saved files carry a timestamp suffix, so the bare model name is not found.
    let dir = tempfile::tempdir().unwrap();
    let (x, y, _) = synthetic_positive_targets(20, 2, 2, 2);
    let mut est = PiEstimator::new(saving_config(dir.path())).unwrap();
    est.fit(x.view(), y.view()).unwrap();

    assert!(matches!(
        PiEstimator::new(restoring_config(dir.path(), "pbmax_ek")),
        Err(EstimatorError::Io(_))
    ));
}

#[test]
fn corrupt_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (x, y, _) = synthetic_positive_targets(20, 2, 2, 3);
    let mut est = PiEstimator::new(saving_config(dir.path())).unwrap();
    est.fit(x.view(), y.view()).unwrap();

    let path = est.last_artifact().unwrap().to_path_buf();
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let file_name = path.file_name().unwrap().to_str().unwrap();
    assert!(matches!(
        PiEstimator::new(restoring_config(dir.path(), file_name)),
        Err(EstimatorError::Deserialize(DeserializeError::ChecksumMismatch { .. }))
    ));
}

#[test]
fn state_round_trips_through_codec() {
    let (x, y, _) = synthetic_positive_targets(25, 2, 2, 4);
    let config = EstimatorConfig::builder()
        .residual_params(Params::new().with("n_estimators", 5))
        .build()
        .unwrap();
    let mut est = PiEstimator::new(config).unwrap();
    est.fit(x.view(), y.view()).unwrap();

    let codec = ArtifactCodec::without_compression();
    let bytes = codec.serialize(2, 2, est.state()).unwrap();
    let (header, state): (_, EstimatorState) = codec.deserialize(&bytes).unwrap();
    assert_eq!((header.n_features, header.n_targets), (2, 2));

    let restored = PiEstimator::from_state(state);
    assert_eq!(
        restored.predict(x.view()).unwrap(),
        est.predict(x.view()).unwrap()
    );
}
