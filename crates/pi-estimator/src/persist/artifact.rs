//! Artifact files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::codec::ArtifactCodec;
use crate::error::Result;

/// File extension of saved artifacts.
pub const ARTIFACT_EXTENSION: &str = "pie";

/// Version tag embedded in artifact file names.
pub const ARTIFACT_VERSION_TAG: &str = "v1.0";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `<model_name>_<YYYYMMDD_HHMMSS>_v1.0.pie`
pub fn artifact_file_name(model_name: &str, timestamp: NaiveDateTime) -> String {
    format!(
        "{model_name}_{}_{ARTIFACT_VERSION_TAG}.{ARTIFACT_EXTENSION}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Encode `value` and write it to `dir/file_name`, creating `dir` as needed.
///
/// An existing file with the same name is overwritten.
pub fn write_artifact<T: Serialize>(
    codec: &ArtifactCodec,
    dir: &Path,
    file_name: &str,
    dims: (usize, usize),
    value: &T,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let (n_features, n_targets) = dims;
    let bytes = codec.serialize(clamp_u32(n_features), clamp_u32(n_targets), value)?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Read and decode the artifact at `path`.
pub fn read_artifact<T: DeserializeOwned>(codec: &ArtifactCodec, path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    let (header, value) = codec.deserialize(&bytes)?;
    log::debug!(
        "decoded artifact {} (format {}.{}, {} features, {} targets)",
        path.display(),
        header.version_major,
        header.version_minor,
        header.n_features,
        header.n_targets
    );
    Ok(value)
}

fn clamp_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EstimatorError;
    use chrono::NaiveDate;

    #[test]
    fn file_name_pattern() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        assert_eq!(
            artifact_file_name("PI_Estimator_PBmax_Ek", ts),
            "PI_Estimator_PBmax_Ek_20240309_070501_v1.0.pie"
        );
    }

    #[test]
    fn write_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let codec = ArtifactCodec::new();

        let path = write_artifact(&codec, &nested, "m.pie", (2, 1), &vec![1u32, 2, 3]).unwrap();
        assert_eq!(path, nested.join("m.pie"));

        // Existing directory is not an error.
        write_artifact(&codec, &nested, "n.pie", (2, 1), &vec![4u32]).unwrap();

        let back: Vec<u32> = read_artifact(&codec, &path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn missing_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let codec = ArtifactCodec::new();

        let missing = read_artifact::<Vec<u32>>(&codec, &dir.path().join("nope"));
        assert!(matches!(missing, Err(EstimatorError::Io(_))));

        let junk = dir.path().join("junk.pie");
        fs::write(&junk, vec![0u8; 64]).unwrap();
        assert!(matches!(
            read_artifact::<Vec<u32>>(&codec, &junk),
            Err(EstimatorError::Deserialize(_))
        ));
    }
}
