//! Persistence of fitted estimators.
//!
//! - [`codec`]: the binary container (header, checksum, compression)
//! - [`artifact`]: file naming and disk I/O

pub mod artifact;
pub mod codec;

pub use artifact::{
    artifact_file_name, read_artifact, write_artifact, ARTIFACT_EXTENSION, ARTIFACT_VERSION_TAG,
};
pub use codec::{ArtifactCodec, ArtifactHeader, DeserializeError, HeaderFlags, SerializeError};
