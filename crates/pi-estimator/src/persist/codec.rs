//! Binary container for estimator artifacts.
//!
//! An artifact is a fixed 32-byte header followed by a postcard payload,
//! optionally zstd-compressed.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("PIES")
//! 4       1     Version major
//! 5       1     Version minor
//! 6       2     Reserved
//! 8       2     Flags (bitfield, little-endian)
//! 10      2     Reserved
//! 12      4     Stored payload size in bytes
//! 16      4     CRC32 of the stored payload
//! 20      4     Number of input features
//! 24      4     Number of targets
//! 28      4     Reserved
//! ```
//!
//! The checksum covers the bytes as written (after compression), so a damaged
//! file is rejected before zstd or postcard ever see it.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying an estimator artifact.
pub const MAGIC: &[u8; 4] = b"PIES";

pub const CURRENT_VERSION_MAJOR: u8 = 1;
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Default zstd level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

// ============================================================================
// Flags
// ============================================================================

/// Header feature bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(u16);

impl HeaderFlags {
    /// Payload is zstd-compressed.
    pub const COMPRESSED: u16 = 1 << 0;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }
}

// ============================================================================
// Header
// ============================================================================

/// Fixed-size artifact header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: HeaderFlags,
    /// Length of the stored (possibly compressed) payload.
    pub payload_size: u32,
    /// CRC32 of the stored payload.
    pub checksum: u32,
    pub n_features: u32,
    pub n_targets: u32,
}

impl ArtifactHeader {
    pub fn new(n_features: u32, n_targets: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            flags: HeaderFlags::empty(),
            payload_size: 0,
            checksum: 0,
            n_features,
            n_targets,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[8..10].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..24].copy_from_slice(&self.n_features.to_le_bytes());
        buf[24..28].copy_from_slice(&self.n_targets.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..4] != MAGIC {
            return Err(DeserializeError::NotAnArtifact);
        }

        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let read_u32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        Ok(Self {
            version_major,
            version_minor,
            flags: HeaderFlags::from_bits(u16::from_le_bytes([buf[8], buf[9]])),
            payload_size: read_u32(12),
            checksum: read_u32(16),
            n_features: read_u32(20),
            n_targets: read_u32(24),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors while encoding an artifact.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("compression error: {0}")]
    Compression(std::io::Error),

    #[error("payload of {0} bytes does not fit the artifact header")]
    TooLarge(usize),
}

/// Errors while decoding an artifact.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// Wrong magic bytes.
    #[error("not a pi-estimator artifact")]
    NotAnArtifact,

    #[error("artifact requires format {major}.{minor} or later")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("artifact truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),

    #[error("decompression error: {0}")]
    Decompression(std::io::Error),
}

/// CRC32 of `data`.
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ============================================================================
// ArtifactCodec
// ============================================================================

/// Reads and writes the artifact container.
#[derive(Debug, Clone)]
pub struct ArtifactCodec {
    pub compress: bool,
    /// zstd level, 1-22.
    pub compression_level: i32,
}

impl Default for ArtifactCodec {
    fn default() -> Self {
        Self {
            compress: true,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ArtifactCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_compression() -> Self {
        Self {
            compress: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level.clamp(1, 22);
        self
    }

    /// Write header and raw payload. Fills in size, checksum and flags.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        header: &mut ArtifactHeader,
        payload: &[u8],
    ) -> Result<(), SerializeError> {
        let stored = if self.compress {
            header.flags.set(HeaderFlags::COMPRESSED);
            zstd::encode_all(payload, self.compression_level).map_err(SerializeError::Compression)?
        } else {
            payload.to_vec()
        };

        header.payload_size =
            u32::try_from(stored.len()).map_err(|_| SerializeError::TooLarge(stored.len()))?;
        header.checksum = compute_checksum(&stored);

        writer.write_all(&header.to_bytes())?;
        writer.write_all(&stored)?;
        Ok(())
    }

    /// Read header and decompressed payload.
    pub fn read_from<R: Read>(
        &self,
        reader: &mut R,
    ) -> Result<(ArtifactHeader, Vec<u8>), DeserializeError> {
        let mut head = Vec::with_capacity(HEADER_SIZE);
        reader.by_ref().take(HEADER_SIZE as u64).read_to_end(&mut head)?;
        let header_buf: [u8; HEADER_SIZE] =
            head.as_slice()
                .try_into()
                .map_err(|_| DeserializeError::Truncated {
                    expected: HEADER_SIZE,
                    actual: head.len(),
                })?;
        let header = ArtifactHeader::from_bytes(&header_buf)?;

        let expected = header.payload_size as usize;
        let mut stored = Vec::with_capacity(expected);
        reader.take(expected as u64).read_to_end(&mut stored)?;
        if stored.len() < expected {
            return Err(DeserializeError::Truncated {
                expected,
                actual: stored.len(),
            });
        }

        let actual = compute_checksum(&stored);
        if actual != header.checksum {
            return Err(DeserializeError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let payload = if header.flags.contains(HeaderFlags::COMPRESSED) {
            zstd::decode_all(stored.as_slice()).map_err(DeserializeError::Decompression)?
        } else {
            stored
        };
        Ok((header, payload))
    }

    /// Encode `value` into a complete artifact.
    pub fn serialize<T: Serialize>(
        &self,
        n_features: u32,
        n_targets: u32,
        value: &T,
    ) -> Result<Vec<u8>, SerializeError> {
        let payload = postcard::to_allocvec(value)?;
        let mut header = ArtifactHeader::new(n_features, n_targets);
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        self.write_to(&mut out, &mut header, &payload)?;
        Ok(out)
    }

    /// Decode a complete artifact.
    pub fn deserialize<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> Result<(ArtifactHeader, T), DeserializeError> {
        let mut reader = bytes;
        let (header, payload) = self.read_from(&mut reader)?;
        let value = postcard::from_bytes(&payload)?;
        Ok((header, value))
    }
}
