//! Multiworld archive container
//!
//! Byte 0 is a format version tag; the rest is a zlib stream whose inflated
//! contents are the serialized session data.

use crate::error::PipelineError;
use flate2::read::ZlibDecoder;
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Read};
use std::ops::RangeInclusive;
use std::path::Path;

/// Version tags produced by known archive writers
pub const KNOWN_VERSIONS: RangeInclusive<u8> = 1..=3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// Bytes after the version tag, inflated
    Inflated,
    /// Inflation failed; the whole file is taken as an uncompressed stream
    Raw,
}

#[derive(Debug)]
pub struct Archive {
    pub version: u8,
    pub payload: Vec<u8>,
    pub source: PayloadSource,
    /// Why inflation failed, when the payload is the raw file
    pub inflate_error: Option<io::Error>,
}

impl Archive {
    /// Read and unpack an archive file
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let data = read_input(path)?;
        info!("File size: {} bytes", data.len());
        Ok(Archive::from_bytes(data))
    }

    /// Unpack archive bytes, falling back to the raw bytes if they do not inflate
    ///
    /// `data` must not be empty.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let version = data.first().copied().unwrap_or(0);
        if !KNOWN_VERSIONS.contains(&version) {
            warn!(
                "Unrecognized archive version tag {}; attempting to decode anyway",
                version
            );
        } else {
            debug!("Archive version tag {}", version);
        }

        match inflate(data.get(1..).unwrap_or_default()) {
            Ok(payload) => {
                info!(
                    "Decompressed {} bytes into {} bytes",
                    data.len().saturating_sub(1),
                    payload.len()
                );
                Archive {
                    version,
                    payload,
                    source: PayloadSource::Inflated,
                    inflate_error: None,
                }
            }
            Err(e) => {
                warn!(
                    "Decompression failed ({}); falling back to reading the file as an uncompressed stream",
                    e
                );
                Archive {
                    version,
                    payload: data,
                    source: PayloadSource::Raw,
                    inflate_error: Some(e),
                }
            }
        }
    }
}

/// Read the whole input, mapping the not-found and empty cases to their own errors
pub fn read_input(path: &Path) -> Result<Vec<u8>, PipelineError> {
    let data = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
        _ => PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    if data.is_empty() {
        return Err(PipelineError::EmptyInput(path.to_path_buf()));
    }
    Ok(data)
}

/// Inflate a complete zlib stream
pub fn inflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut inflated = Vec::new();
    decoder.read_to_end(&mut inflated)?;
    Ok(inflated)
}
