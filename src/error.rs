//! Error types for container, delta and registry operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors raised while writing, reading or applying a container
#[derive(Error, Debug)]
pub enum ContainerError {
    /// `write` was called without an explicit destination and no bound path
    #[error("Cannot write {kind} due to no path provided")]
    NoDestination {
        /// Name of the container type
        kind: &'static str,
    },

    /// `read` was called without an explicit source and no bound path
    #[error("Cannot read {kind} due to no path provided")]
    NoSource {
        /// Name of the container type
        kind: &'static str,
    },

    /// The file demands a newer reader than this one
    #[error("File (version: {file_version}) too new for this handler (version: {reader_version})")]
    VersionTooNew {
        /// `compatible_version` found in the file's manifest
        file_version: u32,
        /// Container version this reader supports
        reader_version: u32,
    },

    /// Manifest or entry parsing failed
    #[error("{message}")]
    InvalidData {
        /// Inner message followed by the incompatibility hint
        message: String,
        /// The original failure
        #[source]
        source: Box<ContainerError>,
    },

    /// The manifest could not be encoded as JSON
    #[error("Manifest {manifest} did not convert to json.")]
    ManifestSerialization {
        /// Debug rendering of the offending manifest
        manifest: String,
        /// Encoder error
        #[source]
        source: serde_json::Error,
    },

    /// Manifest JSON could not be decoded
    #[error("Malformed manifest: {0}")]
    ManifestFormat(#[from] serde_json::Error),

    /// A required manifest key is missing
    #[error("Manifest is missing required field `{0}`")]
    MissingField(&'static str),

    /// Archive level failure
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// File system failure on a known path
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Stream level I/O failure
    #[error("I/O error: {0}")]
    Stream(#[from] io::Error),

    /// The delta codec rejected its input
    #[error(transparent)]
    Delta(#[from] DeltaError),

    /// A handler failed to produce its base asset
    #[error("Failed to load base data for {game}: {source}")]
    SourceData {
        /// Game identifier of the handler
        game: &'static str,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// No registered handler claims the file
    #[error("No handler registered for {}", path.display())]
    NoHandler {
        /// The unmatched file
        path: PathBuf,
    },

    /// A delta patch was written without a file to diff against
    #[error("No patched file set for {kind}")]
    NoPatchedFile {
        /// Name of the container type
        kind: &'static str,
    },
}

impl ContainerError {
    /// Wrap a parsing failure with the incompatibility hint.
    pub fn invalid_data(inner: ContainerError) -> Self {
        let text = inner.to_string();
        let message = if text.is_empty() {
            INCOMPATIBLE_HINT.to_string()
        } else {
            format!("{text} - {INCOMPATIBLE_HINT}")
        };
        ContainerError::InvalidData {
            message,
            source: Box::new(inner),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ContainerError::Io {
            path: path.into(),
            source,
        }
    }
}

const INCOMPATIBLE_HINT: &str = "This might be the incorrect handler version for this file";

/// Errors raised by the delta codec
#[derive(Error, Debug)]
pub enum DeltaError {
    /// The delta does not start with the expected magic bytes
    #[error("Invalid delta: missing magic header")]
    BadMagic,

    /// The delta payload could not be decoded
    #[error("Invalid delta payload: {0}")]
    Decode(String),

    /// The delta could not be encoded
    #[error("Failed to encode delta: {0}")]
    Encode(String),

    /// The delta was produced against different base data
    #[error("Base data mismatch: delta expects {expected}, got {actual}")]
    BaseMismatch {
        /// Hex digest recorded in the delta
        expected: String,
        /// Hex digest of the supplied base
        actual: String,
    },

    /// A copy instruction points outside the base data
    #[error("Copy chunk {offset}+{length} exceeds base length {base_len}")]
    OutOfBounds {
        /// Copy offset
        offset: u64,
        /// Copy length
        length: u64,
        /// Length of the base data
        base_len: usize,
    },

    /// Reconstructed output does not hash to the recorded target digest
    #[error("Hash mismatch after applying delta")]
    TargetMismatch,
}

/// Errors raised when declaring a handler
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    /// The handler declares no patch file ending
    #[error("Need an expected file ending for {handler}")]
    MissingFileEnding {
        /// Name of the handler type
        handler: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_data_prefixes_inner_message() {
        let err = ContainerError::invalid_data(ContainerError::MissingField("player"));
        let text = err.to_string();
        assert!(text.starts_with("Manifest is missing required field `player` - "));
        assert!(text.ends_with("incorrect handler version for this file"));
    }

    #[test]
    fn test_version_too_new_mentions_both_versions() {
        let err = ContainerError::VersionTooNew {
            file_version: 999,
            reader_version: 6,
        };
        let text = err.to_string();
        assert!(text.contains("999"));
        assert!(text.contains('6'));
    }
}
