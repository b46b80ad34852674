//! Error types shared by more than one crate in the workspace.
//!
//! Crate-specific error enums (`BuildError`, `StoreError`, `ProfileError`,
//! `RouteError`) live next to the code that raises them; this module only
//! holds the handful of variants that genuinely cross crate boundaries.

use thiserror::Error;

/// Errors that can occur while reading or writing a compact database file,
/// shared between `routino-io` (which defines the header/CRC framing) and
/// `routino-graph`/`routino-router` (which read the resulting files).
#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: bad magic number (expected {expected:#010x}, found {found:#010x})")]
    BadMagic {
        path: std::path::PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("{path}: unsupported format version {found} (expected {expected})")]
    UnsupportedVersion {
        path: std::path::PathBuf,
        expected: u16,
        found: u16,
    },

    #[error("{path}: CRC mismatch (expected {expected:#010x}, computed {computed:#010x})")]
    CrcMismatch {
        path: std::path::PathBuf,
        expected: u32,
        computed: u32,
    },

    #[error("{path}: truncated file, expected at least {expected} bytes, found {found}")]
    Truncated {
        path: std::path::PathBuf,
        expected: usize,
        found: usize,
    },
}

pub type FileResult<T> = Result<T, FileError>;
