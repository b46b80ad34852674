use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while merge-sorting records to or from disk. Disk-full and
/// other I/O failures during a sort are always fatal (§7 kind 5).
#[derive(Debug, Error)]
pub enum SortError {
    #[error("I/O error writing run file {path}: {source}")]
    WriteRun {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error reading run file {path}: {source}")]
    ReadRun {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create temporary directory for sort runs: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("record size {0} exceeds the configured RAM budget of {1} bytes")]
    RecordTooLarge(usize, usize),
}

pub type SortResult<T> = Result<T, SortError>;
