use std::path::PathBuf;

use thiserror::Error;

/// Kind-1 errors (§7): malformed input that is logged and the offending
/// record dropped. The builder accumulates these in an error log rather than
/// returning early; `main` reports the total count on exit but does not
/// treat a nonzero count as failure.
#[derive(Debug, Error, Clone)]
pub enum BuildWarning {
    #[error("node {id}: duplicate OSM id, keeping first occurrence")]
    DuplicateNode { id: i64 },

    #[error("segment {node1}-{node2}: duplicate of an existing segment, discarded")]
    DuplicateSegment { node1: i64, node2: i64 },

    #[error("segment {node1}-{node2}: self-loop, discarded")]
    SelfLoopSegment { node1: i64, node2: i64 },

    #[error("segment references missing node {missing_id}, discarded")]
    DanglingSegmentNode { missing_id: i64 },

    #[error("way {way_id} references missing node {missing_id}, discarded")]
    DanglingWayNode { way_id: i64, missing_id: i64 },

    #[error("relation {id} lists itself as a member, dropped")]
    SelfReferentialRelation { id: i64 },

    #[error("turn relation references missing member, discarded")]
    DanglingTurnRelation,

    #[error("unrecognised tag value {value:?} for key {key:?}, ignored")]
    UnknownTagValue { key: String, value: String },
}

/// Kind-2/3/5 errors (§7): fatal. Database inconsistency, resource
/// exhaustion, or a build-time I/O failure.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    File(#[from] routino_common::FileError),

    #[error(transparent)]
    Sort(#[from] routino_io::SortError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("super-graph construction did not converge after {0} iterations")]
    SuperGraphDidNotConverge(u32),

    #[error("database inconsistency: {0}")]
    Inconsistent(String),
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while opening or reading a compact, already-built database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    File(#[from] routino_common::FileError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
