//! Graph builder pipeline and compact, memory-mappable routing database for
//! routino-rs (§3, §4.C-4.F).
//!
//! [`config`] holds the values threaded through the builder in place of the
//! original's scattered global flags. [`xstore`] is the wide, append-only
//! record storage used while a database is under construction; [`builder`]
//! runs the parse-to-compact pipeline (sort, dedupe, resolve, prune,
//! contract) over it. [`compact`] is the read-only, on-disk format produced
//! at the end of that pipeline. [`prune`] and [`supergraph`] are the
//! builder's pruning and two-level-contraction passes, kept as separate
//! modules since each is independently unit-testable. [`validate`] holds
//! invariant checks used by the test suite, not by normal builds.

pub mod builder;
pub mod compact;
pub mod config;
pub mod error;
pub mod prune;
pub mod supergraph;
pub mod validate;
pub mod xstore;

pub use builder::{Builder, BuiltGraph, BuiltNode};
pub use config::{Config, PruneIsolated, PruneShort, PruneStraight};
pub use error::{BuildError, BuildResult, BuildWarning, StoreError, StoreResult};
