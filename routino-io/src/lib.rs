//! Binary file framing and external-memory sort shared by the graph builder
//! and the router.
//!
//! This crate knows nothing about nodes, segments or ways: it only provides
//! the generic plumbing (`sort_fixed`/`sort_variable`, `write_framed`/
//! `read_framed`) that `routino-graph` and `routino-router` build their
//! on-disk formats out of.

pub mod error;
pub mod header;
pub mod sort;

pub use error::{SortError, SortResult};
pub use header::{read_framed, remove_if_exists, write_framed, FramedFile, FORMAT_VERSION};
pub use sort::{sort_fixed, sort_variable};
