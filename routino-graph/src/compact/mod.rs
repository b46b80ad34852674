//! Compact, read-only query-time stores: `Nodes`, `Segments`, `Ways`,
//! `Relations`. Each is a thin wrapper over a memory-mapped file (fat mode)
//! or a small positional cache over a regular file handle (slim mode), as
//! described in §4.F.

pub mod nodes;
pub mod relations;
pub mod segments;
pub mod ways;

pub use nodes::{Node, NodeFlags, NodesFile, NodesHeader};
pub use relations::{RelationsFile, RelationsHeader};
pub use segments::{Segment, SegmentsFile, SegmentsHeader};
pub use ways::{Way, WaysFile, WaysHeader};
