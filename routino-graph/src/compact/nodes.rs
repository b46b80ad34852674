//! The compact `Nodes` store: a bin-offset index followed by the node array,
//! as laid out in §6.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use routino_common::units::{self, IndexT, LlBinT, LlOffT};

use crate::error::StoreResult;
use routino_io::header::{read_framed, write_framed, FORMAT_VERSION, MAGIC_NODES};

pub mod node_flags {
    pub const SUPER: u16 = routino_common::units::node_flags::SUPER;
    pub const UTURN: u16 = routino_common::units::node_flags::UTURN;
    pub const MINI_ROUNDABOUT: u16 = routino_common::units::node_flags::MINI_ROUNDABOUT;
    pub const TURN_RESTRICTED: u16 = routino_common::units::node_flags::TURN_RESTRICTED;
    pub const TURN_RESTRICTED2: u16 = routino_common::units::node_flags::TURN_RESTRICTED2;
}

pub type NodeFlags = u16;

/// A node record exactly as it appears on disk (§3): fixed-size, no
/// pointers, native-endian fields only.
///
/// `first_segment`/`first_segment2` are the heads of the two linked lists
/// described in `crate::xstore::nodes`: segments with `node1 == this node`
/// and segments with `node2 == this node`, respectively.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Node {
    pub first_segment: IndexT,
    pub lat_offset: LlOffT,
    pub lon_offset: LlOffT,
    pub allow: u16,
    pub flags: NodeFlags,
    pub first_segment2: IndexT,
}

impl Node {
    pub fn new(first_segment: IndexT, lat_offset: LlOffT, lon_offset: LlOffT, allow: u16, flags: NodeFlags, first_segment2: IndexT) -> Self {
        Node {
            first_segment,
            lat_offset,
            lon_offset,
            allow,
            flags,
            first_segment2,
        }
    }

    pub fn is_super(&self) -> bool {
        self.flags & node_flags::SUPER != 0
    }
    pub fn uturn_allowed(&self) -> bool {
        self.flags & node_flags::UTURN != 0
    }
    pub fn is_mini_roundabout(&self) -> bool {
        self.flags & node_flags::MINI_ROUNDABOUT != 0
    }
    pub fn is_turn_restricted_via(&self) -> bool {
        self.flags & node_flags::TURN_RESTRICTED != 0
    }
    pub fn is_turn_restricted_neighbour(&self) -> bool {
        self.flags & node_flags::TURN_RESTRICTED2 != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct NodesHeader {
    pub n_nodes: u32,
    pub n_super: u32,
    pub lat_bins: i32,
    pub lon_bins: i32,
    pub lat_zero: LlBinT,
    pub lon_zero: LlBinT,
    _pad: u32,
}

impl NodesHeader {
    pub fn new(n_nodes: u32, n_super: u32, lat_bins: i32, lon_bins: i32, lat_zero: LlBinT, lon_zero: LlBinT) -> Self {
        NodesHeader { n_nodes, n_super, lat_bins, lon_bins, lat_zero, lon_zero, _pad: 0 }
    }
}

pub struct NodesFile {
    pub header: NodesHeader,
    /// Length `lat_bins * lon_bins + 1`.
    pub offsets: Vec<IndexT>,
    pub nodes: Vec<Node>,
}

impl NodesFile {
    pub fn write(&self, path: &Path) -> StoreResult<()> {
        let header_bytes = bytemuck::bytes_of(&self.header);
        let mut body = Vec::with_capacity(
            self.offsets.len() * std::mem::size_of::<IndexT>() + self.nodes.len() * std::mem::size_of::<Node>(),
        );
        body.extend_from_slice(bytemuck::cast_slice(&self.offsets));
        body.extend_from_slice(bytemuck::cast_slice(&self.nodes));
        write_framed(path, MAGIC_NODES, FORMAT_VERSION, header_bytes, &body)?;
        Ok(())
    }

    pub fn read(path: &Path, verify_crc: bool) -> StoreResult<Self> {
        let header_len = std::mem::size_of::<NodesHeader>();
        let framed = read_framed(path, MAGIC_NODES, FORMAT_VERSION, header_len, verify_crc)?;
        let header: NodesHeader = *bytemuck::from_bytes(&framed.header);

        let n_offsets = (header.lat_bins as usize) * (header.lon_bins as usize) + 1;
        let offsets_bytes = n_offsets * std::mem::size_of::<IndexT>();
        let offsets: Vec<IndexT> = bytemuck::cast_slice(&framed.body[..offsets_bytes]).to_vec();
        let nodes: Vec<Node> = bytemuck::cast_slice(&framed.body[offsets_bytes..]).to_vec();

        Ok(NodesFile { header, offsets, nodes })
    }

    pub fn bin_index(&self, lat_bin: LlBinT, lon_bin: LlBinT) -> usize {
        let by = (lat_bin - self.header.lat_zero) as usize;
        let bx = (lon_bin - self.header.lon_zero) as usize;
        by * self.header.lon_bins as usize + bx
    }

    pub fn nodes_in_bin(&self, lat_bin: LlBinT, lon_bin: LlBinT) -> &[Node] {
        let idx = self.bin_index(lat_bin, lon_bin);
        if idx + 1 >= self.offsets.len() {
            return &[];
        }
        let start = self.offsets[idx] as usize;
        let end = self.offsets[idx + 1] as usize;
        &self.nodes[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-nodes.mem");

        let file = NodesFile {
            header: NodesHeader {
                n_nodes: 2,
                n_super: 0,
                lat_bins: 1,
                lon_bins: 1,
                lat_zero: 0,
                lon_zero: 0,
                _pad: 0,
            },
            offsets: vec![0, 2],
            nodes: vec![
                Node::new(0, 100, 200, 0b1, 0, units::NO_INDEX),
                Node::new(1, 300, 400, 0b11, node_flags::SUPER, units::NO_INDEX),
            ],
        };
        file.write(&path).unwrap();

        let read = NodesFile::read(&path, true).unwrap();
        assert_eq!(read.header.n_nodes, 2);
        assert_eq!(read.offsets, vec![0, 2]);
        assert_eq!(read.nodes.len(), 2);
        assert!(read.nodes[1].is_super());
    }
}
