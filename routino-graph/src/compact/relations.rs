//! The compact `Relations` store: just the resolved turn-relation array
//! (§3, §6). Route relations don't survive past the builder — they only
//! ever existed to set `FootRoute`/`BicycleRoute` property bits on ways.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use routino_common::units::IndexT;

use crate::error::StoreResult;
use crate::xstore::relations::TurnRelation as XTurnRelation;
use routino_io::header::{read_framed, write_framed, FORMAT_VERSION, MAGIC_RELATIONS};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TurnRelation {
    pub from_segment: IndexT,
    pub via_node: IndexT,
    pub to_segment: IndexT,
    pub except: u16,
    _pad: u16,
}

impl From<XTurnRelation> for TurnRelation {
    fn from(t: XTurnRelation) -> Self {
        TurnRelation {
            from_segment: t.from_segment,
            via_node: t.via_node,
            to_segment: t.to_segment,
            except: t.except.bits(),
            _pad: 0,
        }
    }
}

impl TurnRelation {
    pub fn new(from_segment: IndexT, via_node: IndexT, to_segment: IndexT, except: u16) -> Self {
        TurnRelation { from_segment, via_node, to_segment, except, _pad: 0 }
    }

    pub fn forbids(&self, from_segment: IndexT, via_node: IndexT, to_segment: IndexT, transport_bit: u16) -> bool {
        self.from_segment == from_segment
            && self.via_node == via_node
            && self.to_segment == to_segment
            && (self.except & transport_bit) == 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RelationsHeader {
    pub n_turn_relations: u32,
}

pub struct RelationsFile {
    pub header: RelationsHeader,
    pub turn_relations: Vec<TurnRelation>,
}

impl RelationsFile {
    pub fn write(&self, path: &Path) -> StoreResult<()> {
        let header_bytes = bytemuck::bytes_of(&self.header);
        let body: &[u8] = bytemuck::cast_slice(&self.turn_relations);
        write_framed(path, MAGIC_RELATIONS, FORMAT_VERSION, header_bytes, body)?;
        Ok(())
    }

    pub fn read(path: &Path, verify_crc: bool) -> StoreResult<Self> {
        let header_len = std::mem::size_of::<RelationsHeader>();
        let framed = read_framed(path, MAGIC_RELATIONS, FORMAT_VERSION, header_len, verify_crc)?;
        let header: RelationsHeader = *bytemuck::from_bytes(&framed.header);
        let turn_relations: Vec<TurnRelation> = bytemuck::cast_slice(&framed.body).to_vec();
        Ok(RelationsFile { header, turn_relations })
    }

    /// Turn relations sharing a via-node are contiguous (sorted primarily by
    /// `via`, per §3), so this is a binary-search bracket, not a scan.
    pub fn relations_via(&self, via_node: IndexT) -> &[TurnRelation] {
        let start = self
            .turn_relations
            .partition_point(|t| t.via_node < via_node);
        let end = self
            .turn_relations
            .partition_point(|t| t.via_node <= via_node);
        &self.turn_relations[start..end]
    }
}
