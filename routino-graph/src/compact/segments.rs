//! The compact `Segments` store: a flat array of fixed-size segment records
//! (§3, §6).

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use routino_common::units::{
    self, DistanceT, IndexT, ONEWAY_1TO2, ONEWAY_2TO1, SEGMENT_NORMAL, SEGMENT_SUPER,
};

use crate::error::StoreResult;
use routino_io::header::{read_framed, write_framed, FORMAT_VERSION, MAGIC_SEGMENTS};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Segment {
    pub node1: IndexT,
    pub node2: IndexT,
    /// Next segment in `node1`'s incidence chain (`NO_SEGMENT`-terminated).
    pub next1: IndexT,
    /// Next segment in `node2`'s incidence chain.
    pub next2: IndexT,
    pub way: IndexT,
    pub distance_and_flags: DistanceT,
}

impl Segment {
    pub fn distance(&self) -> DistanceT {
        units::distance(self.distance_and_flags)
    }
    pub fn is_area(&self) -> bool {
        self.distance() == 0
    }
    pub fn is_oneway_1to2(&self) -> bool {
        self.distance_and_flags & ONEWAY_1TO2 != 0
    }
    pub fn is_oneway_2to1(&self) -> bool {
        self.distance_and_flags & ONEWAY_2TO1 != 0
    }
    pub fn is_super(&self) -> bool {
        self.distance_and_flags & SEGMENT_SUPER != 0
    }
    pub fn is_normal(&self) -> bool {
        self.distance_and_flags & SEGMENT_NORMAL != 0
    }

    /// Whether travel from `node1` to `node2` is permitted by the oneway
    /// flags (always true for a two-way segment).
    pub fn allows_forward(&self) -> bool {
        !self.is_oneway_2to1()
    }
    pub fn allows_backward(&self) -> bool {
        !self.is_oneway_1to2()
    }

    pub fn other_node(&self, n: IndexT) -> IndexT {
        if n == self.node1 {
            self.node2
        } else {
            self.node1
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SegmentsHeader {
    pub n_total: u32,
    pub n_super: u32,
    pub n_normal: u32,
    _pad: u32,
}

impl SegmentsHeader {
    pub fn new(n_total: u32, n_super: u32, n_normal: u32) -> Self {
        SegmentsHeader { n_total, n_super, n_normal, _pad: 0 }
    }
}

pub struct SegmentsFile {
    pub header: SegmentsHeader,
    pub segments: Vec<Segment>,
}

impl SegmentsFile {
    pub fn write(&self, path: &Path) -> StoreResult<()> {
        let header_bytes = bytemuck::bytes_of(&self.header);
        let body: &[u8] = bytemuck::cast_slice(&self.segments);
        write_framed(path, MAGIC_SEGMENTS, FORMAT_VERSION, header_bytes, body)?;
        Ok(())
    }

    pub fn read(path: &Path, verify_crc: bool) -> StoreResult<Self> {
        let header_len = std::mem::size_of::<SegmentsHeader>();
        let framed = read_framed(path, MAGIC_SEGMENTS, FORMAT_VERSION, header_len, verify_crc)?;
        let header: SegmentsHeader = *bytemuck::from_bytes(&framed.header);
        let segments: Vec<Segment> = bytemuck::cast_slice(&framed.body).to_vec();
        Ok(SegmentsFile { header, segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_roundtrip_through_bytes() {
        let seg = Segment {
            node1: 1,
            node2: 2,
            next1: units::NO_SEGMENT,
            next2: units::NO_SEGMENT,
            way: 0,
            distance_and_flags: 123 | ONEWAY_1TO2 | SEGMENT_NORMAL,
        };
        assert_eq!(seg.distance(), 123);
        assert!(seg.is_oneway_1to2());
        assert!(!seg.is_oneway_2to1());
        assert!(seg.is_normal());
        assert!(!seg.is_super());
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-segments.mem");

        let file = SegmentsFile {
            header: SegmentsHeader {
                n_total: 1,
                n_super: 0,
                n_normal: 1,
                _pad: 0,
            },
            segments: vec![Segment {
                node1: 0,
                node2: 1,
                next1: units::NO_SEGMENT,
                next2: units::NO_SEGMENT,
                way: 0,
                distance_and_flags: 42 | SEGMENT_NORMAL,
            }],
        };
        file.write(&path).unwrap();

        let read = SegmentsFile::read(&path, true).unwrap();
        assert_eq!(read.segments.len(), 1);
        assert_eq!(read.segments[0].distance(), 42);
    }
}
