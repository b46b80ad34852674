//! The compact `Ways` store: a deduplicated way-attribute array followed by
//! a NUL-terminated name blob (§3, §6).

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use routino_common::highway::way_flags;
use routino_common::units::{HeightT, LengthT, SpeedT, WeightT, WidthT};

use crate::error::StoreResult;
use routino_io::header::{read_framed, write_framed, FORMAT_VERSION, MAGIC_WAYS};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Way {
    pub name_offset: u32,
    pub allow: u16,
    pub properties: u8,
    /// Highway type in the low 5 bits (`HIGHWAY(xx) = xx & 0x1f`), `OneWay`
    /// (32) and `Roundabout` (64) overlaid in the high bits.
    pub highway: u8,
    pub speed: SpeedT,
    pub weight: WeightT,
    pub height: HeightT,
    pub width: WidthT,
    pub length: LengthT,
    _pad: [u8; 3],
}

impl Way {
    #[allow(clippy::too_many_arguments)]
    pub fn new(name_offset: u32, allow: u16, properties: u8, highway: u8, speed: SpeedT, weight: WeightT, height: HeightT, width: WidthT, length: LengthT) -> Self {
        Way { name_offset, allow, properties, highway, speed, weight, height, width, length, _pad: [0; 3] }
    }

    pub fn highway_type(&self) -> u8 {
        self.highway & 0x1f
    }
    pub fn is_oneway(&self) -> bool {
        self.highway & way_flags::ONEWAY != 0
    }
    pub fn is_roundabout(&self) -> bool {
        self.highway & way_flags::ROUNDABOUT != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WaysHeader {
    pub n_ways: u32,
    pub n_original: u32,
    pub highways_union: u16,
    pub allow_union: u16,
    pub props_union: u8,
    _pad: [u8; 3],
}

impl WaysHeader {
    pub fn new(n_ways: u32, n_original: u32, highways_union: u16, allow_union: u16, props_union: u8) -> Self {
        WaysHeader { n_ways, n_original, highways_union, allow_union, props_union, _pad: [0; 3] }
    }
}

pub struct WaysFile {
    pub header: WaysHeader,
    pub ways: Vec<Way>,
    /// NUL-terminated strings concatenated in `Way::name_offset` order.
    pub name_blob: Vec<u8>,
}

impl WaysFile {
    pub fn name(&self, way: &Way) -> &str {
        let start = way.name_offset as usize;
        if start >= self.name_blob.len() {
            return "";
        }
        let end = self.name_blob[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| start + p)
            .unwrap_or(self.name_blob.len());
        std::str::from_utf8(&self.name_blob[start..end]).unwrap_or("")
    }

    pub fn write(&self, path: &Path) -> StoreResult<()> {
        let header_bytes = bytemuck::bytes_of(&self.header);
        let mut body = Vec::with_capacity(self.ways.len() * std::mem::size_of::<Way>() + self.name_blob.len());
        body.extend_from_slice(bytemuck::cast_slice(&self.ways));
        body.extend_from_slice(&self.name_blob);
        write_framed(path, MAGIC_WAYS, FORMAT_VERSION, header_bytes, &body)?;
        Ok(())
    }

    pub fn read(path: &Path, verify_crc: bool) -> StoreResult<Self> {
        let header_len = std::mem::size_of::<WaysHeader>();
        let framed = read_framed(path, MAGIC_WAYS, FORMAT_VERSION, header_len, verify_crc)?;
        let header: WaysHeader = *bytemuck::from_bytes(&framed.header);

        let ways_bytes = header.n_ways as usize * std::mem::size_of::<Way>();
        let ways: Vec<Way> = bytemuck::cast_slice(&framed.body[..ways_bytes]).to_vec();
        let name_blob = framed.body[ways_bytes..].to_vec();

        Ok(WaysFile { header, ways, name_blob })
    }
}

/// Builds a name blob plus per-way offsets from a list of names in the same
/// order as the `Way` array. Ways share a name blob entry only when they
/// share the exact same name string *and* all other attributes (the
/// deduplication already collapsed those into one `Way` by the time this
/// runs).
pub fn build_name_blob(names: &[String]) -> (Vec<u8>, Vec<u32>) {
    let mut blob = Vec::new();
    let mut offsets = Vec::with_capacity(names.len());
    for name in names {
        offsets.push(blob.len() as u32);
        blob.extend_from_slice(name.as_bytes());
        blob.push(0);
    }
    (blob, offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_blob_roundtrips() {
        let (blob, offsets) = build_name_blob(&["High Street".into(), "".into(), "Church Lane".into()]);
        let file = WaysFile {
            header: WaysHeader {
                n_ways: 3,
                n_original: 3,
                highways_union: 0,
                allow_union: 0,
                props_union: 0,
                _pad: [0; 3],
            },
            ways: offsets
                .iter()
                .map(|&o| Way {
                    name_offset: o,
                    allow: 0,
                    properties: 0,
                    highway: 1,
                    speed: 0,
                    weight: 0,
                    height: 0,
                    width: 0,
                    length: 0,
                    _pad: [0; 3],
                })
                .collect(),
            name_blob: blob,
        };
        assert_eq!(file.name(&file.ways[0]), "High Street");
        assert_eq!(file.name(&file.ways[1]), "");
        assert_eq!(file.name(&file.ways[2]), "Church Lane");
    }
}
