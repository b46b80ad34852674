//! `WaysX`: the wide building record for a way, before the name+attribute
//! deduplication pass of builder step 6 collapses identical ways down to one
//! compact `Way` record referenced by many segments.

use routino_common::highway::{Highway, Highways};
use routino_common::property::Properties;
use routino_common::transport::Transports;
use routino_common::units::{HeightT, IndexT, LengthT, SpeedT, WeightT, WidthT, NO_WAY};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WayAttributes {
    pub name: String,
    pub highway: Highway,
    pub oneway: bool,
    pub roundabout: bool,
    pub allow: Transports,
    pub properties: Properties,
    pub speed: SpeedT,
    pub weight: WeightT,
    pub height: HeightT,
    pub width: WidthT,
    pub length: LengthT,
}

#[derive(Debug, Clone)]
pub struct WayX {
    pub id: i64,
    pub attrs: WayAttributes,
    /// Index of the deduplicated `Way` record this building record collapses
    /// into, filled in by step 6. `NO_WAY` until then.
    pub prop: IndexT,
}

impl WayX {
    pub fn new(id: i64, attrs: WayAttributes) -> Self {
        WayX { id, attrs, prop: NO_WAY }
    }
}

impl WayAttributes {
    pub fn highways_bit(&self) -> Highways {
        Highways::from(self.highway)
    }
}
