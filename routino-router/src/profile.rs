//! The routing profile value object and its one-time normalisation pass
//! (§4.I). A profile is loaded (by an external collaborator, from Profile
//! XML per §6) as raw user-facing numbers — percentages, km/h, tonnes — and
//! must be normalised exactly once before it is used by
//! [`crate::router::find_route`].

use serde::{Deserialize, Serialize};

use routino_common::highway::HIGHWAY_COUNT;
use routino_common::property::{Properties, Property, PROPERTY_COUNT};
use routino_common::transport::{Transport, Transports};
use routino_common::units::{self, DistanceT, DurationT};
use routino_graph::compact::ways::{Way, WaysHeader};

use crate::error::{ProfileError, ProfileResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Optimisation {
    Shortest,
    Quickest,
}

/// A named transport profile: preferences, vehicle limits, and the two
/// turn/oneway obedience flags. `highway_pref`/`speed` are indexed by
/// [`routino_common::highway::Highway::index`]; `props_yes`/`props_no` by
/// [`Property::index`]. Slot 0 of each array is unused (the index functions
/// are 1-based), matching the original's `highway[Way_Count]` convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub transport: Transport,
    pub optimisation: Optimisation,

    /// Raw 0..100 user input before [`Profile::normalize`]; 0..1 (sqrt-scaled)
    /// after.
    pub highway_pref: [f64; HIGHWAY_COUNT],
    /// km/h, 0 = "this highway type is impassable for this profile".
    pub speed: [f64; HIGHWAY_COUNT],
    /// Raw 0..100 user input before normalisation; 0..1 (sqrt-scaled) after.
    pub props_yes: [f64; PROPERTY_COUNT],
    /// Derived as `1 - props_yes` during normalisation; meaningless before.
    pub props_no: [f64; PROPERTY_COUNT],

    pub obey_oneway: bool,
    pub obey_turns: bool,

    /// Vehicle limits in tonnes/metres; 0 = unrestricted.
    pub weight: f64,
    pub height: f64,
    pub width: f64,
    pub length: f64,

    #[serde(skip)]
    pub allowed_mask: Transports,
    #[serde(skip)]
    pub max_pref: f64,
    #[serde(skip)]
    pub max_speed: f64,
    #[serde(skip)]
    normalized: bool,
}

impl Profile {
    pub fn new(name: impl Into<String>, transport: Transport, optimisation: Optimisation) -> Self {
        Profile {
            name: name.into(),
            transport,
            optimisation,
            highway_pref: [0.0; HIGHWAY_COUNT],
            speed: [0.0; HIGHWAY_COUNT],
            props_yes: [0.0; PROPERTY_COUNT],
            props_no: [0.0; PROPERTY_COUNT],
            obey_oneway: true,
            obey_turns: true,
            weight: 0.0,
            height: 0.0,
            width: 0.0,
            length: 0.0,
            allowed_mask: Transports::empty(),
            max_pref: 0.0,
            max_speed: 0.0,
            normalized: false,
        }
    }

    /// Runs the five-step normalisation of §4.I. Must be called exactly once,
    /// after every field above has been set from CLI flags/Profile XML and
    /// before the profile is passed to the router.
    pub fn normalize(&mut self, ways: &WaysHeader) -> ProfileResult<()> {
        // 1. allowed_mask must overlap the database's union of allowed
        // transports.
        self.allowed_mask = Transports::from(self.transport);
        let db_allow = Transports::from_bits_truncate(ways.allow_union);
        if !self.allowed_mask.intersects(db_allow) {
            return Err(ProfileError::TransportNotInDatabase(self.transport));
        }

        // 2. Rescale highway preferences so the max is 1.0, floor at 0.0001
        // unconditionally -- even an explicit 0 becomes heavily discouraged
        // rather than an outright block, since the edge cost only divides by
        // this value and a literal 0.0 there would make the edge impassable.
        let max_highway = self.highway_pref.iter().cloned().fold(0.0_f64, f64::max);
        if max_highway <= 0.0 {
            return Err(ProfileError::AllHighwayPrefsZero);
        }
        for p in self.highway_pref.iter_mut() {
            *p = (*p / max_highway).max(0.0001);
        }

        // 3. Property preferences: clamp to [0,100], scale to [0,1], derive
        // the complementary "no" weight, then sqrt both and floor at
        // 0.0001 (§4.I note 3: at 60% preference the longer-route tolerance
        // shrinks from 50% to 22%).
        for i in 0..PROPERTY_COUNT {
            let yes = self.props_yes[i].clamp(0.0, 100.0) / 100.0;
            self.props_yes[i] = yes.sqrt().max(0.0001);
            self.props_no[i] = (1.0 - yes).sqrt().max(0.0001);
        }

        // 4. max_speed must be nonzero.
        self.max_speed = self.speed.iter().cloned().fold(0.0_f64, f64::max);
        if self.max_speed <= 0.0 {
            return Err(ProfileError::AllSpeedsZero);
        }

        // 5. max_pref is the product, over properties actually present in
        // this database, of the more favourable of props_yes/props_no.
        let db_props = Properties::from_bits_truncate(ways.props_union);
        self.max_pref = Property::ALL
            .into_iter()
            .filter(|p| db_props.intersects(Properties::from(*p)))
            .map(|p| self.props_yes[p.index()].max(self.props_no[p.index()]))
            .product::<f64>();

        self.normalized = true;
        Ok(())
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// The profile's multiplier for a highway type; 0.0 rejects the edge
    /// outright (§4.H edge relaxation).
    pub fn highway_multiplier(&self, highway_index: usize) -> f64 {
        self.highway_pref[highway_index]
    }

    /// The combined properties multiplier for a way; any factor of 0.0
    /// collapses the whole product, per §4.H.
    pub fn property_multiplier(&self, way_properties: Properties) -> f64 {
        let mut total = 1.0;
        for p in Property::ALL {
            let factor = if way_properties.intersects(Properties::from(p)) {
                self.props_yes[p.index()]
            } else {
                self.props_no[p.index()]
            };
            if factor <= 0.0 {
                return 0.0;
            }
            total *= factor;
        }
        total
    }

    /// Travel duration along a segment of `distance` metres on a way typed
    /// `highway_index` with speed limit `way_speed_kph` (0 = unset). Uses the
    /// slower of the way's speed and this profile's speed for that highway
    /// type; `None` when both are unset (impassable, see
    /// [`routino_common::units::IMPASSABLE`]).
    pub fn duration(&self, distance: DistanceT, way_speed_kph: u8, highway_index: usize) -> Option<DurationT> {
        let profile_speed = self.speed[highway_index];
        let way_speed = way_speed_kph as f64;

        let effective = match (way_speed > 0.0, profile_speed > 0.0) {
            (false, false) => return units::IMPASSABLE,
            (true, false) => way_speed,
            (false, true) => profile_speed,
            (true, true) => way_speed.min(profile_speed),
        };

        Some(units::distance_speed_to_duration(distance, effective.round() as u32))
    }

    /// True if the vehicle described by this profile's weight/height/width/
    /// length limits cannot use `way` (a way's own limit of 0 means
    /// unrestricted for that dimension).
    pub fn violates_vehicle_limits(&self, way: &Way) -> bool {
        let exceeds = |profile_limit: f64, way_limit_scaled: u8, to_metric: fn(u8) -> f64| -> bool {
            profile_limit > 0.0 && way_limit_scaled > 0 && to_metric(way_limit_scaled) < profile_limit
        };

        exceeds(self.weight, way.weight, units::weight_to_tonnes)
            || exceeds(self.height, way.height, units::height_to_metres)
            || exceeds(self.width, way.width, units::width_to_metres)
            || exceeds(self.length, way.length, units::length_to_metres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use routino_common::highway::Highway;

    fn header_allowing_bicycle() -> WaysHeader {
        let mut header = WaysHeader::zeroed();
        header.n_ways = 1;
        header.n_original = 1;
        header.highways_union = 0xffff;
        header.allow_union = Transports::BICYCLE.bits();
        header
    }

    #[test]
    fn rejects_transport_absent_from_database() {
        let mut profile = Profile::new("bicycle", Transport::Bicycle, Optimisation::Shortest);
        profile.highway_pref[Highway::Residential.index()] = 100.0;
        profile.speed[Highway::Residential.index()] = 20.0;
        let mut header = WaysHeader::zeroed();
        header.allow_union = Transports::MOTORCAR.bits();
        assert!(matches!(profile.normalize(&header), Err(ProfileError::TransportNotInDatabase(_))));
    }

    #[test]
    fn rejects_all_zero_highway_prefs() {
        let mut profile = Profile::new("bicycle", Transport::Bicycle, Optimisation::Shortest);
        profile.speed[Highway::Residential.index()] = 20.0;
        assert!(matches!(profile.normalize(&header_allowing_bicycle()), Err(ProfileError::AllHighwayPrefsZero)));
    }

    #[test]
    fn normalizes_highway_prefs_to_unit_max_flooring_explicit_zero() {
        let mut profile = Profile::new("bicycle", Transport::Bicycle, Optimisation::Shortest);
        profile.highway_pref[Highway::Residential.index()] = 100.0;
        profile.highway_pref[Highway::Cycleway.index()] = 50.0;
        profile.highway_pref[Highway::Motorway.index()] = 0.0;
        profile.speed[Highway::Residential.index()] = 20.0;
        profile.normalize(&header_allowing_bicycle()).unwrap();
        assert!((profile.highway_pref[Highway::Residential.index()] - 1.0).abs() < 1e-9);
        assert!((profile.highway_pref[Highway::Cycleway.index()] - 0.5).abs() < 1e-9);
        assert_eq!(profile.highway_pref[Highway::Motorway.index()], 0.0001);
    }
}
