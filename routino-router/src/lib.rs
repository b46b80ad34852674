//! Fake nodes, nearest-feature search, the profile model and the
//! three-phase router for routino-rs (§4.G-4.I, §7).

pub mod error;
pub mod fakes;
pub mod nearest;
pub mod profile;
pub mod results;
pub mod router;

pub use error::{ProfileError, ProfileResult, RouteError, RouteResult};
pub use fakes::{FakeSegment, Fakes, SnappedSegment};
pub use nearest::{find_nearest_segment, node_latlon, NearestMatch};
pub use profile::{Optimisation, Profile};
pub use results::{Results, SearchRecord};
pub use router::{find_route, resolve_waypoint, Router, RouteLeg};
