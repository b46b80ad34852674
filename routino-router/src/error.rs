//! Kind-3 (profile incompatible) and kind-4 (route not found) errors (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile transport {0:?} is not allowed by any way in this database")]
    TransportNotInDatabase(routino_common::transport::Transport),

    #[error("profile has zero preference for every highway type")]
    AllHighwayPrefsZero,

    #[error("profile has zero speed for every highway type")]
    AllSpeedsZero,
}

pub type ProfileResult<T> = Result<T, ProfileError>;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no route found between waypoints {from} and {to}")]
    NotFound { from: usize, to: usize },

    #[error("waypoint {0} has no nearby routable segment within the search radius")]
    NoNearbySegment(usize),

    #[error("more than {max} waypoints were given ({given})")]
    TooManyWaypoints { given: usize, max: usize },
}

pub type RouteResult<T> = Result<T, RouteError>;
