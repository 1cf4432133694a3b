/// Shared domain types for the gas station service.
///
/// `GasStation` is the canonical record produced by the transformer and
/// owned by the repository once persisted. Coordinates are validated on
/// construction, so any `GasStation` value already satisfies the WGS84
/// bounds and its geometry can always be derived from it.

use geo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Spatial reference of every stored geometry (WGS84 lon/lat).
pub const WGS84_SRID: i32 = 4326;

pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;

/// Substituted when the upstream feed omits a station's address.
pub const ADDRESS_UNAVAILABLE: &str = "address unavailable";

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Longitude,
    Latitude,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Longitude => write!(f, "longitude"),
            Axis::Latitude => write!(f, "latitude"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("{0} is not a finite number")]
    NonFinite(Axis),
    #[error("{axis} {value} is outside [{min}, {max}]")]
    OutOfRange { axis: Axis, value: f64, min: f64, max: f64 },
}

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    longitude: f64,
    latitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    longitude: f64,
    latitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.longitude, raw.latitude)
    }
}

impl Coordinates {
    /// Validates finiteness and bounds. Both ends of each range are inclusive.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, CoordinateError> {
        check_axis(Axis::Longitude, longitude, MIN_LONGITUDE, MAX_LONGITUDE)?;
        check_axis(Axis::Latitude, latitude, MIN_LATITUDE, MAX_LATITUDE)?;
        Ok(Self { longitude, latitude })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Point in x = longitude, y = latitude order.
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

fn check_axis(axis: Axis, value: f64, min: f64, max: f64) -> Result<(), CoordinateError> {
    if !value.is_finite() {
        return Err(CoordinateError::NonFinite(axis));
    }
    if value < min || value > max {
        return Err(CoordinateError::OutOfRange { axis, value, min, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Gas station
// ---------------------------------------------------------------------------

/// Canonical station record. `object_id` is the upstream natural key and the
/// upsert conflict key; it is never regenerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasStation {
    pub object_id: i64,
    pub address: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl GasStation {
    pub fn new(object_id: i64, address: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            object_id,
            address: address.into(),
            coordinates,
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates.longitude()
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates.latitude()
    }

    /// Geometry in SRID 4326, always derived from the scalar coordinates.
    pub fn geometry(&self) -> Point<f64> {
        self.coordinates.to_point()
    }
}

/// A station returned by a radius query, annotated with its geodesic
/// distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationWithDistance {
    #[serde(flatten)]
    pub station: GasStation,
    pub distance_km: f64,
}

// ---------------------------------------------------------------------------
// Search radius
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RadiusError {
    #[error("radius must be a finite number")]
    NonFinite,
    #[error("radius must be greater than zero, got {0}")]
    NotPositive(f64),
}

/// Strictly positive search radius, stored in kilometers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRadius {
    km: f64,
}

impl SearchRadius {
    pub fn from_km(km: f64) -> Result<Self, RadiusError> {
        if !km.is_finite() {
            return Err(RadiusError::NonFinite);
        }
        if km <= 0.0 {
            return Err(RadiusError::NotPositive(km));
        }
        Ok(Self { km })
    }

    pub fn from_meters(meters: f64) -> Result<Self, RadiusError> {
        if !meters.is_finite() {
            return Err(RadiusError::NonFinite);
        }
        if meters <= 0.0 {
            return Err(RadiusError::NotPositive(meters));
        }
        Self::from_km(meters / 1000.0)
    }

    pub fn km(&self) -> f64 {
        self.km
    }

    pub fn meters(&self) -> f64 {
        self.km * 1000.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
