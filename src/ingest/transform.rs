/// Raw feature → `GasStation` transformation.
///
/// Pure and total: every input feature yields exactly one outcome, either a
/// canonical station or a `Rejection` saying why it was discarded. Bad
/// records never abort the batch.

use crate::ingest::feed::RawFeature;
use crate::model::{ADDRESS_UNAVAILABLE, Axis, CoordinateError, Coordinates, GasStation};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Attribute carrying the upstream natural key.
pub const ID_ATTRIBUTE: &str = "objectid";
/// Attribute carrying the street address.
pub const ADDRESS_ATTRIBUTE: &str = "adresse";

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateIssue {
    MissingGeometry,
    Missing(Axis),
    NotNumeric(Axis),
    Invalid(CoordinateError),
}

impl std::fmt::Display for CoordinateIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateIssue::MissingGeometry => write!(f, "geometry missing"),
            CoordinateIssue::Missing(axis) => write!(f, "{} missing", axis),
            CoordinateIssue::NotNumeric(axis) => write!(f, "{} is not numeric", axis),
            CoordinateIssue::Invalid(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    MissingId,
    InvalidCoordinates(CoordinateIssue),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::MissingId => write!(f, "missing or non-numeric {}", ID_ATTRIBUTE),
            RejectionReason::InvalidCoordinates(issue) => write!(f, "invalid coordinates: {}", issue),
        }
    }
}

impl Serialize for RejectionReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A discarded feature, identified by its position in the batch and, when
/// it could be read, its upstream id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub index: usize,
    pub object_id: Option<i64>,
    pub reason: RejectionReason,
}

/// Per-record result of transformation.
pub type FeatureOutcome = Result<GasStation, Rejection>;

/// Whole-batch result: valid stations plus every rejection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutcome {
    pub stations: Vec<GasStation>,
    pub rejected: Vec<Rejection>,
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

/// Transforms a whole batch. Rejections are logged at warn level.
pub fn transform(features: &[RawFeature]) -> TransformOutcome {
    features
        .iter()
        .enumerate()
        .map(|(index, feature)| transform_feature(index, feature))
        .fold(TransformOutcome::default(), |mut acc, outcome| {
            match outcome {
                Ok(station) => acc.stations.push(station),
                Err(rejection) => {
                    tracing::warn!(
                        index = rejection.index,
                        object_id = ?rejection.object_id,
                        "Rejected feature: {}",
                        rejection.reason
                    );
                    acc.rejected.push(rejection);
                }
            }
            acc
        })
}

/// Transforms a single feature.
pub fn transform_feature(index: usize, feature: &RawFeature) -> FeatureOutcome {
    let object_id = parse_object_id(feature.attribute(ID_ATTRIBUTE)).ok_or(Rejection {
        index,
        object_id: None,
        reason: RejectionReason::MissingId,
    })?;

    let coordinates = extract_coordinates(feature).map_err(|issue| Rejection {
        index,
        object_id: Some(object_id),
        reason: RejectionReason::InvalidCoordinates(issue),
    })?;

    let address = feature
        .attribute(ADDRESS_ATTRIBUTE)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ADDRESS_UNAVAILABLE);

    Ok(GasStation::new(object_id, address, coordinates))
}

fn parse_object_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn extract_coordinates(feature: &RawFeature) -> Result<Coordinates, CoordinateIssue> {
    let geometry = feature.geometry.as_ref().ok_or(CoordinateIssue::MissingGeometry)?;
    let longitude = parse_axis(Axis::Longitude, geometry.x.as_ref())?;
    let latitude = parse_axis(Axis::Latitude, geometry.y.as_ref())?;
    Coordinates::new(longitude, latitude).map_err(CoordinateIssue::Invalid)
}

fn parse_axis(axis: Axis, value: Option<&Value>) -> Result<f64, CoordinateIssue> {
    match value {
        None | Some(Value::Null) => Err(CoordinateIssue::Missing(axis)),
        Some(Value::Number(n)) => n.as_f64().ok_or(CoordinateIssue::NotNumeric(axis)),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| CoordinateIssue::NotNumeric(axis)),
        Some(_) => Err(CoordinateIssue::NotNumeric(axis)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
