/// Proximity queries over the station store.
///
/// Takes raw, untrusted request values (strings straight off the query
/// string), validates them, and only then asks the repository. Radius input
/// is in meters; the store works in kilometers.

use crate::model::{Coordinates, GasStation, SearchRadius, StationWithDistance};
use crate::repository::{RepositoryError, StationRepository};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_RADIUS_METERS: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Caller error: missing, unparsable, or out-of-range input.
    #[error("{0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct ProximityQueryService {
    repository: Arc<dyn StationRepository>,
    default_radius: SearchRadius,
    max_radius: Option<SearchRadius>,
}

fn parse_number(name: &str, raw: &str) -> Result<f64, QueryError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| QueryError::InvalidQuery(format!("{} must be a number, got '{}'", name, raw)))
}

fn required<'a>(name: &str, raw: Option<&'a str>) -> Result<&'a str, QueryError> {
    match raw {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            tracing::debug!("Missing query parameter '{}'", name);
            Err(QueryError::InvalidQuery(
                "Latitude (lat) and longitude (lng) are required".to_string(),
            ))
        }
    }
}

impl ProximityQueryService {
    /// Radii are unbounded unless a cap is set with `with_max_radius`.
    pub fn new(repository: Arc<dyn StationRepository>, default_radius: SearchRadius) -> Self {
        Self {
            repository,
            default_radius,
            max_radius: None,
        }
    }

    pub fn with_max_radius(mut self, max_radius: SearchRadius) -> Self {
        self.max_radius = Some(max_radius);
        self
    }

    /// Parses and bounds-checks the center point.
    fn center(raw_lat: Option<&str>, raw_lng: Option<&str>) -> Result<Coordinates, QueryError> {
        let lat = parse_number("lat", required("lat", raw_lat)?)?;
        let lng = parse_number("lng", required("lng", raw_lng)?)?;
        Coordinates::new(lng, lat).map_err(|e| QueryError::InvalidQuery(e.to_string()))
    }

    /// Parses the radius in meters; absent or blank means the default.
    fn radius(&self, raw_radius: Option<&str>) -> Result<SearchRadius, QueryError> {
        let Some(raw) = raw_radius.filter(|r| !r.trim().is_empty()) else {
            return Ok(self.default_radius);
        };

        let meters = parse_number("radius", raw)?;
        let radius =
            SearchRadius::from_meters(meters).map_err(|e| QueryError::InvalidQuery(e.to_string()))?;

        match self.max_radius {
            Some(max) if radius.km() > max.km() => Err(QueryError::InvalidQuery(format!(
                "radius must not exceed {} meters",
                max.meters()
            ))),
            _ => Ok(radius),
        }
    }

    /// Stations within the radius of (lat, lng), nearest first.
    ///
    /// # Errors
    /// `InvalidQuery` for bad input, before the repository is touched;
    /// `Repository` when the store fails.
    pub fn find_nearby(
        &self,
        raw_lat: Option<&str>,
        raw_lng: Option<&str>,
        raw_radius: Option<&str>,
    ) -> Result<Vec<StationWithDistance>, QueryError> {
        let center = Self::center(raw_lat, raw_lng)?;
        let radius = self.radius(raw_radius)?;

        tracing::debug!(
            lat = center.latitude(),
            lng = center.longitude(),
            radius_m = radius.meters(),
            "Nearby query"
        );
        Ok(self.repository.nearby(center, radius)?)
    }

    /// Every stored station, ordered by `object_id`.
    pub fn list_all(&self) -> Result<Vec<GasStation>, QueryError> {
        Ok(self.repository.all()?)
    }
}
