/// Station store contract.
///
/// `StationRepository` is the only owner of persisted stations. It offers an
/// idempotent batch upsert keyed by `object_id` and the radius query used by
/// the proximity service. Two implementations ship with the crate:
///
/// - `postgis::PostgisStationRepository` - PostgreSQL + PostGIS, the production store
/// - `memory::MemoryStationRepository`   - in-process, for tests and dry runs
///
/// Transaction contract for `upsert`: either the whole batch commits (with
/// individual rows possibly skipped on storage-layer constraint checks) or
/// nothing does and `PersistenceFailure` is returned.

pub mod memory;
pub mod postgis;

use crate::db::DbConfigError;
use crate::model::{Coordinates, GasStation, SearchRadius, StationWithDistance};
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

pub use memory::MemoryStationRepository;
pub use postgis::PostgisStationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Transaction- or connection-level failure; the whole batch or query is lost.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    /// The store lacks required structure (table, column, key, extension).
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl From<DbConfigError> for RepositoryError {
    fn from(e: DbConfigError) -> Self {
        if e.is_schema_problem() {
            RepositoryError::SchemaMismatch(e.to_string())
        } else {
            RepositoryError::PersistenceFailure(e.to_string())
        }
    }
}

/// A station the store refused on a row-level constraint check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedStation {
    pub object_id: i64,
    pub reason: String,
}

/// Result of applying one row inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Applied,
    Skipped(SkippedStation),
}

/// Counts for one committed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpsertReport {
    pub imported: usize,
    pub skipped: usize,
    pub skipped_stations: Vec<SkippedStation>,
}

impl UpsertReport {
    /// Folds one row outcome into the running report.
    pub fn with(mut self, outcome: RowOutcome) -> Self {
        match outcome {
            RowOutcome::Applied => self.imported += 1,
            RowOutcome::Skipped(skipped) => {
                tracing::warn!(object_id = skipped.object_id, "Skipped station: {}", skipped.reason);
                self.skipped += 1;
                self.skipped_stations.push(skipped);
            }
        }
        self
    }
}

pub trait StationRepository: Send + Sync {
    /// Structural readiness probe (schema present, spatial support available).
    fn check_ready(&self) -> Result<(), RepositoryError>;

    /// Insert-or-update every station in one atomic batch.
    fn upsert(&self, stations: &[GasStation]) -> Result<UpsertReport, RepositoryError>;

    /// Every station within `radius` of `center`, nearest first, ties by
    /// `object_id`. The boundary is inclusive.
    fn nearby(
        &self,
        center: Coordinates,
        radius: SearchRadius,
    ) -> Result<Vec<StationWithDistance>, RepositoryError>;

    /// All stations ordered by `object_id`.
    fn all(&self) -> Result<Vec<GasStation>, RepositoryError>;
}

/// Ascending distance, then ascending `object_id`.
pub fn compare_by_distance(a: &StationWithDistance, b: &StationWithDistance) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then(a.station.object_id.cmp(&b.station.object_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: i64) -> GasStation {
        GasStation::new(id, "x", Coordinates::new(6.9, 50.9).unwrap())
    }

    #[test]
    fn test_report_fold_counts_outcomes() {
        let report = [
            RowOutcome::Applied,
            RowOutcome::Skipped(SkippedStation {
                object_id: 2,
                reason: "check violation".into(),
            }),
            RowOutcome::Applied,
        ]
        .into_iter()
        .fold(UpsertReport::default(), UpsertReport::with);

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.skipped_stations[0].object_id, 2);
    }

    #[test]
    fn test_distance_ordering_breaks_ties_by_id() {
        let mut results = vec![
            StationWithDistance { station: station(9), distance_km: 1.0 },
            StationWithDistance { station: station(3), distance_km: 1.0 },
            StationWithDistance { station: station(5), distance_km: 0.2 },
        ];
        results.sort_by(compare_by_distance);
        let ids: Vec<i64> = results.iter().map(|r| r.station.object_id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn test_db_errors_map_to_repository_errors() {
        let schema: RepositoryError = DbConfigError::MissingTable("gas_stations".into()).into();
        assert!(matches!(schema, RepositoryError::SchemaMismatch(_)));

        let other: RepositoryError = DbConfigError::MissingDatabaseUrl.into();
        assert!(matches!(other, RepositoryError::PersistenceFailure(_)));
    }
}
