/// PostgreSQL + PostGIS station store.
///
/// Schema: `sql/001_gas_stations.sql`. Geometry is never taken from the
/// caller; every write recomputes it from the scalar coordinates with
/// `ST_SetSRID(ST_MakePoint(lon, lat), 4326)`, on insert and on conflict.
///
/// Distances use the `geography` type, i.e. the WGS84 spheroid, and the
/// radius filter is `ST_DWithin`, which is inclusive and index-assisted.

use crate::db::{self, PgPool, PooledClient};
use crate::model::{Coordinates, GasStation, SearchRadius, StationWithDistance, WGS84_SRID};
use crate::repository::{RepositoryError, RowOutcome, SkippedStation, StationRepository, UpsertReport};
use postgres::{Row, Statement, Transaction};

const UPSERT_SQL: &str = "INSERT INTO gas_stations (object_id, adresse, longitude, latitude, geometry)
     VALUES ($1, $2, $3, $4, ST_SetSRID(ST_MakePoint($3, $4), 4326))
     ON CONFLICT (object_id) DO UPDATE SET
        adresse = EXCLUDED.adresse,
        longitude = EXCLUDED.longitude,
        latitude = EXCLUDED.latitude,
        geometry = ST_SetSRID(ST_MakePoint(EXCLUDED.longitude, EXCLUDED.latitude), 4326),
        updated_at = now()";

const NEARBY_SQL: &str = "SELECT object_id, adresse, longitude, latitude,
        ST_Distance(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) / 1000.0
            AS distance_km
     FROM gas_stations
     WHERE ST_DWithin(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3)
     ORDER BY distance_km, object_id";

const ALL_SQL: &str = "SELECT object_id, adresse, longitude, latitude
     FROM gas_stations
     ORDER BY object_id";

const GEOMETRY_DRIFT_SQL: &str = "SELECT count(*)
     FROM gas_stations
     WHERE ST_SRID(geometry) <> $1
        OR NOT ST_Equals(geometry, ST_SetSRID(ST_MakePoint(longitude, latitude), $1))";

pub struct PostgisStationRepository {
    pool: PgPool,
}

fn persistence(e: postgres::Error) -> RepositoryError {
    RepositoryError::PersistenceFailure(e.to_string())
}

/// Data exceptions (class 22) and integrity violations (class 23) are
/// attributable to the row itself; anything else poisons the transaction.
fn is_row_level(e: &postgres::Error) -> bool {
    e.code()
        .map(|state| {
            let code = state.code();
            code.starts_with("22") || code.starts_with("23")
        })
        .unwrap_or(false)
}

fn station_from_row(row: &Row) -> Result<GasStation, RepositoryError> {
    let object_id: i64 = row.get("object_id");
    let longitude: f64 = row.get("longitude");
    let latitude: f64 = row.get("latitude");
    let coordinates = Coordinates::new(longitude, latitude).map_err(|e| {
        RepositoryError::PersistenceFailure(format!("stored station {} is corrupt: {}", object_id, e))
    })?;
    Ok(GasStation::new(object_id, row.get::<_, String>("adresse"), coordinates))
}

impl PostgisStationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn connection(&self) -> Result<PooledClient, RepositoryError> {
        self.pool
            .get()
            .map_err(|e| RepositoryError::PersistenceFailure(format!("no database connection available: {}", e)))
    }

    /// Number of rows whose stored geometry disagrees with their scalar
    /// coordinates. Zero whenever every write went through `upsert`.
    pub fn geometry_drift(&self) -> Result<i64, RepositoryError> {
        let mut client = self.connection()?;
        let row = client
            .query_one(GEOMETRY_DRIFT_SQL, &[&WGS84_SRID])
            .map_err(persistence)?;
        Ok(row.get(0))
    }

    /// Applies one station inside its own savepoint so a row-level failure
    /// can be rolled back without losing the rest of the batch.
    fn upsert_row(
        tx: &mut Transaction<'_>,
        statement: &Statement,
        station: &GasStation,
    ) -> Result<RowOutcome, RepositoryError> {
        let mut savepoint = tx.savepoint("station_row").map_err(persistence)?;

        let result = savepoint.execute(
            statement,
            &[
                &station.object_id,
                &station.address,
                &station.longitude(),
                &station.latitude(),
            ],
        );

        match result {
            Ok(_) => {
                savepoint.commit().map_err(persistence)?;
                Ok(RowOutcome::Applied)
            }
            Err(e) if is_row_level(&e) => {
                savepoint.rollback().map_err(persistence)?;
                Ok(RowOutcome::Skipped(SkippedStation {
                    object_id: station.object_id,
                    reason: e.to_string(),
                }))
            }
            Err(e) => Err(persistence(e)),
        }
    }
}

impl StationRepository for PostgisStationRepository {
    fn check_ready(&self) -> Result<(), RepositoryError> {
        let mut client = self.connection()?;
        db::verify_ready(&mut client)?;
        Ok(())
    }

    fn upsert(&self, stations: &[GasStation]) -> Result<UpsertReport, RepositoryError> {
        let mut client = self.connection()?;
        let mut tx = client.transaction().map_err(persistence)?;
        let statement = tx.prepare(UPSERT_SQL).map_err(persistence)?;

        // An early return drops `tx`, which rolls the whole batch back.
        let report = stations
            .iter()
            .try_fold(UpsertReport::default(), |report, station| {
                Self::upsert_row(&mut tx, &statement, station).map(|outcome| report.with(outcome))
            })?;

        tx.commit().map_err(persistence)?;
        tracing::debug!(
            imported = report.imported,
            skipped = report.skipped,
            "Committed station batch"
        );
        Ok(report)
    }

    fn nearby(
        &self,
        center: Coordinates,
        radius: SearchRadius,
    ) -> Result<Vec<StationWithDistance>, RepositoryError> {
        let mut client = self.connection()?;
        let rows = client
            .query(
                NEARBY_SQL,
                &[&center.longitude(), &center.latitude(), &radius.meters()],
            )
            .map_err(persistence)?;

        rows.iter()
            .map(|row| {
                Ok(StationWithDistance {
                    station: station_from_row(row)?,
                    distance_km: row.get("distance_km"),
                })
            })
            .collect()
    }

    fn all(&self) -> Result<Vec<GasStation>, RepositoryError> {
        let mut client = self.connection()?;
        let rows = client.query(ALL_SQL, &[]).map_err(persistence)?;
        rows.iter().map(station_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_recomputes_geometry_on_conflict() {
        assert!(UPSERT_SQL.contains("ON CONFLICT (object_id) DO UPDATE"));
        assert!(UPSERT_SQL.contains(
            "geometry = ST_SetSRID(ST_MakePoint(EXCLUDED.longitude, EXCLUDED.latitude), 4326)"
        ));
    }

    #[test]
    fn test_nearby_uses_geography_and_stable_order() {
        assert!(NEARBY_SQL.contains("::geography"));
        assert!(NEARBY_SQL.contains("ST_DWithin"));
        assert!(NEARBY_SQL.trim_end().ends_with("ORDER BY distance_km, object_id"));
    }
}
