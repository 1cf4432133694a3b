/// Integration tests for the PostGIS station store
///
/// Exercises `PostgisStationRepository` against a real database: the
/// readiness probe, idempotent upserts, batch atomicity, geometry
/// consistency and the geography-based radius query.
///
/// Prerequisites:
/// - PostgreSQL with the PostGIS extension available
/// - DATABASE_URL set in .env
/// - sql/001_gas_stations.sql applied
///
/// Run with: cargo test --test postgres_repository -- --ignored --test-threads=1

use gas_station_service::db;
use gas_station_service::model::{Coordinates, GasStation, SearchRadius};
use gas_station_service::repository::{PostgisStationRepository, RepositoryError, StationRepository};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Test rows live in their own id range so real data is never touched.
const TEST_ID_BASE: i64 = 9_900_000;

fn setup_repository() -> (PostgisStationRepository, db::PgPool) {
    let pool = db::connect_pool(2).expect("DATABASE_URL must point at a reachable database");
    cleanup_test_data(&pool);
    (PostgisStationRepository::new(pool.clone()), pool)
}

/// Repository whose connections give up on row locks after 200 ms
/// (SQLSTATE 55P03) instead of waiting.
fn impatient_repository() -> PostgisStationRepository {
    let url = db::database_url().expect("DATABASE_URL must be set");
    let separator = if url.contains('?') { '&' } else { '?' };
    let url = format!("{}{}options=-c%20lock_timeout%3D200", url, separator);
    PostgisStationRepository::new(db::create_pool(&url, 1).expect("Failed to build pool"))
}

fn cleanup_test_data(pool: &db::PgPool) {
    let mut client = pool.get().expect("Failed to get connection");
    let _ = client.execute(
        "DELETE FROM gas_stations WHERE object_id >= $1 AND object_id < $2",
        &[&TEST_ID_BASE, &(TEST_ID_BASE + 1000)],
    );
}

fn station(offset: i64, address: &str, lon: f64, lat: f64) -> GasStation {
    GasStation::new(TEST_ID_BASE + offset, address, Coordinates::new(lon, lat).unwrap())
}

fn test_rows(repo: &PostgisStationRepository) -> Vec<GasStation> {
    repo.all()
        .unwrap()
        .into_iter()
        .filter(|s| s.object_id >= TEST_ID_BASE && s.object_id < TEST_ID_BASE + 1000)
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Schema Readiness
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_migrated_database_is_ready() {
    let (repo, _) = setup_repository();
    repo.check_ready().expect("Migrated database should pass the readiness probe");
}

// ---------------------------------------------------------------------------
// 2. Upserts
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_upsert_is_idempotent() {
    let (repo, pool) = setup_repository();
    let batch = vec![
        station(1, "Komödienstraße 2", 6.9583, 50.9413),
        station(2, "Rheinuferstraße 14", 6.9700, 50.9300),
    ];

    let first = repo.upsert(&batch).unwrap();
    assert_eq!(first.imported, 2);
    let before = test_rows(&repo);

    let second = repo.upsert(&batch).unwrap();
    assert_eq!(second.imported + second.skipped, batch.len());
    assert_eq!(test_rows(&repo), before);

    cleanup_test_data(&pool);
}

#[test]
#[ignore]
fn test_conflict_updates_fields_and_geometry() {
    let (repo, pool) = setup_repository();
    repo.upsert(&[station(3, "Alte Adresse 1", 6.90, 50.90)]).unwrap();
    repo.upsert(&[station(3, "Neue Adresse 2", 6.95, 50.95)]).unwrap();

    let rows = test_rows(&repo);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].address, "Neue Adresse 2");
    assert_eq!(rows[0].longitude(), 6.95);
    assert_eq!(rows[0].latitude(), 50.95);
    assert_eq!(repo.geometry_drift().unwrap(), 0);

    cleanup_test_data(&pool);
}

#[test]
#[ignore]
fn test_row_level_violation_is_skipped() {
    let (repo, pool) = setup_repository();
    // Text columns reject NUL bytes with a class 22 error
    let report = repo
        .upsert(&[
            station(4, "Gültig 1", 6.95, 50.94),
            station(5, "Kaputt\0Straße", 6.95, 50.94),
            station(6, "Gültig 2", 6.96, 50.94),
        ])
        .unwrap();

    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.skipped_stations[0].object_id, TEST_ID_BASE + 5);

    let ids: Vec<i64> = test_rows(&repo).iter().map(|s| s.object_id).collect();
    assert_eq!(ids, vec![TEST_ID_BASE + 4, TEST_ID_BASE + 6]);

    cleanup_test_data(&pool);
}

#[test]
#[ignore]
fn test_mid_batch_lock_failure_rolls_back_whole_batch() {
    let (repo, pool) = setup_repository();
    repo.upsert(&[station(20, "Gesperrt 1", 6.95, 50.94)]).unwrap();

    // Hold the row lock on +20 from a second connection
    let mut locker = pool.get().expect("Failed to get connection");
    let mut lock_tx = locker.transaction().unwrap();
    lock_tx
        .execute(
            "SELECT 1 FROM gas_stations WHERE object_id = $1 FOR UPDATE",
            &[&(TEST_ID_BASE + 20)],
        )
        .unwrap();

    let impatient = impatient_repository();
    let result = impatient.upsert(&[
        station(21, "Neu 1", 6.96, 50.94),
        station(20, "Gesperrt 2", 6.97, 50.94),
        station(22, "Neu 2", 6.98, 50.94),
    ]);
    lock_tx.rollback().unwrap();
    drop(locker);

    assert!(
        matches!(result, Err(RepositoryError::PersistenceFailure(_))),
        "got {:?}",
        result
    );
    let rows = test_rows(&repo);
    let ids: Vec<i64> = rows.iter().map(|s| s.object_id).collect();
    assert_eq!(ids, vec![TEST_ID_BASE + 20]);
    assert_eq!(rows[0].address, "Gesperrt 1");

    cleanup_test_data(&pool);
}

// ---------------------------------------------------------------------------
// 3. Radius Queries
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_nearby_orders_by_geodesic_distance() {
    let (repo, pool) = setup_repository();
    // Due north of the query point at ~0.5, ~1.5 and ~3 km
    let meters_per_degree_lat = 111_248.6;
    let lat_at = |km: f64| 50.9413 + km * 1000.0 / meters_per_degree_lat;
    repo.upsert(&[
        station(10, "Drei", 6.9583, lat_at(3.0)),
        station(11, "Halb", 6.9583, lat_at(0.5)),
        station(12, "Anderthalb", 6.9583, lat_at(1.5)),
    ])
    .unwrap();

    let center = Coordinates::new(6.9583, 50.9413).unwrap();
    let results: Vec<_> = repo
        .nearby(center, SearchRadius::from_km(2.0).unwrap())
        .unwrap()
        .into_iter()
        .filter(|r| r.station.object_id >= TEST_ID_BASE)
        .collect();

    let ids: Vec<i64> = results.iter().map(|r| r.station.object_id).collect();
    assert_eq!(ids, vec![TEST_ID_BASE + 11, TEST_ID_BASE + 12]);
    assert!((results[0].distance_km - 0.5).abs() < 0.01, "got {}", results[0].distance_km);
    assert!((results[1].distance_km - 1.5).abs() < 0.01, "got {}", results[1].distance_km);

    cleanup_test_data(&pool);
}

#[test]
#[ignore]
fn test_nearby_without_matches_is_empty() {
    let (repo, _) = setup_repository();
    let middle_of_atlantic = Coordinates::new(-30.0, 30.0).unwrap();
    let results = repo
        .nearby(middle_of_atlantic, SearchRadius::from_km(1.0).unwrap())
        .unwrap();
    assert!(results.is_empty());
}

#[test]
#[ignore]
fn test_station_exactly_at_radius_is_included() {
    let (repo, pool) = setup_repository();
    let target = station(30, "Am Rand 1", 6.9583, 50.9503);
    repo.upsert(&[target.clone()]).unwrap();

    let center = Coordinates::new(6.9583, 50.9413).unwrap();
    let mut client = pool.get().expect("Failed to get connection");
    let row = client
        .query_one(
            "SELECT ST_Distance(
                 ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
                 ST_SetSRID(ST_MakePoint($3, $4), 4326)::geography)",
            &[
                &center.longitude(),
                &center.latitude(),
                &target.longitude(),
                &target.latitude(),
            ],
        )
        .unwrap();
    let exact_meters: f64 = row.get(0);

    let at_boundary: Vec<i64> = repo
        .nearby(center, SearchRadius::from_meters(exact_meters).unwrap())
        .unwrap()
        .iter()
        .map(|r| r.station.object_id)
        .filter(|id| *id >= TEST_ID_BASE)
        .collect();
    assert_eq!(at_boundary, vec![TEST_ID_BASE + 30]);

    let one_meter_short: Vec<i64> = repo
        .nearby(center, SearchRadius::from_meters(exact_meters - 1.0).unwrap())
        .unwrap()
        .iter()
        .map(|r| r.station.object_id)
        .filter(|id| *id >= TEST_ID_BASE)
        .collect();
    assert!(one_meter_short.is_empty());

    cleanup_test_data(&pool);
}
