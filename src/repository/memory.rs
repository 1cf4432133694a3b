/// In-process station store.
///
/// Mirrors the PostGIS store's semantics closely enough to test the import
/// cycle and the query service without a database:
///
/// - upserts are staged on a copy and swapped in on commit, so readers see
///   either the pre- or post-batch state, never a partial one
/// - rows violating the store's own constraints are skipped, not fatal
/// - distances are geodesic on the WGS84 ellipsoid (`geo`, Karney)
///
/// It also offers fault injection and call counters for tests.

use crate::model::{Coordinates, GasStation, SearchRadius, StationWithDistance};
use crate::repository::{
    RepositoryError, RowOutcome, SkippedStation, StationRepository, UpsertReport, compare_by_distance,
};
use geo::GeodesicDistance;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

pub struct MemoryStationRepository {
    stations: RwLock<BTreeMap<i64, GasStation>>,
    writer: Mutex<()>,
    ready: AtomicBool,
    fail_on_row: Mutex<Option<usize>>,
    upsert_calls: AtomicUsize,
    nearby_calls: AtomicUsize,
}

impl Default for MemoryStationRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStationRepository {
    pub fn new() -> Self {
        Self {
            stations: RwLock::new(BTreeMap::new()),
            writer: Mutex::new(()),
            ready: AtomicBool::new(true),
            fail_on_row: Mutex::new(None),
            upsert_calls: AtomicUsize::new(0),
            nearby_calls: AtomicUsize::new(0),
        }
    }

    /// Makes `check_ready` report a schema mismatch while `false`.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// The next `upsert` aborts with `PersistenceFailure` when it reaches
    /// row `index` (0-based). One-shot.
    pub fn fail_on_row(&self, index: usize) {
        if let Ok(mut slot) = self.fail_on_row.lock() {
            *slot = Some(index);
        }
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn nearby_calls(&self) -> usize {
        self.nearby_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        match self.stations.read() {
            Ok(stations) => stations.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_fault(&self) -> Option<usize> {
        self.fail_on_row.lock().ok().and_then(|mut slot| slot.take())
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::PersistenceFailure("store lock poisoned".to_string())
}

/// Row-level checks equivalent to the table's constraints.
fn check_row(station: &GasStation) -> Result<(), String> {
    Coordinates::new(station.longitude(), station.latitude()).map_err(|e| e.to_string())?;
    if station.address.is_empty() {
        return Err("address must not be empty".to_string());
    }
    if station.address.contains('\0') {
        return Err("address contains a NUL byte".to_string());
    }
    Ok(())
}

impl StationRepository for MemoryStationRepository {
    fn check_ready(&self) -> Result<(), RepositoryError> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::SchemaMismatch("station table not available".to_string()))
        }
    }

    fn upsert(&self, stations: &[GasStation]) -> Result<UpsertReport, RepositoryError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let _writer = self.writer.lock().map_err(poisoned)?;

        let mut staged = self.stations.read().map_err(poisoned)?.clone();
        let fault = self.take_fault();

        let report = stations
            .iter()
            .enumerate()
            .try_fold(UpsertReport::default(), |report, (index, station)| {
                if fault == Some(index) {
                    return Err(RepositoryError::PersistenceFailure(format!(
                        "simulated fault at row {}",
                        index
                    )));
                }
                let outcome = match check_row(station) {
                    Ok(()) => {
                        staged.insert(station.object_id, station.clone());
                        RowOutcome::Applied
                    }
                    Err(reason) => RowOutcome::Skipped(SkippedStation {
                        object_id: station.object_id,
                        reason,
                    }),
                };
                Ok(report.with(outcome))
            })?;

        *self.stations.write().map_err(poisoned)? = staged;
        Ok(report)
    }

    fn nearby(
        &self,
        center: Coordinates,
        radius: SearchRadius,
    ) -> Result<Vec<StationWithDistance>, RepositoryError> {
        self.nearby_calls.fetch_add(1, Ordering::SeqCst);
        let origin = center.to_point();
        let stations = self.stations.read().map_err(poisoned)?;

        let mut results: Vec<StationWithDistance> = stations
            .values()
            .map(|station| StationWithDistance {
                distance_km: origin.geodesic_distance(&station.geometry()) / 1000.0,
                station: station.clone(),
            })
            .filter(|s| s.distance_km <= radius.km())
            .collect();

        results.sort_by(compare_by_distance);
        Ok(results)
    }

    fn all(&self) -> Result<Vec<GasStation>, RepositoryError> {
        let stations = self.stations.read().map_err(poisoned)?;
        Ok(stations.values().cloned().collect())
    }
}
