/// Import cycle orchestration.
///
/// One cycle walks `Validating → Fetching → Transforming → Persisting` and
/// ends in `Done` or `Failed`:
///
/// 1. Validating   - repository readiness probe; failure ends the cycle
/// 2. Fetching     - single attempt against the feed, no retries here
/// 3. Transforming - per-record outcomes, never fatal
/// 4. Persisting   - one atomic upsert; skipped when nothing is valid
///
/// Cycles are serialised through a single import slot. A trigger arriving
/// while a cycle is in flight is refused with `ImportError::AlreadyRunning`
/// rather than queued; the scheduler's next tick gets a fresh attempt.

use crate::ingest::feed::{FeatureSource, SourceError};
use crate::ingest::transform::{self, Rejection, TransformOutcome};
use crate::repository::{RepositoryError, StationRepository, UpsertReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, TryLockError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Validating,
    Fetching,
    Transforming,
    Persisting,
    Done,
    Failed,
}

/// Cycle-fatal failures. Per-record problems never show up here; they are
/// counted in `ImportSummary`.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("an import cycle is already running")]
    AlreadyRunning,
    #[error("store not ready: {0}")]
    Readiness(#[source] RepositoryError),
    #[error("fetch failed: {0}")]
    Fetch(#[source] SourceError),
    #[error("persisting stations failed: {0}")]
    Persist(#[source] RepositoryError),
}

impl ImportError {
    /// Phase in which the cycle stopped. `None` for a refused trigger, which
    /// never started a cycle of its own.
    pub fn phase(&self) -> Option<CyclePhase> {
        match self {
            ImportError::AlreadyRunning => None,
            ImportError::Readiness(_) => Some(CyclePhase::Validating),
            ImportError::Fetch(_) => Some(CyclePhase::Fetching),
            ImportError::Persist(_) => Some(CyclePhase::Persisting),
        }
    }
}

/// Result of one successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    /// Features received from upstream.
    pub fetched: usize,
    /// Features that became valid stations.
    pub valid: usize,
    pub rejected: Vec<Rejection>,
    pub report: UpsertReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Importer {
    source: Box<dyn FeatureSource>,
    repository: Arc<dyn StationRepository>,
    slot: Mutex<()>,
    phase: Mutex<CyclePhase>,
}

impl Importer {
    pub fn new(source: Box<dyn FeatureSource>, repository: Arc<dyn StationRepository>) -> Self {
        Self {
            source,
            repository,
            slot: Mutex::new(()),
            phase: Mutex::new(CyclePhase::Idle),
        }
    }

    /// Phase of the current or most recent cycle.
    pub fn phase(&self) -> CyclePhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_phase(&self, next: CyclePhase) {
        match self.phase.lock() {
            Ok(mut phase) => *phase = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        tracing::debug!(phase = ?next, "Import phase");
    }

    /// Runs one full cycle if the import slot is free.
    pub fn run_cycle(&self) -> Result<ImportSummary, ImportError> {
        let _slot = match self.slot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                tracing::info!("Import already in flight, trigger ignored");
                return Err(ImportError::AlreadyRunning);
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        tracing::info!("Starting gas station import...");
        let started_at = Utc::now();

        match self.execute(started_at) {
            Ok(summary) => {
                self.set_phase(CyclePhase::Done);
                tracing::info!(
                    fetched = summary.fetched,
                    valid = summary.valid,
                    rejected = summary.rejected.len(),
                    imported = summary.report.imported,
                    skipped = summary.report.skipped,
                    "Import completed successfully"
                );
                Ok(summary)
            }
            Err(e) => {
                self.set_phase(CyclePhase::Failed);
                tracing::error!(phase = ?e.phase(), "Import failed: {}", e);
                Err(e)
            }
        }
    }

    fn execute(&self, started_at: DateTime<Utc>) -> Result<ImportSummary, ImportError> {
        self.set_phase(CyclePhase::Validating);
        self.repository.check_ready().map_err(ImportError::Readiness)?;

        self.set_phase(CyclePhase::Fetching);
        let features = self.source.fetch().map_err(ImportError::Fetch)?;
        tracing::info!("Fetched {} features", features.len());

        self.set_phase(CyclePhase::Transforming);
        let TransformOutcome { stations, rejected } = transform::transform(&features);

        let report = if stations.is_empty() {
            tracing::info!("No valid stations in feed, nothing to persist");
            UpsertReport::default()
        } else {
            self.set_phase(CyclePhase::Persisting);
            tracing::info!("Importing {} gas stations", stations.len());
            self.repository.upsert(&stations).map_err(ImportError::Persist)?
        };

        Ok(ImportSummary {
            fetched: features.len(),
            valid: stations.len(),
            rejected,
            report,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
