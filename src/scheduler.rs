/// Periodic import trigger.
///
/// Runs one import immediately on start, then one per interval, measured
/// start-to-start. A cycle that overruns the interval is followed by the
/// next one right away; ticks are never stacked. Failures are logged by the
/// importer and never stop the schedule.

use crate::importer::{ImportError, Importer};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct ImportScheduler;

/// Owns the scheduler thread. Dropping the handle stops the schedule.
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ImportScheduler {
    pub fn start(importer: Arc<Importer>, interval: Duration) -> std::io::Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("import-scheduler".to_string())
            .spawn(move || {
                tracing::info!("Import scheduler started, interval {:?}", interval);
                loop {
                    let started = Instant::now();
                    match importer.run_cycle() {
                        Ok(_) => {}
                        Err(ImportError::AlreadyRunning) => {
                            tracing::info!("Scheduled import skipped, another import is running");
                        }
                        // Already logged with its phase by the importer
                        Err(_) => {}
                    }

                    let wait = interval.saturating_sub(started.elapsed());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::info!("Import scheduler stopped");
            })?;

        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

impl SchedulerHandle {
    /// Stops the schedule and waits for an in-flight cycle to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Blocks for as long as the scheduler runs.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Import scheduler thread panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Import scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
