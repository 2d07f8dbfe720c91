//! Ingestion scheduler background task
//!
//! Wakes on fixed wall-clock boundaries (every `interval_minutes`, counted
//! from the Unix epoch in UTC), runs one fetch-then-store cycle, records the
//! outcome and goes back to sleep. A failed or panicking cycle never ends the
//! loop. Stopping only prevents the next cycle; one already running finishes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::ingest::{FailureReason, IngestOutcome, IngestPipeline};

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_minutes: u32,
    pub last_run_time: Option<DateTime<Utc>>,
    pub next_run_time: Option<DateTime<Utc>>,
    pub last_result: Option<IngestOutcome>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    last_run_time: Option<DateTime<Utc>>,
    next_run_time: Option<DateTime<Utc>>,
    last_result: Option<IngestOutcome>,
}

struct LoopHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Inner {
    pipeline: IngestPipeline,
    interval_minutes: u32,
    run_on_start: bool,
    state: Mutex<SchedulerState>,
    handle: Mutex<Option<LoopHandle>>,
}

/// Cheap to clone; all clones control the same loop.
#[derive(Clone)]
pub struct IngestionScheduler {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// First boundary strictly after `now`, boundaries being multiples of
/// `interval` since the Unix epoch.
pub fn next_boundary(now: DateTime<Utc>, interval: chrono::Duration) -> DateTime<Utc> {
    let step = interval.num_milliseconds().max(1);
    let next_ms = (now.timestamp_millis().div_euclid(step) + 1) * step;
    DateTime::from_timestamp_millis(next_ms).unwrap_or(now + interval)
}

impl IngestionScheduler {
    pub fn new(pipeline: IngestPipeline, interval_minutes: u32, run_on_start: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                interval_minutes,
                run_on_start,
                state: Mutex::new(SchedulerState::default()),
                handle: Mutex::new(None),
            }),
        }
    }

    /// Start the poll loop. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut handle = lock(&self.inner.handle);
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            info!("Ingestion scheduler already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { run_loop(inner, stop_rx).await });
        *handle = Some(LoopHandle { stop_tx, task });
        true
    }

    /// Ask the loop to stop. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        self.signal_stop().is_some()
    }

    /// Stop and wait for the loop, including any cycle in flight, to finish.
    pub async fn shutdown(&self) {
        if let Some(task) = self.signal_stop() {
            if let Err(e) = task.await {
                warn!(error = %e, "ingestion scheduler task ended abnormally");
            }
        }
    }

    fn signal_stop(&self) -> Option<JoinHandle<()>> {
        let taken = lock(&self.inner.handle).take()?;
        // the loop may already be gone; nothing to signal then
        let _ = taken.stop_tx.send(true);
        lock(&self.inner.state).next_run_time = None;
        info!("Ingestion scheduler stop requested");
        Some(taken.task)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.handle)
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    pub fn status(&self) -> SchedulerStatus {
        let running = self.is_running();
        let state = lock(&self.inner.state);
        SchedulerStatus {
            running,
            interval_minutes: self.inner.interval_minutes,
            last_run_time: state.last_run_time,
            next_run_time: if running { state.next_run_time } else { None },
            last_result: state.last_result.clone(),
        }
    }

    /// Ad-hoc cycle, safe to interleave with the scheduled loop.
    pub async fn run_once(&self) -> IngestOutcome {
        run_cycle(&self.inner).await
    }
}

impl Inner {
    fn interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.interval_minutes))
    }
}

async fn run_loop(inner: Arc<Inner>, mut stop_rx: watch::Receiver<bool>) {
    info!(
        "Ingestion scheduler started (interval: {}m)",
        inner.interval_minutes
    );

    if inner.run_on_start {
        run_cycle(&inner).await;
    }

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let next = next_boundary(Utc::now(), inner.interval());
        lock(&inner.state).next_run_time = Some(next);
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            // a closed channel means every handle is gone
            _ = stop_rx.changed() => break,
        }

        run_cycle(&inner).await;
    }

    lock(&inner.state).next_run_time = None;
    info!("Ingestion scheduler stopped");
}

async fn run_cycle(inner: &Arc<Inner>) -> IngestOutcome {
    let started = Utc::now();
    let pipeline = inner.pipeline.clone();

    // Own task so a panic surfaces as a JoinError instead of killing the loop
    let outcome = match tokio::spawn(async move { pipeline.run_once().await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "ingestion cycle panicked");
            IngestOutcome::error(None, FailureReason::Internal, e.to_string())
        }
    };

    match &outcome {
        IngestOutcome::Success { external_id } => {
            info!(external_id, "ingestion cycle stored a new reading")
        }
        IngestOutcome::Duplicate { external_id } => {
            info!(external_id, "ingestion cycle found no new reading")
        }
        IngestOutcome::Error {
            reason, message, ..
        } => warn!(?reason, %message, "ingestion cycle failed"),
    }

    let mut state = lock(&inner.state);
    state.last_run_time = Some(started);
    state.last_result = Some(outcome.clone());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn test_boundary_aligns_to_wall_clock() {
        let five = chrono::Duration::minutes(5);
        assert_eq!(next_boundary(at(12, 1, 30), five), at(12, 5, 0));
        assert_eq!(next_boundary(at(12, 4, 59), five), at(12, 5, 0));
    }

    #[test]
    fn test_boundary_on_the_mark_moves_forward() {
        let five = chrono::Duration::minutes(5);
        assert_eq!(next_boundary(at(12, 5, 0), five), at(12, 10, 0));
    }

    #[test]
    fn test_boundary_rolls_over_hour_and_day() {
        let five = chrono::Duration::minutes(5);
        assert_eq!(next_boundary(at(12, 58, 0), five), at(13, 0, 0));
        assert_eq!(
            next_boundary(at(23, 57, 12), five),
            Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_boundary_other_intervals() {
        assert_eq!(
            next_boundary(at(12, 1, 30), chrono::Duration::minutes(15)),
            at(12, 15, 0)
        );
        assert_eq!(
            next_boundary(at(12, 1, 30), chrono::Duration::minutes(1)),
            at(12, 2, 0)
        );
    }
}
