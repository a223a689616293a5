//! Bounded concurrent fan-out of cell scans.
//!
//! A query's cells go into a job queue drained by at most
//! `max_scan_concurrency` named worker threads. Workers report back on a
//! single event channel; the calling thread is the only one that
//! accumulates results, so no result state is shared between workers.
//!
//! Workers are detached rather than scoped: when the query fails, times out
//! or is cancelled, the collector cancels the query's token and drops the
//! event receiver. Workers stop at their next check and any result still in
//! flight is discarded by a failed send. A store call that never returns
//! only strands its own worker.

use crate::compute::covering::Cell;
use crate::error::{GeoError, Result};
use crate::index::{CallContext, CancellationToken};
use crossbeam_channel::{RecvTimeoutError, unbounded};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest the collector blocks before re-checking cancellation and
/// timeouts.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

enum Event<R> {
    Started(usize),
    Finished(usize, Result<R>),
}

/// Fan-out limits for one query.
#[derive(Debug, Clone, Copy)]
pub struct FanOutOptions {
    pub max_concurrency: usize,
    /// Per-scan timeout, measured from the moment a worker picks the cell up.
    pub scan_timeout: Option<Duration>,
}

/// Run `scan` over every cell and return the results in cell order.
///
/// Fails with the first scan failure wrapped in `PartialCoverFailure`,
/// with `Cancelled` when `cancel` fires, or with `WorkerPool` if workers
/// could not be started or died.
pub fn fan_out<R, F>(
    cells: Vec<Cell>,
    options: FanOutOptions,
    cancel: &CancellationToken,
    scan: F,
) -> Result<Vec<R>>
where
    R: Send + 'static,
    F: Fn(&Cell, &CallContext) -> Result<R> + Send + Sync + 'static,
{
    if cancel.is_cancelled() {
        return Err(GeoError::Cancelled);
    }
    if cells.is_empty() {
        return Ok(Vec::new());
    }

    let query_token = cancel.child_token();

    if cells.len() == 1 && options.scan_timeout.is_none() {
        let ctx = CallContext::new(query_token, None);
        return match scan(&cells[0], &ctx) {
            Ok(result) => Ok(vec![result]),
            Err(e) => Err(failure(&cells[0], e, cancel)),
        };
    }

    let cells: Arc<[Cell]> = cells.into();
    let scan = Arc::new(scan);
    let workers = options.max_concurrency.clamp(1, cells.len());

    let (job_tx, job_rx) = unbounded::<usize>();
    for idx in 0..cells.len() {
        // The receiver is alive until the end of this function.
        let _ = job_tx.send(idx);
    }
    drop(job_tx);

    let (event_tx, event_rx) = unbounded::<Event<R>>();
    for worker in 0..workers {
        let jobs = job_rx.clone();
        let events = event_tx.clone();
        let cells = Arc::clone(&cells);
        let scan = Arc::clone(&scan);
        let token = query_token.clone();
        let timeout = options.scan_timeout;

        let spawned = thread::Builder::new()
            .name(format!("geokv-scan-{}", worker))
            .spawn(move || {
                while let Ok(idx) = jobs.recv() {
                    if token.is_cancelled() || events.send(Event::Started(idx)).is_err() {
                        break;
                    }
                    let ctx = CallContext::new(token.clone(), timeout);
                    let result = scan(&cells[idx], &ctx);
                    if events.send(Event::Finished(idx, result)).is_err() {
                        break;
                    }
                }
            });

        if let Err(e) = spawned {
            query_token.cancel();
            return Err(GeoError::WorkerPool(format!(
                "failed to spawn scan worker {}: {}",
                worker, e
            )));
        }
    }
    drop(event_tx);
    drop(job_rx);

    log::trace!("scanning {} cell(s) on {} worker(s)", cells.len(), workers);

    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(cells.len()).collect();
    let mut in_flight: FxHashMap<usize, Instant> = FxHashMap::default();
    let mut remaining = cells.len();

    while remaining > 0 {
        if cancel.is_cancelled() {
            query_token.cancel();
            return Err(GeoError::Cancelled);
        }

        let now = Instant::now();
        let mut wait = POLL_INTERVAL;
        if let Some(timeout) = options.scan_timeout {
            if let Some((&idx, _)) = in_flight
                .iter()
                .find(|(_, started)| now.duration_since(**started) > timeout)
            {
                query_token.cancel();
                log::warn!("{} exceeded scan timeout of {:?}", cells[idx], timeout);
                return Err(GeoError::PartialCoverFailure {
                    cell: cells[idx],
                    source: Box::new(GeoError::ScanTimeout(timeout)),
                });
            }
            if let Some(earliest) = in_flight.values().min() {
                let until_expiry = (*earliest + timeout).saturating_duration_since(now);
                wait = wait.min(until_expiry + Duration::from_millis(1));
            }
        }

        match event_rx.recv_timeout(wait) {
            Ok(Event::Started(idx)) => {
                in_flight.insert(idx, Instant::now());
            }
            Ok(Event::Finished(idx, Ok(result))) => {
                in_flight.remove(&idx);
                results[idx] = Some(result);
                remaining -= 1;
            }
            Ok(Event::Finished(idx, Err(e))) => {
                query_token.cancel();
                return Err(failure(&cells[idx], e, cancel));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                query_token.cancel();
                return Err(GeoError::WorkerPool(format!(
                    "scan workers exited with {} cell(s) outstanding",
                    remaining
                )));
            }
        }
    }

    results
        .into_iter()
        .map(|r| r.ok_or_else(|| GeoError::WorkerPool("missing scan result".into())))
        .collect()
}

/// Attribute a scan error to its cell. Cancellation requested by the
/// caller is reported as such rather than as a cell failure.
fn failure(cell: &Cell, error: GeoError, caller: &CancellationToken) -> GeoError {
    if matches!(error, GeoError::Cancelled) && caller.is_cancelled() {
        return GeoError::Cancelled;
    }
    log::debug!("{} failed: {}", cell, error);
    GeoError::PartialCoverFailure {
        cell: *cell,
        source: Box::new(error),
    }
}
