//! Flush scheduling and the delivery worker.
//!
//! The control loop calls [`DeliveryScheduler::tick`] once per poll tick. A
//! delivery attempt fires only when wall-clock reaches a flush boundary (a
//! multiple of the flush interval) and the backlog is non-empty. The attempt
//! itself runs on a worker thread so a slow or hung store never stalls
//! sampling; the worker receives a backlog snapshot by value and reports the
//! outcome back over a channel. At most one attempt is in flight at a time —
//! a boundary reached while one is outstanding is skipped and the backlog
//! keeps accumulating.
//!
//! Retry policy is a fixed cadence at the flush interval, no backoff. A
//! failed attempt leaves the backlog untouched, so the retried batch is
//! identical to the failed one plus any windows closed since.

use crate::core::window::{align, Aggregator, Window};
use crate::delivery::{DeliveryError, DeliverySink};
use crate::logfile::SharedEventLog;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Result of one delivery attempt, reported by the worker.
enum FlushOutcome {
    Delivered(Vec<Window>),
    Failed {
        windows: Vec<Window>,
        error: DeliveryError,
    },
}

/// Drives flush attempts on a fixed wall-clock cadence.
pub struct DeliveryScheduler {
    flush_secs: i64,
    next_flush: DateTime<Utc>,
    in_flight: bool,
    job_tx: Option<Sender<Vec<Window>>>,
    outcome_rx: Receiver<FlushOutcome>,
    worker: Option<JoinHandle<()>>,
    log: SharedEventLog,
}

impl DeliveryScheduler {
    /// Spawn the delivery worker and schedule the first flush boundary.
    pub fn spawn(
        sink: impl DeliverySink + 'static,
        flush_interval: Duration,
        now: DateTime<Utc>,
        log: SharedEventLog,
    ) -> Self {
        let flush_secs = flush_interval.as_secs() as i64;
        let (job_tx, job_rx) = unbounded::<Vec<Window>>();
        let (outcome_tx, outcome_rx) = unbounded::<FlushOutcome>();

        let worker = std::thread::spawn(move || {
            for windows in job_rx {
                let outcome = match sink.send(&windows) {
                    Ok(()) => FlushOutcome::Delivered(windows),
                    Err(error) => FlushOutcome::Failed { windows, error },
                };
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
        });

        Self {
            flush_secs,
            next_flush: align(now, flush_secs) + chrono::Duration::seconds(flush_secs),
            in_flight: false,
            job_tx: Some(job_tx),
            outcome_rx,
            worker: Some(worker),
            log,
        }
    }

    /// Called once per poll tick: apply any finished attempt, then fire a new
    /// one if a flush boundary has been reached.
    pub fn tick(&mut self, now: DateTime<Utc>, aggregator: &mut Aggregator) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply(outcome, aggregator);
        }

        if now < self.next_flush {
            return;
        }
        if !self.in_flight && !aggregator.backlog().is_empty() {
            self.dispatch(aggregator);
        }
        // Skipped or not, the boundary has passed.
        while self.next_flush <= now {
            self.next_flush = self.next_flush + chrono::Duration::seconds(self.flush_secs);
        }
    }

    /// Whether a delivery attempt is currently outstanding.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Block until the outstanding attempt reports back, up to `timeout`.
    /// Returns true if an outcome was applied.
    pub fn wait_outcome(&mut self, aggregator: &mut Aggregator, timeout: Duration) -> bool {
        if !self.in_flight {
            return false;
        }
        match self.outcome_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.apply(outcome, aggregator);
                true
            }
            Err(_) => false,
        }
    }

    /// Final flush on shutdown: dispatch whatever is queued, give the worker
    /// `timeout` to report, and let a still-running attempt finish on its own.
    pub fn shutdown(mut self, aggregator: &mut Aggregator, timeout: Duration) {
        if !self.in_flight && !aggregator.backlog().is_empty() {
            self.dispatch(aggregator);
        }
        if self.in_flight && !self.wait_outcome(aggregator, timeout) {
            self.log
                .append("Shutdown with a delivery attempt still in flight.");
        }
        // Closing the job channel ends the worker loop.
        self.job_tx.take();
        if !self.in_flight {
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }

    fn dispatch(&mut self, aggregator: &Aggregator) {
        let snapshot = aggregator.snapshot();
        let events: u64 = snapshot.iter().map(|w| w.count).sum();
        self.log.append(&format!(
            "Flushing {} window(s) holding {} event(s).",
            snapshot.len(),
            events
        ));
        if let Some(ref job_tx) = self.job_tx {
            if job_tx.send(snapshot).is_ok() {
                self.in_flight = true;
            } else {
                self.log.append("Delivery worker is gone; flush dropped.");
            }
        }
    }

    fn apply(&mut self, outcome: FlushOutcome, aggregator: &mut Aggregator) {
        self.in_flight = false;
        match outcome {
            FlushOutcome::Delivered(windows) => {
                self.log
                    .append(&format!("Delivered {} window(s).", windows.len()));
                aggregator.confirm_delivered(&windows);
            }
            FlushOutcome::Failed { windows, error } => {
                let events: u64 = windows.iter().map(|w| w.count).sum();
                self.log.append(&format!(
                    "Failed delivering count of {events}. Will try again in {} seconds. ({error})",
                    self.flush_secs
                ));
            }
        }
    }
}
