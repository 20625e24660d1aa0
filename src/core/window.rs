//! Window accumulation and the undelivered backlog.
//!
//! Events are counted into fixed-size windows whose boundaries are aligned to
//! the Unix epoch, so a window always starts at a whole multiple of the window
//! size no matter when the process came up. Closed windows sit in the backlog
//! until the remote store confirms them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One time bucket of counted events covering `[start, start + window size)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Start of the bucket, aligned to the window size
    pub start: DateTime<Utc>,
    /// Events observed inside the bucket
    pub count: u64,
    /// Set once the window has been superseded; closed windows are immutable
    closed: bool,
}

impl Window {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            count: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn record_event(&mut self) {
        debug_assert!(!self.closed, "closed windows are immutable");
        self.count += 1;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Align a timestamp down to the nearest window boundary.
pub fn align(now: DateTime<Utc>, window_secs: i64) -> DateTime<Utc> {
    let secs = now.timestamp();
    let aligned = secs - secs.rem_euclid(window_secs);
    Utc.timestamp_opt(aligned, 0).unwrap()
}

/// Owns the current open window and the backlog of closed, undelivered ones.
///
/// The backlog is ordered oldest first and never reordered. A window enters
/// it exactly once (on close) and leaves exactly once (on confirmed
/// delivery).
pub struct Aggregator {
    window_secs: i64,
    open: Window,
    backlog: Vec<Window>,
}

impl Aggregator {
    pub fn new(window_size: Duration, now: DateTime<Utc>) -> Self {
        let window_secs = window_size.as_secs() as i64;
        Self {
            window_secs,
            open: Window::new(align(now, window_secs)),
            backlog: Vec::new(),
        }
    }

    /// Fold one poll-tick observation into the open window.
    ///
    /// Boundary crossings are checked first, against wall-clock rather than
    /// elapsed ticks: if the process stalled across several boundaries, each
    /// missed window is closed (empty or not) and queued in order before the
    /// event is counted. Returns how many windows were closed by this call.
    pub fn observe(&mut self, event: bool, now: DateTime<Utc>) -> usize {
        let closed = self.roll_forward(now);
        if event {
            self.open.record_event();
        }
        closed
    }

    /// Close every window whose boundary `now` has passed.
    ///
    /// Empty windows are closed and queued too: a flush is a time-based
    /// obligation, not a content-based one. The successor window starts at
    /// the boundary just crossed, not at `now`, keeping buckets
    /// calendar-aligned regardless of scheduler jitter.
    fn roll_forward(&mut self, now: DateTime<Utc>) -> usize {
        let mut closed = 0;
        loop {
            let boundary = self.open.start + chrono::Duration::seconds(self.window_secs);
            if now < boundary {
                return closed;
            }
            let mut superseded = std::mem::replace(&mut self.open, Window::new(boundary));
            superseded.close();
            self.backlog.push(superseded);
            closed += 1;
        }
    }

    /// The closed, undelivered windows, oldest first.
    pub fn backlog(&self) -> &[Window] {
        &self.backlog
    }

    /// Read-only copy of the backlog for a delivery attempt.
    pub fn snapshot(&self) -> Vec<Window> {
        self.backlog.clone()
    }

    /// Remove the given windows from the backlog, matched by start.
    ///
    /// Called only after a confirmed successful delivery. Idempotent:
    /// removing a window that is no longer present is a no-op, and windows
    /// closed after the snapshot was taken are untouched.
    pub fn confirm_delivered(&mut self, delivered: &[Window]) {
        self.backlog
            .retain(|w| !delivered.iter().any(|d| d.start == w.start));
    }

    /// The window currently accumulating events.
    pub fn open_window(&self) -> &Window {
        &self.open
    }

    /// Total events still held locally (open window plus backlog).
    pub fn pending_events(&self) -> u64 {
        self.open.count + self.backlog.iter().map(|w| w.count).sum::<u64>()
    }

    /// Close the open window ahead of its boundary and queue it if it holds
    /// any events. Shutdown only; a partial empty window is not a due bucket
    /// and is dropped.
    pub fn close_open(&mut self) {
        let boundary = self.open.start + chrono::Duration::seconds(self.window_secs);
        let mut partial = std::mem::replace(&mut self.open, Window::new(boundary));
        if partial.count > 0 {
            partial.close();
            self.backlog.push(partial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_alignment_to_epoch_multiples() {
        assert_eq!(align(at(0), 60), at(0));
        assert_eq!(align(at(59), 60), at(0));
        assert_eq!(align(at(60), 60), at(60));
        assert_eq!(align(at(125), 60), at(120));
    }

    #[test]
    fn test_open_window_starts_aligned_regardless_of_startup_time() {
        let agg = Aggregator::new(Duration::from_secs(60), at(1_000_000_037));
        assert_eq!(agg.open_window().start.timestamp() % 60, 0);
    }

    #[test]
    fn test_events_accumulate_in_open_window() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        agg.observe(true, at(5));
        agg.observe(false, at(6));
        agg.observe(true, at(40));
        assert_eq!(agg.open_window().count, 2);
        assert!(agg.backlog().is_empty());
    }

    #[test]
    fn test_boundary_closes_window_into_backlog() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        agg.observe(true, at(5));
        let closed = agg.observe(true, at(61));
        assert_eq!(closed, 1);
        assert_eq!(agg.backlog().len(), 1);
        assert_eq!(agg.backlog()[0].start, at(0));
        assert_eq!(agg.backlog()[0].count, 1);
        assert!(agg.backlog()[0].is_closed());
        // The event at t=61 landed in the successor window.
        assert_eq!(agg.open_window().start, at(60));
        assert_eq!(agg.open_window().count, 1);
    }

    #[test]
    fn test_empty_windows_still_close_on_schedule() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        let closed = agg.observe(false, at(61));
        assert_eq!(closed, 1);
        assert_eq!(agg.backlog()[0].count, 0);
    }

    #[test]
    fn test_stall_across_two_boundaries_queues_both_windows_in_order() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        agg.observe(true, at(5));
        // Process stalls; next observe arrives after two boundaries.
        let closed = agg.observe(true, at(130));
        assert_eq!(closed, 2);
        let starts: Vec<i64> = agg.backlog().iter().map(|w| w.start.timestamp()).collect();
        assert_eq!(starts, vec![0, 60]);
        assert_eq!(agg.backlog()[0].count, 1);
        assert_eq!(agg.backlog()[1].count, 0);
        assert_eq!(agg.open_window().start, at(120));
    }

    #[test]
    fn test_confirm_delivered_is_idempotent() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        agg.observe(true, at(5));
        agg.observe(false, at(61));
        agg.observe(false, at(121));

        let snapshot = agg.snapshot();
        assert_eq!(snapshot.len(), 2);

        agg.confirm_delivered(&snapshot);
        assert!(agg.backlog().is_empty());

        // Second confirm with the same set changes nothing.
        agg.confirm_delivered(&snapshot);
        assert!(agg.backlog().is_empty());
    }

    #[test]
    fn test_confirm_leaves_windows_closed_after_snapshot() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        agg.observe(true, at(5));
        agg.observe(false, at(61));
        let snapshot = agg.snapshot();

        // A further window closes after the snapshot was taken.
        agg.observe(true, at(125));
        agg.observe(false, at(181));
        assert_eq!(agg.backlog().len(), 3);

        agg.confirm_delivered(&snapshot);
        let starts: Vec<i64> = agg.backlog().iter().map(|w| w.start.timestamp()).collect();
        assert_eq!(starts, vec![60, 120]);
    }

    #[test]
    fn test_pending_events_conserved_until_confirm() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        let mut observed = 0u64;
        for t in 0..200 {
            let event = t % 3 == 0;
            agg.observe(event, at(t));
            if event {
                observed += 1;
            }
        }
        assert_eq!(agg.pending_events(), observed);
    }

    #[test]
    fn test_close_open_queues_only_nonempty_partials() {
        let mut agg = Aggregator::new(Duration::from_secs(60), at(0));
        agg.close_open();
        assert!(agg.backlog().is_empty());

        agg.observe(true, at(5));
        agg.close_open();
        assert_eq!(agg.backlog().len(), 1);
        assert_eq!(agg.backlog()[0].count, 1);
    }
}
