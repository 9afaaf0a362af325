//! Progress reporting and cooperative cancellation.
//!
//! Codecs poll their observers between payload blocks; any observer can
//! abort the operation by returning [`Progress::Cancel`], which surfaces as
//! [`EngineError::Cancelled`](crate::error::EngineError::Cancelled) without
//! writing further output.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Verdict returned by an observer after each progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Keep processing.
    Continue,
    /// Abort the operation at the next block boundary.
    Cancel,
}

/// Receives byte-count notifications during encryption and decryption.
///
/// `total` is the expected payload length when known, or `None` when the
/// operation streams without a declared length.
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, processed: u64, total: Option<u64>) -> Progress;
}

impl<F> ProgressObserver for F
where
    F: FnMut(u64, Option<u64>) -> Progress + Send,
{
    fn on_progress(&mut self, processed: u64, total: Option<u64>) -> Progress {
        self(processed, total)
    }
}

/// Thread-safe progress state shared between a codec and a display loop.
///
/// The codec side calls [`advance`](ProgressTracker::advance); any other
/// thread may read [`processed`](ProgressTracker::processed) or request
/// cancellation at any time.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    processed: AtomicU64,
    total: AtomicU64,
    cancelled: AtomicBool,
}

impl ProgressTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records the expected payload length, visible to readers as `total`.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn advance(&self, bytes: u64) {
        self.processed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Requests cancellation; takes effect at the next block boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Builds an observer that feeds this tracker and honours its cancel
    /// flag.
    pub fn observer(self: Arc<Self>) -> Box<dyn ProgressObserver> {
        let tracker = self;
        let mut last = 0u64;
        Box::new(move |processed: u64, total: Option<u64>| {
            if let Some(total) = total {
                tracker.set_total(total);
            }
            tracker.advance(processed.saturating_sub(last));
            last = processed;
            if tracker.is_cancelled() {
                Progress::Cancel
            } else {
                Progress::Continue
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        let mut observer = |processed: u64, _total: Option<u64>| {
            seen_push(&mut seen, processed);
            Progress::Continue
        };
        assert_eq!(observer.on_progress(10, None), Progress::Continue);
        assert_eq!(observer.on_progress(20, Some(100)), Progress::Continue);
        assert_eq!(seen, vec![10, 20]);
    }

    fn seen_push(seen: &mut Vec<u64>, value: u64) {
        seen.push(value);
    }

    #[test]
    fn test_tracker_accumulates_deltas() {
        let tracker = ProgressTracker::new();
        let mut observer = tracker.clone().observer();
        observer.on_progress(100, Some(1000));
        observer.on_progress(250, Some(1000));
        assert_eq!(tracker.processed(), 250);
        assert_eq!(tracker.total(), 1000);
    }

    #[test]
    fn test_tracker_cancellation() {
        let tracker = ProgressTracker::new();
        let mut observer = tracker.clone().observer();
        assert_eq!(observer.on_progress(10, None), Progress::Continue);
        tracker.cancel();
        assert_eq!(observer.on_progress(20, None), Progress::Cancel);
        assert!(tracker.is_cancelled());
    }

    #[test]
    fn test_tracker_shared_across_threads() {
        let tracker = ProgressTracker::new();
        let worker = Arc::clone(&tracker);
        let handle = std::thread::spawn(move || {
            worker.advance(64);
            worker.advance(64);
        });
        handle.join().unwrap();
        assert_eq!(tracker.processed(), 128);
    }
}
