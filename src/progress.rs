//! Progress-callback trait for per-unit batch events.
//!
//! Inject an [`Arc<dyn BatchProgress>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through the page units.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a database record, or a terminal
//! progress bar — without the library knowing anything about how the host
//! application communicates. Units are processed strictly sequentially, so
//! implementations see events in spec order, but the trait is still `Send +
//! Sync` so callbacks can be shared with other tasks.

use crate::pagespec::PageUnit;
use std::sync::Arc;

/// Called by the batch pipeline as it processes each page unit.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgress: Send + Sync {
    /// Called once before any unit is processed.
    fn on_batch_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before a unit's first page is rendered.
    ///
    /// `index` is 1-based, in spec order.
    fn on_unit_start(&self, index: usize, total_units: usize, unit: &PageUnit) {
        let _ = (index, total_units, unit);
    }

    /// Called when a page image has been recognized (per page, including
    /// every page of a group).
    fn on_page_recognized(&self, page_number: u32) {
        let _ = page_number;
    }

    /// Called when a unit yields a record.
    fn on_unit_complete(&self, index: usize, total_units: usize, unit: &PageUnit, rows: usize) {
        let _ = (index, total_units, unit, rows);
    }

    /// Called when a unit is skipped after retries.
    fn on_unit_skipped(&self, index: usize, total_units: usize, unit: &PageUnit, reason: &str) {
        let _ = (index, total_units, unit, reason);
    }

    /// Called once after all units have been attempted.
    fn on_batch_complete(&self, total_units: usize, records_built: usize) {
        let _ = (total_units, records_built);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl BatchProgress for NoopProgress {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracking {
        units_started: AtomicUsize,
        units_completed: AtomicUsize,
        units_skipped: AtomicUsize,
    }

    impl BatchProgress for Tracking {
        fn on_unit_start(&self, _index: usize, _total: usize, _unit: &PageUnit) {
            self.units_started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unit_complete(&self, _index: usize, _total: usize, _unit: &PageUnit, _rows: usize) {
            self.units_completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unit_skipped(&self, _index: usize, _total: usize, _unit: &PageUnit, _reason: &str) {
            self.units_skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgress;
        cb.on_batch_start(3);
        cb.on_unit_start(1, 3, &PageUnit::Single(10));
        cb.on_page_recognized(10);
        cb.on_unit_complete(1, 3, &PageUnit::Single(10), 4);
        cb.on_unit_skipped(2, 3, &PageUnit::Group(vec![160, 161]), "header mismatch");
        cb.on_batch_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Tracking {
            units_started: AtomicUsize::new(0),
            units_completed: AtomicUsize::new(0),
            units_skipped: AtomicUsize::new(0),
        };
        let unit = PageUnit::Single(10);
        tracker.on_unit_start(1, 2, &unit);
        tracker.on_unit_complete(1, 2, &unit, 5);
        tracker.on_unit_start(2, 2, &unit);
        tracker.on_unit_skipped(2, 2, &unit, "no table");

        assert_eq!(tracker.units_started.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.units_completed.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.units_skipped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgress);
        cb.on_batch_start(1);
        cb.on_unit_complete(1, 1, &PageUnit::Single(3), 0);
    }
}
