//! Progress reporting for the long-running phases of an export.
//!
//! Collection and media downloads report through a [`ProgressCallback`].
//! Library users can plug in their own callback; the default one logs via
//! `tracing`.
//!
//! # Example
//!
//! ```rust
//! use chatarchive::progress::{Phase, Progress, ProgressCallback};
//! use std::sync::Arc;
//!
//! let callback: ProgressCallback = Arc::new(|progress| {
//!     if let Some(pct) = progress.percentage() {
//!         println!("{}: {:.1}%", progress.phase, pct);
//!     }
//! });
//!
//! for done in 1..=4usize {
//!     callback(Progress::new(Phase::Downloading, done).with_total(4));
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::info;

/// Phase that emitted a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Draining the message source.
    Collecting,
    /// Fetching media attachments.
    Downloading,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Collecting => f.write_str("collecting"),
            Phase::Downloading => f.write_str("downloading"),
        }
    }
}

/// One progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,

    /// Items (messages or media files) handled so far.
    pub items_processed: usize,

    /// Total items, if known up front.
    pub total_items: Option<usize>,
}

impl Progress {
    pub fn new(phase: Phase, items_processed: usize) -> Self {
        Self {
            phase,
            items_processed,
            total_items: None,
        }
    }

    #[must_use]
    pub fn with_total(mut self, total_items: usize) -> Self {
        self.total_items = Some(total_items);
        self
    }

    /// Returns the progress as a percentage (0.0 - 100.0).
    ///
    /// Returns `None` if the total is not known.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chatarchive::progress::{Phase, Progress};
    ///
    /// let progress = Progress::new(Phase::Downloading, 5).with_total(10);
    /// assert_eq!(progress.percentage(), Some(50.0));
    ///
    /// let unknown = Progress::new(Phase::Collecting, 500);
    /// assert_eq!(unknown.percentage(), None);
    /// ```
    pub fn percentage(&self) -> Option<f64> {
        self.total_items.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.items_processed as f64 / total as f64) * 100.0
            }
        })
    }

    /// Returns `true` once every known item has been handled.
    pub fn is_complete(&self) -> bool {
        self.total_items
            .is_some_and(|total| self.items_processed >= total)
    }
}

/// Callback type for receiving progress updates.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Creates a no-op progress callback.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Creates a progress callback that logs each update at `info` level.
pub fn log_progress() -> ProgressCallback {
    Arc::new(|progress| match progress.total_items {
        Some(total) => info!(
            phase = %progress.phase,
            "{} of {} processed",
            progress.items_processed,
            total
        ),
        None => info!(
            phase = %progress.phase,
            "{} processed",
            progress.items_processed
        ),
    })
}

/// Throttles a callback to every `interval` items.
#[derive(Clone)]
pub struct ProgressReporter {
    phase: Phase,
    interval: usize,
    callback: ProgressCallback,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("phase", &self.phase)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    /// An `interval` of zero is treated as one.
    pub fn new(phase: Phase, interval: usize, callback: ProgressCallback) -> Self {
        Self {
            phase,
            interval: interval.max(1),
            callback,
        }
    }

    /// Reports `processed` if it lands on an interval boundary.
    /// Returns whether the callback fired.
    pub fn tick(&self, processed: usize, total: Option<usize>) -> bool {
        if processed == 0 || processed % self.interval != 0 {
            return false;
        }
        self.emit(processed, total);
        true
    }

    /// Reports unconditionally.
    pub fn emit(&self, processed: usize, total: Option<usize>) {
        let mut progress = Progress::new(self.phase, processed);
        progress.total_items = total;
        (self.callback)(progress);
    }
}
