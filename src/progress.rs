//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for observing a session while it
//! runs, and [`ProgressInfo`] for the snapshot delivered on each report.
//! Reports are throttled by [`ExtractOptions::with_batch_size`](crate::ExtractOptions::with_batch_size).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gpsframes::{ExtractOptions, OperationType, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if info.operation == OperationType::FrameSampling {
//!             println!("{} frames sampled", info.current);
//!         }
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

/// The kind of work currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Walking the telemetry payloads of a file.
    TelemetryExtraction,
    /// Seeking, decoding, and interpolating frames of a file.
    FrameSampling,
}

/// A snapshot of progress within one file.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// The file being processed.
    pub file: PathBuf,
    /// Position of the file in the session (0-based).
    pub file_index: usize,
    /// Number of files in the session.
    pub file_count: usize,
    /// Items (payloads or frames) processed so far in this file.
    pub current: u64,
    /// Items expected in this file, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since this operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Timestamp of the most recent item, in seconds.
    pub current_timestamp: Option<f64>,
}

/// Trait for receiving progress updates.
///
/// Callbacks observe the session; they cannot stop it.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals while a file is processed.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards every notification. The default when no callback is set.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Identifies the file a tracker reports on.
#[derive(Debug, Clone)]
pub(crate) struct FileContext {
    pub(crate) path: PathBuf,
    pub(crate) index: usize,
    pub(crate) count: usize,
}

impl FileContext {
    #[cfg(test)]
    pub(crate) fn single(path: PathBuf) -> Self {
        Self {
            path,
            index: 0,
            count: 1,
        }
    }
}

/// Tracks timing for one operation and emits throttled callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    file: FileContext,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        file: FileContext,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            file,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one completed item; reports once the batch threshold is hit.
    pub(crate) fn advance(&mut self, timestamp: Option<f64>) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(timestamp);
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, timestamp: Option<f64>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current.min(t) as f32 / t as f32) * 100.0);

        let estimated_remaining = if self.current > 0 {
            self.total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                elapsed.mul_f64(remaining as f64 / self.current as f64)
            })
        } else {
            None
        };

        let info = ProgressInfo {
            operation: self.operation,
            file: self.file.path.clone(),
            file_index: self.file.index,
            file_count: self.file.count,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_timestamp: timestamp,
        };

        self.callback.on_progress(&info);
    }
}
