//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn NormalizeProgressCallback>`] via
//! [`crate::config::NormalizeConfigBuilder::progress_callback`] to receive
//! events as the collector dispatches each file.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docnorm::{NormalizeConfig, NormalizeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     produced: AtomicUsize,
//! }
//!
//! impl NormalizeProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, ordinal: &str, name: &str, outputs: usize) {
//!         self.produced.fetch_add(outputs, Ordering::SeqCst);
//!         eprintln!("{ordinal} {name}: {outputs} pdf(s)");
//!     }
//! }
//!
//! let config = NormalizeConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { produced: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::BatchStats;
use std::sync::Arc;

/// Called by the collector as it processes each file.
///
/// Files are dispatched concurrently, so every method may be called from
/// several tasks at once. Implementations must protect shared mutable state
/// with `Mutex` or atomics. All methods default to no-ops.
///
/// Nested files (archive members, email attachments) are reported too; their
/// `ordinal` is the dotted path such as `"2.1"`.
pub trait NormalizeProgressCallback: Send + Sync {
    /// Called once per top-level batch before any file is dispatched.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when the dispatcher picks up a file.
    fn on_file_start(&self, ordinal: &str, name: &str) {
        let _ = (ordinal, name);
    }

    /// Called when a file finished. `outputs` counts the PDFs it produced
    /// directly (0 for containers, whose members report separately).
    fn on_file_complete(&self, ordinal: &str, name: &str, outputs: usize) {
        let _ = (ordinal, name, outputs);
    }

    /// Called when a file was dropped, rejected or failed.
    fn on_file_error(&self, ordinal: &str, name: &str, error: &str) {
        let _ = (ordinal, name, error);
    }

    /// Called once after every task of the batch has finished.
    fn on_batch_complete(&self, stats: &BatchStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl NormalizeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NormalizeConfig`].
pub type ProgressCallback = Arc<dyn NormalizeProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        total: AtomicUsize,
    }

    impl NormalizeProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.total.store(total_files, Ordering::SeqCst);
        }

        fn on_file_start(&self, _ordinal: &str, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _ordinal: &str, _name: &str, _outputs: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _ordinal: &str, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start("1", "a.pdf");
        cb.on_file_complete("1", "a.pdf", 1);
        cb.on_file_error("2", "b.exe", "unsupported");
        cb.on_batch_complete(&BatchStats::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(3);
        tracker.on_file_start("1", "a.pdf");
        tracker.on_file_complete("1", "a.pdf", 1);
        tracker.on_file_start("2", "b.png");
        tracker.on_file_error("2", "b.png", "thumbnail");

        assert_eq!(tracker.total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_file_start("1.2", "nested.pdf");
    }
}
