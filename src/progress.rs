//! Progress-callback trait for per-format export events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as a conversion request works through its formats. The CLI uses
//! this to drive its progress bar; library users can forward events to a
//! channel, a log or a UI.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{ConversionConfig, ConversionProgressCallback, OutputFormat};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_format_complete(&self, format: OutputFormat, path: &Path, bytes: u64) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{format}: {} ({bytes} bytes)", path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::OutputFormat;
use std::path::Path;
use std::sync::Arc;

/// Called by [`crate::convert::convert`] as it exports each format.
///
/// Formats are exported one after another, so calls for one request never
/// overlap. Implementations must still be `Send + Sync` because the config
/// that carries them can be shared across tasks. Every method has a no-op
/// default.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first format is exported.
    ///
    /// # Arguments
    /// * `total_formats`: number of formats in the request
    fn on_batch_start(&self, total_formats: usize) {
        let _ = total_formats;
    }

    /// Called just before a format is rendered.
    ///
    /// # Arguments
    /// * `format`: the format about to be exported
    /// * `index`: 1-indexed position in the batch
    /// * `total`: number of formats in the batch
    fn on_format_start(&self, format: OutputFormat, index: usize, total: usize) {
        let _ = (format, index, total);
    }

    /// Called when a format's file has been written.
    fn on_format_complete(&self, format: OutputFormat, path: &Path, bytes: u64) {
        let _ = (format, path, bytes);
    }

    /// Called when a format fails. The batch continues with the next format.
    fn on_format_error(&self, format: OutputFormat, error: &str) {
        let _ = (format, error);
    }

    /// Called once after every format has been attempted.
    ///
    /// # Arguments
    /// * `total_formats`: formats attempted
    /// * `success_count`: formats that produced a file
    fn on_batch_complete(&self, total_formats: usize, success_count: usize) {
        let _ = (total_formats, success_count);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        batch_total: AtomicUsize,
        starts: Mutex<Vec<(OutputFormat, usize)>>,
        completes: AtomicUsize,
        errors: Mutex<Vec<String>>,
        success_total: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_formats: usize) {
            self.batch_total.store(total_formats, Ordering::SeqCst);
        }

        fn on_format_start(&self, format: OutputFormat, index: usize, _total: usize) {
            self.starts.lock().unwrap().push((format, index));
        }

        fn on_format_complete(&self, _format: OutputFormat, _path: &Path, _bytes: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_format_error(&self, format: OutputFormat, error: &str) {
            self.errors.lock().unwrap().push(format!("{format}: {error}"));
        }

        fn on_batch_complete(&self, _total_formats: usize, success_count: usize) {
            self.success_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(4);
        cb.on_format_start(OutputFormat::Pdf, 1, 4);
        cb.on_format_complete(OutputFormat::Pdf, Path::new("/tmp/a.pdf"), 1024);
        cb.on_format_error(OutputFormat::Png, "engine crashed");
        cb.on_batch_complete(4, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(2);
        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 2);

        tracker.on_format_start(OutputFormat::Html, 1, 2);
        tracker.on_format_complete(OutputFormat::Html, Path::new("a.html"), 10);
        tracker.on_format_start(OutputFormat::Pdf, 2, 2);
        tracker.on_format_error(OutputFormat::Pdf, "navigate failed");

        assert_eq!(
            *tracker.starts.lock().unwrap(),
            vec![(OutputFormat::Html, 1), (OutputFormat::Pdf, 2)]
        );
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.errors.lock().unwrap(), vec!["pdf: navigate failed"]);

        tracker.on_batch_complete(2, 1);
        assert_eq!(tracker.success_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
        cb.on_format_start(OutputFormat::Jpeg, 1, 1);
    }
}
