//! Tracker telemetry.
//!
//! Lock-free counters updated from the tick loop and the detection task.
//!
//! ```text
//! tick loop ──────┐
//!                 ├──► TrackerMetrics ──► TelemetrySnapshot ──► CLI / logs
//! detection task ─┘    (atomic counters)  (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```
//! use objtrack::telemetry::TrackerMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(TrackerMetrics::new());
//! metrics.detection_attempted();
//! metrics.detection_succeeded();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.detections_succeeded, 1);
//! ```

mod metrics;
mod snapshot;

pub use metrics::TrackerMetrics;
pub use snapshot::TelemetrySnapshot;
