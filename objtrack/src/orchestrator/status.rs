//! Status published by the tick loop for readers on other threads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::backend::BackendStatus;
use crate::config::{DetectionStrategy, TrackingStrategy};
use crate::geometry::OrientedBox;
use crate::registry::RegistrySnapshot;
use crate::scheduler::{ActiveBatch, SchedulerState};

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerStatus {
    pub backend_status: BackendStatus,
    /// Scheduling suppressed by the host.
    pub paused: bool,
    pub scheduler_state: SchedulerState,
    pub tracking_strategy: TrackingStrategy,
    pub detection_strategy: DetectionStrategy,
    pub area_refinement: bool,
    pub pending_batches: usize,
    pub active_batch: Option<ActiveBatch>,
    /// Current refiner search box.
    pub search_box: Option<OrientedBox>,
    pub instances: RegistrySnapshot,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TrackerStatus {
    pub fn tracked_count(&self) -> usize {
        self.instances.len()
    }

    pub fn is_detecting(&self) -> bool {
        self.active_batch.is_some()
    }
}

/// Cloneable handle to the latest [`TrackerStatus`].
#[derive(Debug, Clone, Default)]
pub struct SharedTrackerStatus {
    inner: Arc<RwLock<TrackerStatus>>,
}

impl SharedTrackerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, status: TrackerStatus) {
        *self.inner.write() = status;
    }

    /// Copy of the latest status.
    pub fn get(&self) -> TrackerStatus {
        self.inner.read().clone()
    }

    /// Read the status in place without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&TrackerStatus) -> R) -> R {
        f(&self.inner.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_visible_to_clones() {
        let shared = SharedTrackerStatus::new();
        let reader = shared.clone();
        assert!(!reader.get().paused);

        shared.publish(TrackerStatus {
            paused: true,
            pending_batches: 2,
            ..Default::default()
        });

        assert!(reader.get().paused);
        assert_eq!(reader.with(|s| s.pending_batches), 2);
    }

    #[test]
    fn test_default_status_is_idle() {
        let status = TrackerStatus::default();
        assert_eq!(status.scheduler_state, SchedulerState::Idle);
        assert_eq!(status.tracked_count(), 0);
        assert!(!status.is_detecting());
    }

    #[test]
    fn test_readable_from_other_thread() {
        let shared = SharedTrackerStatus::new();
        let reader = shared.clone();
        shared.publish(TrackerStatus {
            backend_status: BackendStatus::Paused,
            ..Default::default()
        });

        let seen = std::thread::spawn(move || reader.get().backend_status)
            .join()
            .unwrap();
        assert_eq!(seen, BackendStatus::Paused);
    }
}
