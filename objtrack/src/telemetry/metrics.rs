use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::TelemetrySnapshot;

/// Atomic counters for one tracker.
#[derive(Debug)]
pub struct TrackerMetrics {
    started_at: Instant,
    ticks: AtomicU64,
    events_drained: AtomicU64,
    instances_added: AtomicU64,
    instances_updated: AtomicU64,
    instances_removed: AtomicU64,
    unknown_removals: AtomicU64,
    instances_pruned: AtomicU64,
    detections_attempted: AtomicU64,
    detections_succeeded: AtomicU64,
    detections_failed: AtomicU64,
    schedule_rejected: AtomicU64,
    cooldowns: AtomicU64,
    mode_commands: AtomicU64,
    mode_command_failures: AtomicU64,
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            ticks: AtomicU64::new(0),
            events_drained: AtomicU64::new(0),
            instances_added: AtomicU64::new(0),
            instances_updated: AtomicU64::new(0),
            instances_removed: AtomicU64::new(0),
            unknown_removals: AtomicU64::new(0),
            instances_pruned: AtomicU64::new(0),
            detections_attempted: AtomicU64::new(0),
            detections_succeeded: AtomicU64::new(0),
            detections_failed: AtomicU64::new(0),
            schedule_rejected: AtomicU64::new(0),
            cooldowns: AtomicU64::new(0),
            mode_commands: AtomicU64::new(0),
            mode_command_failures: AtomicU64::new(0),
        }
    }

    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_drained(&self, count: usize) {
        self.events_drained
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn instance_added(&self) {
        self.instances_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn instance_updated(&self) {
        self.instances_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn instance_removed(&self) {
        self.instances_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// A removal named an id the registry did not hold.
    pub fn unknown_removal(&self) {
        self.unknown_removals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn instances_pruned(&self, count: usize) {
        self.instances_pruned
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn detection_attempted(&self) {
        self.detections_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn detection_succeeded(&self) {
        self.detections_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Covers both backend errors and panics.
    pub fn detection_failed(&self) {
        self.detections_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A dispatch lost the in-flight race.
    pub fn schedule_rejected(&self) {
        self.schedule_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cooldown_entered(&self) {
        self.cooldowns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mode_command_issued(&self) {
        self.mode_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mode_command_failed(&self) {
        self.mode_command_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            ticks: self.ticks.load(Ordering::Relaxed),
            events_drained: self.events_drained.load(Ordering::Relaxed),
            instances_added: self.instances_added.load(Ordering::Relaxed),
            instances_updated: self.instances_updated.load(Ordering::Relaxed),
            instances_removed: self.instances_removed.load(Ordering::Relaxed),
            unknown_removals: self.unknown_removals.load(Ordering::Relaxed),
            instances_pruned: self.instances_pruned.load(Ordering::Relaxed),
            detections_attempted: self.detections_attempted.load(Ordering::Relaxed),
            detections_succeeded: self.detections_succeeded.load(Ordering::Relaxed),
            detections_failed: self.detections_failed.load(Ordering::Relaxed),
            schedule_rejected: self.schedule_rejected.load(Ordering::Relaxed),
            cooldowns: self.cooldowns.load(Ordering::Relaxed),
            mode_commands: self.mode_commands.load(Ordering::Relaxed),
            mode_command_failures: self.mode_command_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_metrics_are_zero() {
        let snapshot = TrackerMetrics::new().snapshot();
        assert_eq!(snapshot.ticks, 0);
        assert_eq!(snapshot.detections_attempted, 0);
        assert_eq!(snapshot.mode_command_failures, 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = TrackerMetrics::new();
        metrics.tick();
        metrics.tick();
        metrics.events_drained(5);
        metrics.instances_pruned(2);
        metrics.unknown_removal();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks, 2);
        assert_eq!(snapshot.events_drained, 5);
        assert_eq!(snapshot.instances_pruned, 2);
        assert_eq!(snapshot.unknown_removals, 1);
    }

    #[test]
    fn test_thread_safe_counting() {
        let metrics = Arc::new(TrackerMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.detection_attempted();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().detections_attempted, 800);
    }
}
