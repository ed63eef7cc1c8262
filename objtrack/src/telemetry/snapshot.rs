use std::fmt;

use serde::Serialize;

/// Point-in-time copy of [`TrackerMetrics`](super::TrackerMetrics).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub uptime_secs: f64,
    pub ticks: u64,
    pub events_drained: u64,
    pub instances_added: u64,
    pub instances_updated: u64,
    pub instances_removed: u64,
    pub unknown_removals: u64,
    pub instances_pruned: u64,
    pub detections_attempted: u64,
    pub detections_succeeded: u64,
    pub detections_failed: u64,
    pub schedule_rejected: u64,
    pub cooldowns: u64,
    pub mode_commands: u64,
    pub mode_command_failures: u64,
}

impl TelemetrySnapshot {
    /// Fraction of finished detection calls that succeeded.
    pub fn detection_success_rate(&self) -> f64 {
        let finished = self.detections_succeeded + self.detections_failed;
        if finished == 0 {
            0.0
        } else {
            self.detections_succeeded as f64 / finished as f64
        }
    }

    /// Instances currently believed to be tracked.
    pub fn live_instances(&self) -> u64 {
        self.instances_added
            .saturating_sub(self.instances_removed + self.instances_pruned)
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks, {} detections ({} ok, {} failed), {} added, {} removed, {} pruned",
            self.ticks,
            self.detections_attempted,
            self.detections_succeeded,
            self.detections_failed,
            self.instances_added,
            self.instances_removed,
            self.instances_pruned
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let snapshot = TelemetrySnapshot {
            detections_succeeded: 3,
            detections_failed: 1,
            ..Default::default()
        };
        assert!((snapshot.detection_success_rate() - 0.75).abs() < 1e-9);
        assert_eq!(TelemetrySnapshot::default().detection_success_rate(), 0.0);
    }

    #[test]
    fn test_live_instances_saturates() {
        let snapshot = TelemetrySnapshot {
            instances_added: 1,
            instances_removed: 1,
            instances_pruned: 1,
            ..Default::default()
        };
        assert_eq!(snapshot.live_instances(), 0);
    }

    #[test]
    fn test_serializes_to_json() {
        let snapshot = TelemetrySnapshot {
            ticks: 7,
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"ticks\":7"));
    }
}
