//! Scheduler state as seen from the tick loop.

use std::fmt;
use std::time::Instant;

/// Where the scheduler is in its dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Ready to dispatch.
    #[default]
    Idle,
    /// A detection call is outstanding.
    QueryInFlight,
    /// Nothing needed searching; waiting before planning again.
    Cooldown { until: Instant },
}

impl SchedulerState {
    /// Resolve an expired cooldown back to `Idle`.
    pub fn settle(self, now: Instant) -> Self {
        match self {
            SchedulerState::Cooldown { until } if now >= until => SchedulerState::Idle,
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::QueryInFlight => "query_in_flight",
            SchedulerState::Cooldown { .. } => "cooldown",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
