//! Detection scheduling.
//!
//! Decides when a detection call may be launched and what it searches for.
//!
//! # State Machine
//!
//! ```text
//! Idle --[batch available, permit acquired]--> QueryInFlight
//! QueryInFlight --[call resolves: ok, error or panic]--> Idle
//! Idle --[nothing to search for]--> Cooldown --[cooldown elapsed]--> Idle
//! ```
//!
//! At most one detection call is outstanding at a time. The call runs on a
//! spawned task holding an [`InFlightPermit`]; the permit is dropped before
//! the task reports completion, so the flag is always clear by the time the
//! tick loop sees the `DetectionCompleted` event.
//!
//! Each dispatch carries a sequence number echoed back in its completion
//! event. A completion only clears the active batch when the numbers match,
//! so a late event for an earlier call never ends a newer one.
//!
//! Queued batches (FIFO) take precedence over autonomous search.

mod flight;
mod pruning;
mod refinement;
mod state;

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::backend::DetectionBackend;
use crate::catalog::ModelCatalog;
use crate::config::{QueryConfig, SearchConfig};
use crate::events::{DetectionOutcome, EventSender, TrackerEvent};
use crate::geometry::Pose;
use crate::model::ModelId;
use crate::query::{BatchOrigin, QueryBatch, QueryBuilder, ScanParams};
use crate::registry::RegistrySnapshot;
use crate::telemetry::TrackerMetrics;

pub use flight::{InFlightFlag, InFlightPermit};
pub use pruning::StalenessPruner;
pub use refinement::{
    decide, default_search_area, desired_coverage, RefinementDecision, RefinerRequest,
    SearchAreaRefiner, COARSE_COVERAGE_RATIO, REFINE_BOX_SCALE, SEARCH_AREA_DISTANCE,
    SEARCH_AREA_SIZE_FACTOR,
};
pub use state::SchedulerState;

/// Summary of the batch currently being detected.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveBatch {
    pub seq: u64,
    pub origin: BatchOrigin,
    pub models: Vec<ModelId>,
    pub started_at: Instant,
}

/// Owns the pending queue and the in-flight flag.
#[derive(Debug)]
pub struct DetectionScheduler {
    flag: InFlightFlag,
    state: SchedulerState,
    pending: VecDeque<QueryBatch>,
    active: Option<ActiveBatch>,
    next_seq: u64,
    /// Last dispatch time per model.
    last_query_at: HashMap<ModelId, Instant>,
    cooldown: Duration,
    metrics: Arc<TrackerMetrics>,
}

impl DetectionScheduler {
    pub fn new(cooldown: Duration, metrics: Arc<TrackerMetrics>) -> Self {
        Self {
            flag: InFlightFlag::new(),
            state: SchedulerState::Idle,
            pending: VecDeque::new(),
            active: None,
            next_seq: 0,
            last_query_at: HashMap::new(),
            cooldown,
            metrics,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Handle to the in-flight flag.
    pub fn flag(&self) -> &InFlightFlag {
        &self.flag
    }

    pub fn is_in_flight(&self) -> bool {
        self.flag.is_in_flight()
    }

    pub fn active_batch(&self) -> Option<&ActiveBatch> {
        self.active.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// When a query for `model_id` was last dispatched.
    ///
    /// Informational only; scheduling never consults it.
    pub fn last_query_at(&self, model_id: ModelId) -> Option<Instant> {
        self.last_query_at.get(&model_id).copied()
    }

    /// Append a batch to the pending queue. Empty batches are ignored.
    pub fn queue_batch(&mut self, batch: QueryBatch) {
        if batch.is_empty() {
            tracing::debug!(origin = %batch.origin, "Ignoring empty query batch");
            return;
        }
        tracing::debug!(
            origin = %batch.origin,
            queries = batch.len(),
            pending = self.pending.len() + 1,
            "Query batch queued"
        );
        self.pending.push_back(batch);
    }

    /// Discard every pending batch, returning how many were dropped.
    ///
    /// An in-flight call is left to finish.
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending = VecDeque::new();
        if dropped > 0 {
            tracing::info!(dropped, "Discarded pending query batches");
        }
        dropped
    }

    /// Advance time-driven transitions.
    pub fn poll(&mut self, now: Instant) {
        self.state = match self.state {
            SchedulerState::QueryInFlight if !self.flag.is_in_flight() => SchedulerState::Idle,
            other => other.settle(now),
        };
    }

    /// Whether a batch may be dispatched now.
    ///
    /// Pending batches bypass the cooldown.
    pub fn ready(&self) -> bool {
        match self.state {
            SchedulerState::Idle => !self.flag.is_in_flight(),
            SchedulerState::Cooldown { .. } => self.has_pending() && !self.flag.is_in_flight(),
            SchedulerState::QueryInFlight => false,
        }
    }

    pub fn pop_pending(&mut self) -> Option<QueryBatch> {
        self.pending.pop_front()
    }

    /// Put a batch back at the head of the queue.
    pub fn requeue_front(&mut self, batch: QueryBatch) {
        if !batch.is_empty() {
            self.pending.push_front(batch);
        }
    }

    /// Nothing to search for: pause before planning again.
    pub fn enter_cooldown(&mut self, now: Instant) {
        if !matches!(self.state, SchedulerState::Cooldown { .. }) {
            tracing::debug!(cooldown_ms = self.cooldown.as_millis() as u64, "Scheduler cooling down");
            self.metrics.cooldown_entered();
        }
        self.state = SchedulerState::Cooldown {
            until: now + self.cooldown,
        };
    }

    /// Build one query per catalog model that still needs searching.
    ///
    /// With `single_instance` set, models that already have a tracked
    /// instance are skipped. Models without a bounding box are a catalog
    /// desynchronisation: they assert in debug builds and are skipped
    /// otherwise.
    pub fn plan_autonomous(
        &self,
        catalog: &dyn ModelCatalog,
        snapshot: &RegistrySnapshot,
        builder: &QueryBuilder,
        search: &SearchConfig,
        query: &QueryConfig,
        camera: &Pose,
    ) -> Option<QueryBatch> {
        let mut queries = Vec::new();

        for model_id in catalog.model_ids() {
            if search.single_instance && snapshot.has_model(model_id) {
                continue;
            }

            let bbox = catalog.bounding_box(model_id);
            let entry = catalog.entry(model_id);
            debug_assert!(
                bbox.is_some() && entry.is_some(),
                "catalog has no bounding box for model {model_id}"
            );
            let (Some(bbox), Some(entry)) = (bbox, entry) else {
                tracing::error!(model = %model_id, "Model has no bounding box, skipping");
                continue;
            };

            let scan = ScanParams::for_model(&entry, query);
            queries.push(builder.build(model_id, &bbox, scan, search.area_shape, camera));
        }

        if queries.is_empty() {
            None
        } else {
            Some(QueryBatch::new(queries, None, BatchOrigin::Autonomous))
        }
    }

    /// Launch a detection call for `batch` on a spawned task.
    ///
    /// Gives the batch back if another call is already in flight. Must be
    /// called from within a tokio runtime.
    pub fn dispatch(
        &mut self,
        batch: QueryBatch,
        backend: Arc<dyn DetectionBackend>,
        events: EventSender,
    ) -> Result<JoinHandle<()>, QueryBatch> {
        let Some(permit) = self.flag.try_acquire() else {
            self.metrics.schedule_rejected();
            return Err(batch);
        };

        let now = Instant::now();
        self.next_seq += 1;
        let seq = self.next_seq;
        let models = batch.model_ids();
        for model_id in &models {
            self.last_query_at.insert(*model_id, now);
        }

        tracing::info!(
            seq,
            origin = %batch.origin,
            queries = batch.len(),
            pending = self.pending.len(),
            "Dispatching detection"
        );
        events.enqueue(TrackerEvent::DetectionAttempted {
            models: models.clone(),
            origin: batch.origin,
        });
        self.metrics.detection_attempted();
        self.active = Some(ActiveBatch {
            seq,
            origin: batch.origin,
            models,
            started_at: now,
        });
        self.state = SchedulerState::QueryInFlight;

        let queries = batch.queries;
        Ok(tokio::spawn(async move {
            // Covers a panic while building the future as well as while polling it.
            let result = AssertUnwindSafe(async { backend.detect(queries).await })
                .catch_unwind()
                .await;
            drop(permit);

            let outcome = match result {
                Ok(Ok(())) => DetectionOutcome::Succeeded,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "Detection call failed");
                    DetectionOutcome::Failed(err.to_string())
                }
                Err(_) => {
                    tracing::warn!("Detection call panicked");
                    DetectionOutcome::Panicked
                }
            };
            events.enqueue(TrackerEvent::DetectionCompleted { seq, outcome });
        }))
    }

    /// Record the end of call `seq`.
    ///
    /// The active batch is only cleared when it belongs to `seq`.
    pub fn on_detection_completed(&mut self, seq: u64, outcome: &DetectionOutcome) {
        if outcome.is_success() {
            self.metrics.detection_succeeded();
        } else {
            self.metrics.detection_failed();
        }
        let finished = if self.active.as_ref().is_some_and(|a| a.seq == seq) {
            self.active.take()
        } else {
            None
        };
        match finished {
            Some(active) => tracing::debug!(
                seq,
                origin = %active.origin,
                elapsed_ms = active.started_at.elapsed().as_millis() as u64,
                success = outcome.is_success(),
                "Detection completed"
            ),
            None => tracing::debug!(
                seq,
                active = ?self.active.as_ref().map(|a| a.seq),
                success = outcome.is_success(),
                "Late detection completion, active batch kept"
            ),
        }
        if !self.flag.is_in_flight() && self.state == SchedulerState::QueryInFlight {
            self.state = SchedulerState::Idle;
        }
    }
}
