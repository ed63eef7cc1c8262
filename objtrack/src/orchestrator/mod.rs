//! The tracker tick loop.
//!
//! [`ObjectTracker`] owns every piece of mutable tracking state and is driven
//! from a single task. Each tick runs, in order:
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │ drain events│──►│  prune   │──►│ mode mgmt │──►│ refiner  │──►│ schedule │
//! └─────────────┘   └──────────┘   └───────────┘   └──────────┘   └──────────┘
//!        │                                                              │
//!        └─────── always ──────┐              ┌──── publish status ◄────┘
//! ```
//!
//! Events are always drained, so results of a call that finishes while the
//! tracker is paused are still applied. Everything after the drain is skipped
//! while the tracker or the backend is paused, or while the camera pose is
//! unknown.
//!
//! Detection calls run on spawned tasks; the tick never awaits them.

mod status;

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendStatus, CameraProvider, DetectionBackend};
use crate::catalog::ModelCatalog;
use crate::config::{DetectionStrategy, TrackerConfig, TrackingStrategy};
use crate::events::{EventQueue, EventSender, TrackerEvent};
use crate::geometry::{OrientedBox, Pose};
use crate::model::InstanceEventData;
use crate::query::{BatchOrigin, QueryBatch, QueryBuilder, ScanParams};
use crate::registry::{InstanceRegistry, RegistrySnapshot};
use crate::scheduler::{DetectionScheduler, RefinerRequest, SearchAreaRefiner, StalenessPruner};
use crate::telemetry::TrackerMetrics;
use crate::tracking_mode::{ModeCommand, TrackingModeManager};

pub use status::{SharedTrackerStatus, TrackerStatus};

/// External collaborators of the tracker.
#[derive(Clone)]
pub struct TrackerServices {
    pub backend: Arc<dyn DetectionBackend>,
    pub catalog: Arc<dyn ModelCatalog>,
    pub camera: Arc<dyn CameraProvider>,
}

impl TrackerServices {
    pub fn new(
        backend: Arc<dyn DetectionBackend>,
        catalog: Arc<dyn ModelCatalog>,
        camera: Arc<dyn CameraProvider>,
    ) -> Self {
        Self {
            backend,
            catalog,
            camera,
        }
    }
}

/// Detection and tracking orchestrator.
pub struct ObjectTracker {
    config: TrackerConfig,
    services: TrackerServices,
    sender: EventSender,
    events: EventQueue,
    registry: InstanceRegistry,
    builder: QueryBuilder,
    scheduler: DetectionScheduler,
    pruner: StalenessPruner,
    modes: TrackingModeManager,
    refiner: SearchAreaRefiner,
    detection_strategy: DetectionStrategy,
    area_refinement: bool,
    paused: bool,
    backend_status: BackendStatus,
    global_search_requested: bool,
    metrics: Arc<TrackerMetrics>,
    status: SharedTrackerStatus,
}

impl ObjectTracker {
    /// Create a tracker consuming `events`.
    ///
    /// `sender` must belong to the same queue; detection tasks report
    /// through it.
    pub fn new(
        config: TrackerConfig,
        services: TrackerServices,
        sender: EventSender,
        events: EventQueue,
    ) -> Self {
        let metrics = Arc::new(TrackerMetrics::new());
        let backend_status = services.backend.status();

        Self {
            builder: QueryBuilder::from_config(&config.search),
            scheduler: DetectionScheduler::new(config.scheduler.cooldown, Arc::clone(&metrics)),
            pruner: StalenessPruner::new(
                config.search.frustum_far_distance,
                config.scheduler.prune_distance_factor,
            ),
            modes: TrackingModeManager::new(config.strategy.tracking),
            refiner: SearchAreaRefiner::new(config.scheduler.refinement_interval),
            detection_strategy: config.strategy.detection,
            area_refinement: config.strategy.area_refinement,
            registry: InstanceRegistry::new(),
            paused: false,
            backend_status,
            global_search_requested: false,
            status: SharedTrackerStatus::new(),
            metrics,
            config,
            services,
            sender,
            events,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Immutable copy of the tracked instances.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn tracked_count(&self) -> usize {
        self.registry.len()
    }

    pub fn metrics(&self) -> Arc<TrackerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle for readers on other threads.
    pub fn shared_status(&self) -> SharedTrackerStatus {
        self.status.clone()
    }

    /// Status as of the last tick.
    pub fn status(&self) -> TrackerStatus {
        self.status.get()
    }

    pub fn scheduler(&self) -> &DetectionScheduler {
        &self.scheduler
    }

    /// Sender for producers that report into this tracker.
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tracking_strategy(&self) -> TrackingStrategy {
        self.modes.strategy()
    }

    pub fn detection_strategy(&self) -> DetectionStrategy {
        self.detection_strategy
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host controls
    // ─────────────────────────────────────────────────────────────────────────

    /// Suppress scheduling and discard queued batches.
    ///
    /// An in-flight call is left to finish; its results are still applied.
    pub fn pause(&mut self) {
        if !self.paused {
            tracing::info!("Tracker paused");
        }
        self.paused = true;
        self.scheduler.clear_pending();
    }

    pub fn resume(&mut self) {
        if self.paused {
            tracing::info!("Tracker resumed");
        }
        self.paused = false;
    }

    /// Change the tracking strategy, retargeting instances under manual
    /// strategies immediately.
    pub fn set_tracking_strategy(&mut self, strategy: TrackingStrategy) {
        let commands = self.modes.set_strategy(strategy, &self.registry.snapshot());
        self.apply_mode_commands(commands);
    }

    pub fn set_detection_strategy(&mut self, strategy: DetectionStrategy) {
        if strategy != self.detection_strategy {
            tracing::info!(from = %self.detection_strategy, to = %strategy, "Detection strategy changed");
        }
        self.detection_strategy = strategy;
    }

    pub fn set_area_refinement(&mut self, enabled: bool) {
        if enabled != self.area_refinement {
            tracing::info!(enabled, "Search-area refinement toggled");
        }
        self.area_refinement = enabled;
    }

    /// Queue a global search around the camera.
    ///
    /// Returns `false` when no camera pose is available yet.
    pub fn start_query(&mut self) -> bool {
        let Some(camera) = self.services.camera.current_camera_pose() else {
            tracing::debug!("No camera pose, global search not queued");
            return false;
        };
        let bounds = self.global_box(&camera);
        self.queue_batch_in_bounds(bounds, BatchOrigin::Requested) > 0
    }

    /// Queue one box query per catalog model, all limited to `bounds`.
    ///
    /// Returns the number of queries queued.
    pub fn queue_queries_in_bounds(&mut self, bounds: OrientedBox) -> usize {
        self.queue_batch_in_bounds(bounds, BatchOrigin::Requested)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tick loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Tick at the configured interval until cancelled.
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        let period = self.config.scheduler.tick_interval;
        tracing::info!(
            tick_ms = period.as_millis() as u64,
            tracking = %self.modes.strategy(),
            detection = %self.detection_strategy,
            "Object tracker started"
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => break,

                _ = interval.tick() => self.tick(),
            }
        }

        tracing::info!(
            tracked = self.registry.len(),
            metrics = %self.metrics.snapshot(),
            "Object tracker stopped"
        );
    }

    /// One pass of the loop. Must be called from within a tokio runtime.
    pub fn tick(&mut self) {
        self.metrics.tick();
        self.drain_events();

        if self.paused || self.backend_status != BackendStatus::Running {
            self.publish_status();
            return;
        }

        let Some(camera) = self.services.camera.current_camera_pose() else {
            tracing::debug!("No camera pose, skipping cycle");
            self.publish_status();
            return;
        };

        self.prune(&camera);
        self.manage_modes(&camera);

        if std::mem::take(&mut self.global_search_requested)
            && self.detection_strategy == DetectionStrategy::Auto
        {
            let bounds = self.global_box(&camera);
            self.queue_batch_in_bounds(bounds, BatchOrigin::Requested);
        }

        let now = Instant::now();
        if self.area_refinement {
            self.refine(now, &camera);
        }
        self.schedule(now, &camera);
        self.publish_status();
    }

    fn drain_events(&mut self) {
        let events: Vec<TrackerEvent> = self.events.drain().collect();
        if events.is_empty() {
            return;
        }
        self.metrics.events_drained(events.len());
        for event in events {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Added(data) | TrackerEvent::Updated(data) => self.on_instance_event(&data),
            TrackerEvent::Removed(data) => match self.registry.remove(data.instance_id) {
                Ok(removed) => {
                    tracing::info!(
                        instance = %removed.instance_id,
                        model = %removed.model_id,
                        "Instance removed"
                    );
                    self.metrics.instance_removed();
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Removal for untracked instance ignored");
                    self.metrics.unknown_removal();
                }
            },
            TrackerEvent::RunningChanged(status) => {
                tracing::info!(status = %status, "Backend running state changed");
                self.backend_status = status;
                match status {
                    BackendStatus::Paused => {
                        self.scheduler.clear_pending();
                    }
                    BackendStatus::Running => {
                        self.global_search_requested = true;
                    }
                }
            }
            TrackerEvent::DetectionAttempted { models, origin } => {
                tracing::debug!(origin = %origin, models = models.len(), "Detection attempt recorded");
            }
            TrackerEvent::DetectionCompleted { seq, outcome } => {
                self.scheduler.on_detection_completed(seq, &outcome);
            }
        }
    }

    fn on_instance_event(&mut self, data: &InstanceEventData) {
        let outcome = self.registry.upsert(data);
        if outcome.is_new() {
            tracing::info!(
                instance = %data.instance_id,
                model = %data.model_id,
                coverage = data.coverage,
                mode = %data.mode,
                "Instance added"
            );
            self.metrics.instance_added();
        } else {
            tracing::debug!(instance = %data.instance_id, coverage = data.coverage, "Instance updated");
            self.metrics.instance_updated();
        }

        let command = self
            .registry
            .get(data.instance_id)
            .and_then(|instance| self.modes.on_instance_seen(instance));
        if let Some(command) = command {
            self.apply_mode_commands(vec![command]);
        }
    }

    fn prune(&mut self, camera: &Pose) {
        let pruned = self
            .pruner
            .prune(&mut self.registry, self.services.catalog.as_ref(), camera);
        if pruned.is_empty() {
            return;
        }
        self.metrics.instances_pruned(pruned.len());
        for instance in pruned {
            if let Err(err) = self.services.backend.remove_instance(instance.instance_id) {
                tracing::debug!(
                    instance = %instance.instance_id,
                    error = %err,
                    "Backend did not remove pruned instance"
                );
            }
        }
    }

    fn manage_modes(&mut self, camera: &Pose) {
        let fov = self.builder.field_of_view(camera);
        let commands = self.modes.evaluate(
            &self.registry.snapshot(),
            self.services.catalog.as_ref(),
            &fov,
        );
        self.apply_mode_commands(commands);
    }

    /// Push commands to the backend; the registry follows only on success.
    fn apply_mode_commands(&mut self, commands: Vec<ModeCommand>) {
        for command in commands {
            self.metrics.mode_command_issued();
            match self
                .services
                .backend
                .set_tracking_mode(command.instance_id, command.mode)
            {
                Ok(()) => {
                    tracing::debug!(
                        instance = %command.instance_id,
                        mode = %command.mode,
                        "Tracking mode changed"
                    );
                    if let Err(err) = self.registry.set_mode(command.instance_id, command.mode) {
                        tracing::debug!(error = %err, "Mode change for untracked instance");
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        instance = %command.instance_id,
                        mode = %command.mode,
                        error = %err,
                        "Failed to set tracking mode"
                    );
                    self.metrics.mode_command_failed();
                }
            }
        }
    }

    fn refine(&mut self, now: Instant, camera: &Pose) {
        let busy = self.scheduler.is_in_flight() || self.scheduler.has_pending();
        let snapshot = self.registry.snapshot();
        let requests =
            self.refiner
                .plan(now, busy, &snapshot, self.services.catalog.as_ref(), camera);
        for request in requests {
            match request {
                RefinerRequest::Global(bounds) => {
                    self.queue_batch_in_bounds(bounds, BatchOrigin::Autonomous);
                }
                RefinerRequest::Refine(bounds) => {
                    self.queue_batch_in_bounds(bounds, BatchOrigin::Refinement);
                }
            }
        }
    }

    fn schedule(&mut self, now: Instant, camera: &Pose) {
        self.scheduler.poll(now);
        if !self.scheduler.ready() {
            return;
        }

        let batch = match self.scheduler.pop_pending() {
            Some(batch) => Some(batch),
            None if self.detection_strategy == DetectionStrategy::Auto && !self.area_refinement => {
                self.scheduler.plan_autonomous(
                    self.services.catalog.as_ref(),
                    &self.registry.snapshot(),
                    &self.builder,
                    &self.config.search,
                    &self.config.query,
                    camera,
                )
            }
            None => None,
        };

        let Some(batch) = batch else {
            self.scheduler.enter_cooldown(now);
            return;
        };

        if let Err(batch) = self.scheduler.dispatch(
            batch,
            Arc::clone(&self.services.backend),
            self.sender.clone(),
        ) {
            self.scheduler.requeue_front(batch);
        }
    }

    fn queue_batch_in_bounds(&mut self, bounds: OrientedBox, origin: BatchOrigin) -> usize {
        let catalog = self.services.catalog.as_ref();
        let queries: Vec<_> = catalog
            .model_ids()
            .into_iter()
            .filter_map(|model_id| {
                let entry = catalog.entry(model_id);
                debug_assert!(entry.is_some(), "catalog has no entry for model {model_id}");
                let Some(entry) = entry else {
                    tracing::error!(model = %model_id, "Model has no catalog entry, skipping");
                    return None;
                };
                let scan = ScanParams::for_model(&entry, &self.config.query);
                Some(self.builder.build_in_bounds(model_id, scan, &bounds))
            })
            .collect();
        let count = queries.len();
        self.scheduler
            .queue_batch(QueryBatch::new(queries, Some(bounds), origin));
        count
    }

    /// Cube of side `global_extent` around the camera.
    fn global_box(&self, camera: &Pose) -> OrientedBox {
        OrientedBox::new(
            camera.position,
            nalgebra::Vector3::repeat(self.config.search.global_extent),
            camera.orientation,
        )
    }

    fn publish_status(&self) {
        self.status.publish(TrackerStatus {
            backend_status: self.backend_status,
            paused: self.paused,
            scheduler_state: self.scheduler.state(),
            tracking_strategy: self.modes.strategy(),
            detection_strategy: self.detection_strategy,
            area_refinement: self.area_refinement,
            pending_batches: self.scheduler.pending_len(),
            active_batch: self.scheduler.active_batch().cloned(),
            search_box: self.refiner.search_box(),
            instances: self.registry.snapshot(),
            updated_at: Some(chrono::Utc::now()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendFuture, FixedCamera, SharedCamera};
    use crate::catalog::{InMemoryCatalog, ModelEntry};
    use crate::events::event_queue;
    use crate::model::{InstanceId, ModelId, TrackingMode};
    use crate::query::{SearchArea, SearchQuery};
    use crate::scheduler::SchedulerState;
    use nalgebra::Vector3;
    use parking_lot::Mutex;

    /// Backend that records everything and finds nothing.
    #[derive(Default)]
    struct RecordingBackend {
        detected: Mutex<Vec<Vec<SearchQuery>>>,
        modes: Mutex<Vec<(InstanceId, TrackingMode)>>,
        removed: Mutex<Vec<InstanceId>>,
        reject_modes: bool,
    }

    impl DetectionBackend for RecordingBackend {
        fn detect(&self, queries: Vec<SearchQuery>) -> BackendFuture<'_, Result<(), BackendError>> {
            self.detected.lock().push(queries);
            Box::pin(async { Ok(()) })
        }

        fn set_tracking_mode(
            &self,
            instance_id: InstanceId,
            mode: TrackingMode,
        ) -> Result<(), BackendError> {
            if self.reject_modes {
                return Err(BackendError::UnknownInstance(instance_id));
            }
            self.modes.lock().push((instance_id, mode));
            Ok(())
        }

        fn remove_instance(&self, instance_id: InstanceId) -> Result<(), BackendError> {
            self.removed.lock().push(instance_id);
            Ok(())
        }

        fn status(&self) -> BackendStatus {
            BackendStatus::Running
        }
    }

    fn unit_entry(model: ModelId) -> ModelEntry {
        ModelEntry::new(
            model,
            OrientedBox::axis_aligned(Vector3::zeros(), Vector3::repeat(1.0)),
            0.5,
        )
    }

    fn tracker_with(
        config: TrackerConfig,
        backend: Arc<RecordingBackend>,
        models: &[ModelId],
        camera: Arc<dyn CameraProvider>,
    ) -> ObjectTracker {
        let mut catalog = InMemoryCatalog::new();
        for model in models {
            catalog.insert(unit_entry(*model));
        }
        let (sender, queue) = event_queue();
        ObjectTracker::new(
            config,
            TrackerServices::new(backend, Arc::new(catalog), camera),
            sender,
            queue,
        )
    }

    fn tracker(backend: Arc<RecordingBackend>, models: &[ModelId]) -> ObjectTracker {
        tracker_with(
            TrackerConfig::default(),
            backend,
            models,
            Arc::new(FixedCamera(Pose::identity())),
        )
    }

    fn added(model: ModelId, position: Vector3<f32>) -> InstanceEventData {
        InstanceEventData::located(
            InstanceId::random(),
            model,
            Pose::at(position),
            0.8,
            TrackingMode::Coarse,
        )
    }

    async fn let_tasks_run() {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event handling tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_added_event_registers_instance() {
        let model = ModelId::random();
        let mut t = tracker(Arc::new(RecordingBackend::default()), &[model]);
        let data = added(model, Vector3::new(0.0, 0.0, 2.0));

        t.event_sender().enqueue(TrackerEvent::Added(data.clone()));
        t.tick();

        assert_eq!(t.tracked_count(), 1);
        assert!(t.snapshot().get(data.instance_id).is_some());
        assert_eq!(t.metrics().snapshot().instances_added, 1);
    }

    #[tokio::test]
    async fn test_unknown_removal_is_tolerated() {
        let model = ModelId::random();
        let mut t = tracker(Arc::new(RecordingBackend::default()), &[model]);

        t.event_sender()
            .enqueue(TrackerEvent::Removed(added(model, Vector3::zeros())));
        t.tick();

        assert_eq!(t.tracked_count(), 0);
        assert_eq!(t.metrics().snapshot().unknown_removals, 1);
    }

    #[tokio::test]
    async fn test_removed_event_drops_instance() {
        let model = ModelId::random();
        let mut t = tracker(Arc::new(RecordingBackend::default()), &[model]);
        let data = added(model, Vector3::new(0.0, 0.0, 2.0));

        t.event_sender().enqueue(TrackerEvent::Added(data.clone()));
        t.event_sender().enqueue(TrackerEvent::Removed(data));
        t.tick();

        assert_eq!(t.tracked_count(), 0);
        assert_eq!(t.metrics().snapshot().instances_removed, 1);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mode management tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_visible_instance_switched_to_accurate() {
        let model = ModelId::random();
        let backend = Arc::new(RecordingBackend::default());
        let mut t = tracker(backend.clone(), &[model]);
        let data = added(model, Vector3::new(0.0, 0.0, 2.0));

        t.event_sender().enqueue(TrackerEvent::Added(data.clone()));
        t.tick();

        assert_eq!(
            backend.modes.lock().as_slice(),
            &[(data.instance_id, TrackingMode::Accurate)]
        );
        assert_eq!(
            t.snapshot().get(data.instance_id).map(|i| i.mode),
            Some(TrackingMode::Accurate)
        );
    }

    #[tokio::test]
    async fn test_rejected_mode_leaves_registry_unchanged() {
        let model = ModelId::random();
        let backend = Arc::new(RecordingBackend {
            reject_modes: true,
            ..Default::default()
        });
        let mut t = tracker(backend, &[model]);
        let data = added(model, Vector3::new(0.0, 0.0, 2.0));

        t.event_sender().enqueue(TrackerEvent::Added(data.clone()));
        t.tick();

        assert_eq!(
            t.snapshot().get(data.instance_id).map(|i| i.mode),
            Some(TrackingMode::Coarse)
        );
        assert_eq!(t.metrics().snapshot().mode_command_failures, 1);
    }

    #[tokio::test]
    async fn test_manual_tracking_strategy_retargets() {
        let model = ModelId::random();
        let backend = Arc::new(RecordingBackend::default());
        let mut t = tracker(backend.clone(), &[model]);
        t.event_sender().enqueue(TrackerEvent::Added(added(
            model,
            Vector3::new(0.0, 0.0, 2.0),
        )));
        t.tick();

        t.set_tracking_strategy(TrackingStrategy::Pause);
        assert!(t.snapshot().iter().all(|i| i.mode == TrackingMode::Paused));
        assert_eq!(t.tracking_strategy(), TrackingStrategy::Pause);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scheduling tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_pruned_instance_removed_from_backend() {
        let model = ModelId::random();
        let backend = Arc::new(RecordingBackend::default());
        let mut t = tracker(backend.clone(), &[model]);
        let data = added(model, Vector3::new(0.0, 0.0, 10.0));

        t.event_sender().enqueue(TrackerEvent::Added(data.clone()));
        t.tick();

        assert_eq!(t.tracked_count(), 0);
        assert_eq!(backend.removed.lock().as_slice(), &[data.instance_id]);
    }

    #[tokio::test]
    async fn test_no_camera_skips_cycle() {
        let model = ModelId::random();
        let backend = Arc::new(RecordingBackend::default());
        let camera = Arc::new(SharedCamera::new(None));
        let mut t = tracker_with(TrackerConfig::default(), backend.clone(), &[model], camera.clone());

        t.tick();
        let_tasks_run().await;
        assert!(backend.detected.lock().is_empty());

        camera.set(Some(Pose::identity()));
        t.tick();
        let_tasks_run().await;
        assert_eq!(backend.detected.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_start_query_builds_global_box() {
        let a = ModelId::random();
        let b = ModelId::random();
        let backend = Arc::new(RecordingBackend::default());
        let mut config = TrackerConfig::default();
        config.strategy.detection = DetectionStrategy::Manual;
        let mut t = tracker_with(
            config,
            backend.clone(),
            &[a, b],
            Arc::new(FixedCamera(Pose::at(Vector3::new(1.0, 2.0, 3.0)))),
        );

        assert!(t.start_query());
        t.tick();
        let_tasks_run().await;

        let detected = backend.detected.lock();
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].len(), 2);
        for query in &detected[0] {
            let SearchArea::Box(bounds) = query.area else {
                panic!("expected a box area");
            };
            assert_eq!(bounds.center, Vector3::new(1.0, 2.0, 3.0));
            assert_eq!(bounds.extents, Vector3::repeat(5.0));
        }
    }

    /// Catalog that lists one model it has no entry for.
    struct DesyncedCatalog {
        inner: InMemoryCatalog,
        orphan: ModelId,
    }

    impl ModelCatalog for DesyncedCatalog {
        fn bounding_box(&self, model_id: ModelId) -> Option<OrientedBox> {
            self.inner.bounding_box(model_id)
        }

        fn model_ids(&self) -> Vec<ModelId> {
            let mut ids = self.inner.model_ids();
            ids.push(self.orphan);
            ids
        }

        fn entry(&self, model_id: ModelId) -> Option<ModelEntry> {
            self.inner.entry(model_id)
        }
    }

    #[tokio::test]
    #[cfg_attr(debug_assertions, should_panic(expected = "catalog has no entry"))]
    async fn test_queries_in_bounds_skip_models_without_entry() {
        let known = ModelId::random();
        let catalog = DesyncedCatalog {
            inner: InMemoryCatalog::new().with_entry(unit_entry(known)),
            orphan: ModelId::random(),
        };
        let (sender, queue) = event_queue();
        let mut t = ObjectTracker::new(
            TrackerConfig::default(),
            TrackerServices::new(
                Arc::new(RecordingBackend::default()),
                Arc::new(catalog),
                Arc::new(FixedCamera(Pose::identity())),
            ),
            sender,
            queue,
        );

        let bounds = OrientedBox::axis_aligned(Vector3::zeros(), Vector3::repeat(2.0));
        assert_eq!(t.queue_queries_in_bounds(bounds), 1);
        assert_eq!(t.scheduler().pending_len(), 1);
    }

    #[tokio::test]
    async fn test_start_query_without_camera() {
        let backend = Arc::new(RecordingBackend::default());
        let mut t = tracker_with(
            TrackerConfig::default(),
            backend,
            &[ModelId::random()],
            Arc::new(SharedCamera::new(None)),
        );
        assert!(!t.start_query());
        assert_eq!(t.scheduler().pending_len(), 0);
    }

    #[tokio::test]
    async fn test_manual_detection_with_empty_queue_cools_down() {
        let backend = Arc::new(RecordingBackend::default());
        let mut config = TrackerConfig::default();
        config.strategy.detection = DetectionStrategy::Manual;
        let mut t = tracker_with(
            config,
            backend.clone(),
            &[ModelId::random()],
            Arc::new(FixedCamera(Pose::identity())),
        );

        t.tick();
        let_tasks_run().await;
        assert!(backend.detected.lock().is_empty());
        assert!(matches!(t.status().scheduler_state, SchedulerState::Cooldown { .. }));
    }

    #[tokio::test]
    async fn test_pause_discards_pending() {
        let backend = Arc::new(RecordingBackend::default());
        let mut config = TrackerConfig::default();
        config.strategy.detection = DetectionStrategy::Manual;
        let mut t = tracker_with(
            config,
            backend.clone(),
            &[ModelId::random()],
            Arc::new(FixedCamera(Pose::identity())),
        );

        t.start_query();
        t.start_query();
        t.pause();
        assert_eq!(t.scheduler().pending_len(), 0);

        t.tick();
        let_tasks_run().await;
        assert!(backend.detected.lock().is_empty());
        assert!(t.status().paused);

        t.resume();
        t.start_query();
        t.tick();
        let_tasks_run().await;
        assert_eq!(backend.detected.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_paused_event_clears_queue() {
        let backend = Arc::new(RecordingBackend::default());
        let mut config = TrackerConfig::default();
        config.strategy.detection = DetectionStrategy::Manual;
        let mut t = tracker_with(
            config,
            backend.clone(),
            &[ModelId::random()],
            Arc::new(FixedCamera(Pose::identity())),
        );

        t.start_query();
        t.event_sender()
            .enqueue(TrackerEvent::RunningChanged(BackendStatus::Paused));
        t.tick();

        assert_eq!(t.scheduler().pending_len(), 0);
        assert_eq!(t.status().backend_status, BackendStatus::Paused);
    }

    #[tokio::test]
    async fn test_completion_event_clears_active_batch() {
        let backend = Arc::new(RecordingBackend::default());
        let mut t = tracker(backend, &[ModelId::random()]);

        t.tick();
        assert!(t.status().is_detecting());
        let_tasks_run().await;

        // Completion is applied, then the next autonomous batch goes out.
        t.tick();
        let metrics = t.metrics().snapshot();
        assert_eq!(metrics.detections_succeeded, 1);
        assert_eq!(metrics.detections_attempted, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let backend = Arc::new(RecordingBackend::default());
        let t = tracker(backend, &[ModelId::random()]);
        let status = t.shared_status();
        let token = CancellationToken::new();

        let handle = tokio::spawn(t.run(token.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(status.get().updated_at.is_some());
    }
}
