//! In-process detection backend over a scripted scene.
//!
//! Objects placed in the scene are "found" when a query for their model
//! covers their position and their coverage meets the query's minimum.
//! Results are reported through the event queue, like a real backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use nalgebra::Vector3;
use parking_lot::Mutex;

use super::{BackendError, BackendFuture, BackendStatus, DetectionBackend};
use crate::events::{EventSender, TrackerEvent};
use crate::geometry::Pose;
use crate::model::{InstanceEventData, InstanceId, ModelId, TrackingMode};
use crate::query::SearchQuery;

/// An object physically present in the simulated scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub model_id: ModelId,
    pub pose: Pose,
    /// Coverage reported when the object is detected.
    pub coverage: f32,
}

impl SceneObject {
    pub fn new(model_id: ModelId, pose: Pose, coverage: f32) -> Self {
        Self {
            model_id,
            pose,
            coverage,
        }
    }
}

#[derive(Debug)]
struct Located {
    scene_index: usize,
    mode: TrackingMode,
}

#[derive(Debug, Default)]
struct SimState {
    scene: Vec<SceneObject>,
    located: HashMap<InstanceId, Located>,
    status: BackendStatus,
}

impl SimState {
    fn event_data(&self, instance_id: InstanceId, located: &Located) -> Option<InstanceEventData> {
        let object = self.scene.get(located.scene_index)?;
        Some(InstanceEventData {
            instance_id,
            model_id: object.model_id,
            pose: Some(object.pose),
            coverage: object.coverage,
            scale_change: Vector3::repeat(1.0),
            mode: located.mode,
            timestamp: Utc::now(),
        })
    }
}

/// Scripted backend for demos and tests.
#[derive(Debug)]
pub struct SimulatedBackend {
    events: EventSender,
    state: Mutex<SimState>,
    latency: Duration,
    failures_pending: AtomicUsize,
    detect_calls: AtomicU64,
}

impl SimulatedBackend {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            state: Mutex::new(SimState::default()),
            latency: Duration::from_millis(5),
            failures_pending: AtomicUsize::new(0),
            detect_calls: AtomicU64::new(0),
        }
    }

    /// Delay before a detection call reports its results.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Place an object in the scene, returning its index.
    pub fn add_object(&self, object: SceneObject) -> usize {
        let mut state = self.state.lock();
        state.scene.push(object);
        state.scene.len() - 1
    }

    /// Move a scene object. Located instances of it report the new pose.
    pub fn move_object(&self, index: usize, pose: Pose) {
        let mut state = self.state.lock();
        let Some(object) = state.scene.get_mut(index) else {
            return;
        };
        object.pose = pose;

        let updates: Vec<InstanceEventData> = state
            .located
            .iter()
            .filter(|(_, located)| located.scene_index == index)
            .filter(|(_, located)| located.mode != TrackingMode::Paused)
            .filter_map(|(id, located)| state.event_data(*id, located))
            .collect();
        drop(state);

        for data in updates {
            self.events.enqueue(TrackerEvent::Updated(data));
        }
    }

    /// Make the next `count` detection calls fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Switch running state and report it.
    pub fn set_status(&self, status: BackendStatus) {
        self.state.lock().status = status;
        self.events.enqueue(TrackerEvent::RunningChanged(status));
    }

    pub fn detect_calls(&self) -> u64 {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn located_count(&self) -> usize {
        self.state.lock().located.len()
    }

    pub fn mode_of(&self, instance_id: InstanceId) -> Option<TrackingMode> {
        self.state.lock().located.get(&instance_id).map(|l| l.mode)
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Match queries against the scene and collect the resulting events.
    fn run_queries(&self, queries: &[SearchQuery]) -> Vec<TrackerEvent> {
        let mut state = self.state.lock();
        let mut events = Vec::new();

        for query in queries {
            let matches: Vec<usize> = state
                .scene
                .iter()
                .enumerate()
                .filter(|(_, object)| object.model_id == query.model_id)
                .filter(|(_, object)| object.coverage >= query.scan.min_coverage)
                .filter(|(_, object)| query.area.contains(&object.pose.position))
                .map(|(index, _)| index)
                .collect();

            for scene_index in matches {
                let existing = state
                    .located
                    .iter()
                    .find(|(_, located)| located.scene_index == scene_index)
                    .map(|(id, _)| *id);

                let (instance_id, added) = match existing {
                    Some(id) => (id, false),
                    None => {
                        let id = InstanceId::random();
                        state.located.insert(
                            id,
                            Located {
                                scene_index,
                                mode: TrackingMode::Coarse,
                            },
                        );
                        (id, true)
                    }
                };

                let data = state
                    .located
                    .get(&instance_id)
                    .and_then(|located| state.event_data(instance_id, located));
                if let Some(data) = data {
                    events.push(if added {
                        TrackerEvent::Added(data)
                    } else {
                        TrackerEvent::Updated(data)
                    });
                }
            }
        }

        events
    }
}

impl DetectionBackend for SimulatedBackend {
    fn detect(&self, queries: Vec<SearchQuery>) -> BackendFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            self.detect_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;

            if self.take_failure() {
                return Err(BackendError::Detection("simulated failure".to_string()));
            }
            if self.status() == BackendStatus::Paused {
                return Err(BackendError::Unavailable("backend paused".to_string()));
            }

            let events = self.run_queries(&queries);
            tracing::debug!(
                queries = queries.len(),
                results = events.len(),
                "Simulated detection finished"
            );
            for event in events {
                self.events.enqueue(event);
            }
            Ok(())
        })
    }

    fn set_tracking_mode(
        &self,
        instance_id: InstanceId,
        mode: TrackingMode,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let located = state
            .located
            .get_mut(&instance_id)
            .ok_or(BackendError::UnknownInstance(instance_id))?;
        located.mode = mode;

        let data = state
            .located
            .get(&instance_id)
            .and_then(|located| state.event_data(instance_id, located));
        drop(state);

        if let Some(data) = data {
            self.events.enqueue(TrackerEvent::Updated(data));
        }
        Ok(())
    }

    fn remove_instance(&self, instance_id: InstanceId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let located = state
            .located
            .remove(&instance_id)
            .ok_or(BackendError::UnknownInstance(instance_id))?;
        let data = state.event_data(instance_id, &located);
        drop(state);

        if let Some(data) = data {
            self.events.enqueue(TrackerEvent::Removed(data));
        }
        Ok(())
    }

    fn status(&self) -> BackendStatus {
        self.state.lock().status
    }
}
