//! Core tracking data types.
//!
//! [`TrackedInstance`] is the registry's record for one located occurrence of
//! a model. Backend callbacks carry an [`InstanceEventData`] payload that is
//! applied to the record in place.

use std::fmt;

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use uuid::Uuid;

use crate::geometry::Pose;

/// Opaque identity of a tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for InstanceId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a model in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(Uuid);

impl ModelId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ModelId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fidelity tier at which an instance's pose is refreshed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackingMode {
    /// High latency, high precision.
    Accurate,
    /// Low latency, coarse precision.
    #[default]
    Coarse,
    /// No pose refresh.
    Paused,
}

impl TrackingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingMode::Accurate => "accurate",
            TrackingMode::Coarse => "coarse",
            TrackingMode::Paused => "paused",
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an added/updated/removed backend callback.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceEventData {
    pub instance_id: InstanceId,
    pub model_id: ModelId,
    /// Absent while the instance is not currently located.
    pub pose: Option<Pose>,
    pub coverage: f32,
    pub scale_change: Vector3<f32>,
    pub mode: TrackingMode,
    pub timestamp: DateTime<Utc>,
}

impl InstanceEventData {
    /// Event for a located instance with unit scale, stamped now.
    pub fn located(
        instance_id: InstanceId,
        model_id: ModelId,
        pose: Pose,
        coverage: f32,
        mode: TrackingMode,
    ) -> Self {
        Self {
            instance_id,
            model_id,
            pose: Some(pose),
            coverage,
            scale_change: Vector3::repeat(1.0),
            mode,
            timestamp: Utc::now(),
        }
    }
}

/// Registry record for one tracked instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedInstance {
    pub instance_id: InstanceId,
    pub model_id: ModelId,
    pub pose: Option<Pose>,
    /// Per-axis deviation from the model's canonical scale.
    pub scale_change: Vector3<f32>,
    /// Surface coverage ratio in `[0, 1]`.
    pub coverage: f32,
    pub mode: TrackingMode,
    pub last_updated: DateTime<Utc>,
}

impl TrackedInstance {
    /// Build a record from the first event seen for an instance.
    pub fn from_event(data: &InstanceEventData) -> Self {
        Self {
            instance_id: data.instance_id,
            model_id: data.model_id,
            pose: data.pose,
            scale_change: data.scale_change,
            coverage: data.coverage.clamp(0.0, 1.0),
            mode: data.mode,
            last_updated: data.timestamp,
        }
    }

    /// Replace every mutable field from an update event.
    pub fn apply(&mut self, data: &InstanceEventData) {
        self.model_id = data.model_id;
        self.pose = data.pose;
        self.scale_change = data.scale_change;
        self.coverage = data.coverage.clamp(0.0, 1.0);
        self.mode = data.mode;
        self.last_updated = data.timestamp;
    }

    pub fn is_located(&self) -> bool {
        self.pose.is_some()
    }
}
