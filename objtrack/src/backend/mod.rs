//! Seams to the perception backend and the camera.
//!
//! The tracker never performs detection itself. It hands query batches to a
//! [`DetectionBackend`], which reports what it finds by enqueuing
//! [`TrackerEvent`](crate::events::TrackerEvent)s from its own threads.
//!
//! # Thread Safety
//!
//! Both traits are `Send + Sync` so they can be shared as `Arc<dyn ...>`
//! between the tick loop and the spawned detection task.

mod simulated;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::geometry::Pose;
use crate::model::{InstanceId, TrackingMode};
use crate::query::SearchQuery;

pub use simulated::{SceneObject, SimulatedBackend};

/// Boxed future type for dyn-compatible async methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by a detection backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The detection call itself failed.
    #[error("Detection failed: {0}")]
    Detection(String),

    /// The backend does not know the instance.
    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// The backend is paused or shutting down.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Whether the backend is currently processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendStatus {
    #[default]
    Running,
    Paused,
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendStatus::Running => write!(f, "running"),
            BackendStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Opaque detection engine.
pub trait DetectionBackend: Send + Sync {
    /// Search for the queried models.
    ///
    /// Results arrive as events; the future only reports whether the call
    /// itself succeeded.
    fn detect(&self, queries: Vec<SearchQuery>) -> BackendFuture<'_, Result<(), BackendError>>;

    /// Change the fidelity at which an instance is tracked.
    fn set_tracking_mode(
        &self,
        instance_id: InstanceId,
        mode: TrackingMode,
    ) -> Result<(), BackendError>;

    /// Stop tracking an instance.
    fn remove_instance(&self, instance_id: InstanceId) -> Result<(), BackendError>;

    fn status(&self) -> BackendStatus;
}

/// Source of the current camera pose.
pub trait CameraProvider: Send + Sync {
    /// `None` while the world frame is not yet established.
    fn current_camera_pose(&self) -> Option<Pose>;
}

/// Camera that never moves.
#[derive(Debug, Clone, Copy)]
pub struct FixedCamera(pub Pose);

impl CameraProvider for FixedCamera {
    fn current_camera_pose(&self) -> Option<Pose> {
        Some(self.0)
    }
}

/// Camera pose shared with another thread.
#[derive(Debug, Default)]
pub struct SharedCamera {
    pose: parking_lot::RwLock<Option<Pose>>,
}

impl SharedCamera {
    pub fn new(pose: Option<Pose>) -> Self {
        Self {
            pose: parking_lot::RwLock::new(pose),
        }
    }

    pub fn set(&self, pose: Option<Pose>) {
        *self.pose.write() = pose;
    }
}

impl CameraProvider for SharedCamera {
    fn current_camera_pose(&self) -> Option<Pose> {
        *self.pose.read()
    }
}
