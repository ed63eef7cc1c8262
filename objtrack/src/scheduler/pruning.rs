//! Distance-based staleness pruning.
//!
//! A located instance whose bounding-box centre lies farther from the camera
//! than `far_distance * factor` is treated as lost and dropped.

use crate::catalog::ModelCatalog;
use crate::geometry::Pose;
use crate::model::TrackedInstance;
use crate::registry::InstanceRegistry;

/// Drops located instances that are too far from the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessPruner {
    far_distance: f32,
    factor: f32,
}

impl StalenessPruner {
    pub fn new(far_distance: f32, factor: f32) -> Self {
        Self {
            far_distance,
            factor,
        }
    }

    pub fn max_distance(&self) -> f32 {
        self.far_distance * self.factor
    }

    /// Distance from the camera to the instance's bounding-box centre.
    ///
    /// `None` for unlocated instances and unknown models.
    pub fn distance(
        &self,
        instance: &TrackedInstance,
        catalog: &dyn ModelCatalog,
        camera: &Pose,
    ) -> Option<f32> {
        let pose = instance.pose?;
        let bbox = catalog.bounding_box(instance.model_id)?;
        let center = bbox.placed_at(&pose).center;
        Some(camera.distance_to(&center))
    }

    pub fn is_stale(
        &self,
        instance: &TrackedInstance,
        catalog: &dyn ModelCatalog,
        camera: &Pose,
    ) -> bool {
        self.distance(instance, catalog, camera)
            .is_some_and(|d| d > self.max_distance())
    }

    /// Remove and return every stale instance.
    pub fn prune(
        &self,
        registry: &mut InstanceRegistry,
        catalog: &dyn ModelCatalog,
        camera: &Pose,
    ) -> Vec<TrackedInstance> {
        let pruned = registry.prune_if(|instance| self.is_stale(instance, catalog, camera));
        for instance in &pruned {
            tracing::info!(
                instance = %instance.instance_id,
                model = %instance.model_id,
                max_distance = self.max_distance(),
                "Pruned distant instance"
            );
        }
        pruned
    }
}
