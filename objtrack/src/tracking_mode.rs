//! Per-instance tracking-mode assignment.
//!
//! | Strategy | Behaviour |
//! |----------|-----------|
//! | `Auto` | Accurate while the instance's logical centre is in view, paused otherwise |
//! | `Accurate` / `Coarse` / `Pause` | Every instance forced to the matching mode |
//!
//! The manager only produces [`ModeCommand`]s. Commands are emitted solely
//! for instances whose recorded mode differs from the desired one, so
//! re-evaluating every tick is idempotent and retries failed pushes.

use crate::catalog::ModelCatalog;
use crate::config::TrackingStrategy;
use crate::geometry::FieldOfView;
use crate::model::{InstanceId, TrackedInstance, TrackingMode};
use crate::registry::RegistrySnapshot;

/// Request to move one instance to a tracking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeCommand {
    pub instance_id: InstanceId,
    pub mode: TrackingMode,
}

/// Mode a manual strategy forces. `None` for `Auto`.
pub fn forced_mode(strategy: TrackingStrategy) -> Option<TrackingMode> {
    match strategy {
        TrackingStrategy::Auto => None,
        TrackingStrategy::Accurate => Some(TrackingMode::Accurate),
        TrackingStrategy::Coarse => Some(TrackingMode::Coarse),
        TrackingStrategy::Pause => Some(TrackingMode::Paused),
    }
}

#[derive(Debug, Clone)]
pub struct TrackingModeManager {
    strategy: TrackingStrategy,
}

impl TrackingModeManager {
    pub fn new(strategy: TrackingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> TrackingStrategy {
        self.strategy
    }

    /// Switch strategy. Manual strategies immediately retarget every instance.
    pub fn set_strategy(
        &mut self,
        strategy: TrackingStrategy,
        snapshot: &RegistrySnapshot,
    ) -> Vec<ModeCommand> {
        if strategy != self.strategy {
            tracing::info!(from = %self.strategy, to = %strategy, "Tracking strategy changed");
        }
        self.strategy = strategy;

        match forced_mode(strategy) {
            Some(mode) => snapshot
                .iter()
                .filter_map(|instance| Self::command_if_differs(instance, mode))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Command for a newly discovered instance whose mode is off-target.
    pub fn on_instance_seen(&self, instance: &TrackedInstance) -> Option<ModeCommand> {
        let mode = forced_mode(self.strategy)?;
        Self::command_if_differs(instance, mode)
    }

    /// Desired mode for one instance under the current strategy.
    pub fn desired_mode(
        &self,
        instance: &TrackedInstance,
        catalog: &dyn ModelCatalog,
        fov: &FieldOfView,
    ) -> TrackingMode {
        if let Some(mode) = forced_mode(self.strategy) {
            return mode;
        }
        let visible = instance.pose.is_some_and(|pose| {
            let center = catalog
                .bounding_box(instance.model_id)
                .map(|bbox| bbox.placed_at(&pose).center)
                .unwrap_or(pose.position);
            fov.within_angles(&center)
        });
        if visible {
            TrackingMode::Accurate
        } else {
            TrackingMode::Paused
        }
    }

    /// Commands bringing every instance to its desired mode.
    pub fn evaluate(
        &self,
        snapshot: &RegistrySnapshot,
        catalog: &dyn ModelCatalog,
        fov: &FieldOfView,
    ) -> Vec<ModeCommand> {
        snapshot
            .iter()
            .filter_map(|instance| {
                let mode = self.desired_mode(instance, catalog, fov);
                Self::command_if_differs(instance, mode)
            })
            .collect()
    }

    fn command_if_differs(instance: &TrackedInstance, mode: TrackingMode) -> Option<ModeCommand> {
        (instance.mode != mode).then_some(ModeCommand {
            instance_id: instance.instance_id,
            mode,
        })
    }
}

impl Default for TrackingModeManager {
    fn default() -> Self {
        Self::new(TrackingStrategy::Auto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, ModelEntry};
    use crate::geometry::{OrientedBox, Pose};
    use crate::model::{InstanceEventData, ModelId};
    use crate::registry::InstanceRegistry;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    fn fov() -> FieldOfView {
        FieldOfView::new(Pose::identity(), 4.0, 90.0, 1.0)
    }

    fn catalog(model: ModelId) -> InMemoryCatalog {
        InMemoryCatalog::new().with_entry(ModelEntry::new(
            model,
            OrientedBox::axis_aligned(Vector3::zeros(), Vector3::repeat(1.0)),
            0.5,
        ))
    }

    fn registry_with(
        model: ModelId,
        positions: &[(Vector3<f32>, TrackingMode)],
    ) -> InstanceRegistry {
        let mut registry = InstanceRegistry::new();
        for (position, mode) in positions {
            registry.upsert(&InstanceEventData::located(
                InstanceId::random(),
                model,
                Pose::at(*position),
                0.5,
                *mode,
            ));
        }
        registry
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auto strategy tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_auto_visible_becomes_accurate() {
        let model = ModelId::random();
        let registry = registry_with(model, &[(Vector3::new(0.0, 0.0, 2.0), TrackingMode::Coarse)]);
        let manager = TrackingModeManager::default();

        let commands = manager.evaluate(&registry.snapshot(), &catalog(model), &fov());
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].mode, TrackingMode::Accurate);
    }

    #[test]
    fn test_auto_hidden_becomes_paused() {
        let model = ModelId::random();
        let registry = registry_with(model, &[(Vector3::new(0.0, 0.0, -2.0), TrackingMode::Accurate)]);
        let manager = TrackingModeManager::default();

        let commands = manager.evaluate(&registry.snapshot(), &catalog(model), &fov());
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].mode, TrackingMode::Paused);
    }

    #[test]
    fn test_auto_beyond_far_plane_still_visible() {
        let model = ModelId::random();
        let registry = registry_with(model, &[(Vector3::new(0.0, 0.0, 20.0), TrackingMode::Accurate)]);
        let manager = TrackingModeManager::default();

        assert!(manager
            .evaluate(&registry.snapshot(), &catalog(model), &fov())
            .is_empty());
    }

    #[test]
    fn test_auto_no_command_when_already_correct() {
        let model = ModelId::random();
        let registry = registry_with(
            model,
            &[
                (Vector3::new(0.0, 0.0, 2.0), TrackingMode::Accurate),
                (Vector3::new(5.0, 0.0, -1.0), TrackingMode::Paused),
            ],
        );
        let manager = TrackingModeManager::default();
        assert!(manager
            .evaluate(&registry.snapshot(), &catalog(model), &fov())
            .is_empty());
    }

    #[test]
    fn test_auto_unlocated_is_paused() {
        let model = ModelId::random();
        let mut registry = InstanceRegistry::new();
        let mut data = InstanceEventData::located(
            InstanceId::random(),
            model,
            Pose::identity(),
            0.5,
            TrackingMode::Accurate,
        );
        data.pose = None;
        registry.upsert(&data);

        let commands =
            TrackingModeManager::default().evaluate(&registry.snapshot(), &catalog(model), &fov());
        assert_eq!(commands[0].mode, TrackingMode::Paused);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Manual strategy tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_manual_strategy_change_retargets_all() {
        let model = ModelId::random();
        let registry = registry_with(
            model,
            &[
                (Vector3::new(0.0, 0.0, 2.0), TrackingMode::Accurate),
                (Vector3::new(0.0, 0.0, -2.0), TrackingMode::Paused),
                (Vector3::new(1.0, 0.0, 2.0), TrackingMode::Coarse),
            ],
        );
        let mut manager = TrackingModeManager::default();

        let commands = manager.set_strategy(TrackingStrategy::Coarse, &registry.snapshot());
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.mode == TrackingMode::Coarse));
        assert_eq!(manager.strategy(), TrackingStrategy::Coarse);
    }

    #[test]
    fn test_switch_to_auto_issues_nothing() {
        let model = ModelId::random();
        let registry = registry_with(model, &[(Vector3::new(0.0, 0.0, 2.0), TrackingMode::Coarse)]);
        let mut manager = TrackingModeManager::new(TrackingStrategy::Pause);
        assert!(manager
            .set_strategy(TrackingStrategy::Auto, &registry.snapshot())
            .is_empty());
    }

    #[test]
    fn test_new_instance_under_manual_strategy() {
        let model = ModelId::random();
        let registry = registry_with(model, &[(Vector3::new(0.0, 0.0, 2.0), TrackingMode::Coarse)]);
        let snapshot = registry.snapshot();
        let instance = snapshot.iter().next().unwrap();

        let manager = TrackingModeManager::new(TrackingStrategy::Accurate);
        let command = manager.on_instance_seen(instance).unwrap();
        assert_eq!(command.mode, TrackingMode::Accurate);

        let manager = TrackingModeManager::new(TrackingStrategy::Coarse);
        assert!(manager.on_instance_seen(instance).is_none());

        let manager = TrackingModeManager::new(TrackingStrategy::Auto);
        assert!(manager.on_instance_seen(instance).is_none());
    }

    #[test]
    fn test_manual_evaluate_forces_mode_regardless_of_view() {
        let model = ModelId::random();
        let registry = registry_with(model, &[(Vector3::new(0.0, 0.0, -2.0), TrackingMode::Paused)]);
        let manager = TrackingModeManager::new(TrackingStrategy::Accurate);
        let commands = manager.evaluate(&registry.snapshot(), &catalog(model), &fov());
        assert_eq!(commands[0].mode, TrackingMode::Accurate);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Property tests
    // ─────────────────────────────────────────────────────────────────────────

    mod property_tests {
        use super::*;

        fn mode_strategy() -> impl Strategy<Value = TrackingMode> {
            prop_oneof![
                Just(TrackingMode::Accurate),
                Just(TrackingMode::Coarse),
                Just(TrackingMode::Paused),
            ]
        }

        proptest! {
            #[test]
            fn auto_mode_matches_visibility(
                instances in prop::collection::vec(
                    ((-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0), mode_strategy()),
                    1..12),
            ) {
                let model = ModelId::random();
                let positions: Vec<_> = instances
                    .iter()
                    .map(|((x, y, z), mode)| (Vector3::new(*x, *y, *z), *mode))
                    .collect();
                let mut registry = registry_with(model, &positions);
                let catalog = catalog(model);
                let fov = fov();
                let manager = TrackingModeManager::default();

                for command in manager.evaluate(&registry.snapshot(), &catalog, &fov) {
                    registry.set_mode(command.instance_id, command.mode).unwrap();
                }

                for instance in registry.snapshot().iter() {
                    let center = instance.pose.unwrap().position;
                    if fov.within_angles(&center) {
                        prop_assert_ne!(instance.mode, TrackingMode::Paused);
                    } else {
                        prop_assert_ne!(instance.mode, TrackingMode::Accurate);
                    }
                }
            }
        }
    }
}
