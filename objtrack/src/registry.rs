//! Authoritative store of tracked instances.
//!
//! The registry is owned by the tick loop and is the only place tracking
//! state is mutated. Readers on other threads get a [`RegistrySnapshot`],
//! an immutable point-in-time copy that is cheap to clone.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::model::{InstanceEventData, InstanceId, ModelId, TrackedInstance, TrackingMode};

/// Errors raised by registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Instance not found: {0}")]
    NotFound(InstanceId),
}

/// Result of [`InstanceRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting of the instance id.
    Added,
    Updated,
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UpsertOutcome::Added)
    }
}

/// Map from instance id to tracked state.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: HashMap<InstanceId, TrackedInstance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record or update the existing one in place.
    pub fn upsert(&mut self, data: &InstanceEventData) -> UpsertOutcome {
        match self.instances.get_mut(&data.instance_id) {
            Some(existing) => {
                existing.apply(data);
                UpsertOutcome::Updated
            }
            None => {
                self.instances
                    .insert(data.instance_id, TrackedInstance::from_event(data));
                UpsertOutcome::Added
            }
        }
    }

    /// Remove a record, returning it.
    pub fn remove(&mut self, instance_id: InstanceId) -> Result<TrackedInstance, RegistryError> {
        self.instances
            .remove(&instance_id)
            .ok_or(RegistryError::NotFound(instance_id))
    }

    /// Remove and return every record matching `predicate`.
    pub fn prune_if<F>(&mut self, mut predicate: F) -> Vec<TrackedInstance>
    where
        F: FnMut(&TrackedInstance) -> bool,
    {
        let doomed: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|instance| predicate(instance))
            .map(|instance| instance.instance_id)
            .collect();

        doomed
            .into_iter()
            .filter_map(|id| self.instances.remove(&id))
            .collect()
    }

    /// Record a tracking mode accepted by the backend.
    pub fn set_mode(
        &mut self,
        instance_id: InstanceId,
        mode: TrackingMode,
    ) -> Result<(), RegistryError> {
        let instance = self
            .instances
            .get_mut(&instance_id)
            .ok_or(RegistryError::NotFound(instance_id))?;
        instance.mode = mode;
        Ok(())
    }

    pub fn get(&self, instance_id: InstanceId) -> Option<&TrackedInstance> {
        self.instances.get(&instance_id)
    }

    pub fn contains(&self, instance_id: InstanceId) -> bool {
        self.instances.contains_key(&instance_id)
    }

    /// Whether any tracked instance belongs to `model_id`.
    pub fn has_model(&self, model_id: ModelId) -> bool {
        self.instances.values().any(|i| i.model_id == model_id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Point-in-time copy of every record, ordered by instance id.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut instances: Vec<TrackedInstance> = self.instances.values().cloned().collect();
        instances.sort_by_key(|i| i.instance_id);
        RegistrySnapshot {
            instances: Arc::new(instances),
        }
    }
}

/// Immutable copy of the registry.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    instances: Arc<Vec<TrackedInstance>>,
}

impl RegistrySnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &TrackedInstance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, instance_id: InstanceId) -> Option<&TrackedInstance> {
        self.instances.iter().find(|i| i.instance_id == instance_id)
    }

    pub fn has_model(&self, model_id: ModelId) -> bool {
        self.instances.iter().any(|i| i.model_id == model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pose;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    fn event(instance_id: InstanceId, model_id: ModelId, coverage: f32) -> InstanceEventData {
        InstanceEventData::located(
            instance_id,
            model_id,
            Pose::at(Vector3::zeros()),
            coverage,
            TrackingMode::Coarse,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_upsert_reports_first_sight() {
        let mut registry = InstanceRegistry::new();
        let id = InstanceId::random();
        let model = ModelId::random();

        assert_eq!(registry.upsert(&event(id, model, 0.2)), UpsertOutcome::Added);
        assert_eq!(registry.upsert(&event(id, model, 0.6)), UpsertOutcome::Updated);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).unwrap().coverage, 0.6);
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let mut registry = InstanceRegistry::new();
        let id = InstanceId::random();
        assert_eq!(registry.remove(id), Err(RegistryError::NotFound(id)));
    }

    #[test]
    fn test_remove_returns_record() {
        let mut registry = InstanceRegistry::new();
        let id = InstanceId::random();
        registry.upsert(&event(id, ModelId::random(), 0.5));

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.instance_id, id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_prune_if_removes_matching() {
        let mut registry = InstanceRegistry::new();
        let low = InstanceId::random();
        let high = InstanceId::random();
        registry.upsert(&event(low, ModelId::random(), 0.1));
        registry.upsert(&event(high, ModelId::random(), 0.9));

        let pruned = registry.prune_if(|i| i.coverage < 0.5);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].instance_id, low);
        assert!(registry.contains(high));
        assert!(!registry.contains(low));
    }

    #[test]
    fn test_set_mode() {
        let mut registry = InstanceRegistry::new();
        let id = InstanceId::random();
        registry.upsert(&event(id, ModelId::random(), 0.5));

        registry.set_mode(id, TrackingMode::Accurate).unwrap();
        assert_eq!(registry.get(id).unwrap().mode, TrackingMode::Accurate);
        assert!(registry.set_mode(InstanceId::random(), TrackingMode::Paused).is_err());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_snapshot_is_detached() {
        let mut registry = InstanceRegistry::new();
        let id = InstanceId::random();
        let model = ModelId::random();
        registry.upsert(&event(id, model, 0.5));

        let snapshot = registry.snapshot();
        registry.remove(id).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.has_model(model));
        assert!(snapshot.get(id).is_some());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_has_model() {
        let mut registry = InstanceRegistry::new();
        let model = ModelId::random();
        assert!(!registry.has_model(model));
        registry.upsert(&event(InstanceId::random(), model, 0.5));
        assert!(registry.has_model(model));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Property tests
    // ─────────────────────────────────────────────────────────────────────────

    mod property_tests {
        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Added(usize),
            Updated(usize),
            Removed(usize),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..4).prop_map(Op::Added),
                (0usize..4).prop_map(Op::Updated),
                (0usize..4).prop_map(Op::Removed),
            ]
        }

        proptest! {
            #[test]
            fn ids_stay_unique(ops in prop::collection::vec(op_strategy(), 0..64)) {
                let ids: Vec<InstanceId> = (0..4).map(|_| InstanceId::random()).collect();
                let model = ModelId::random();
                let mut registry = InstanceRegistry::new();

                for op in &ops {
                    match *op {
                        Op::Added(i) | Op::Updated(i) => {
                            registry.upsert(&event(ids[i], model, 0.5));
                        }
                        Op::Removed(i) => {
                            let _ = registry.remove(ids[i]);
                        }
                    }

                    let snapshot = registry.snapshot();
                    for id in &ids {
                        let count = snapshot.iter().filter(|inst| inst.instance_id == *id).count();
                        prop_assert!(count <= 1);
                    }
                }

                // A trailing removal always leaves the id absent.
                for (i, id) in ids.iter().enumerate() {
                    let last = ops.iter().rev().find(|op| match op {
                        Op::Added(j) | Op::Updated(j) | Op::Removed(j) => *j == i,
                    });
                    if let Some(Op::Removed(_)) = last {
                        prop_assert!(!registry.contains(*id));
                    }
                }
            }
        }
    }
}
