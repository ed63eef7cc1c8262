//! Model catalog: the read-only source of canonical bounding boxes.
//!
//! The tracker never mutates catalog entries. [`InMemoryCatalog`] is the
//! stock implementation; hosts with their own asset store implement
//! [`ModelCatalog`] directly.

use std::collections::BTreeMap;

use crate::geometry::OrientedBox;
use crate::model::ModelId;

/// Read-only access to model metadata.
pub trait ModelCatalog: Send + Sync {
    /// Canonical bounding box of a model, if the model is known.
    fn bounding_box(&self, model_id: ModelId) -> Option<OrientedBox>;

    /// Every model that should be searched for.
    fn model_ids(&self) -> Vec<ModelId>;

    /// Full catalog entry for a model.
    fn entry(&self, model_id: ModelId) -> Option<ModelEntry>;
}

/// Per-model scan parameters overriding the configured defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomSearchParams {
    /// Minimum surface coverage in `[0, 1]`.
    pub min_coverage: f32,
    pub expects_ground_standing: bool,
    /// Allowed vertical tilt in `[0, 180]` degrees.
    pub max_vertical_orientation_degrees: f32,
    /// Allowed scale deviation in `[0, 1]`.
    pub max_scale_change: f32,
}

impl CustomSearchParams {
    pub fn new(
        min_coverage: f32,
        expects_ground_standing: bool,
        max_vertical_orientation_degrees: f32,
        max_scale_change: f32,
    ) -> Self {
        Self {
            min_coverage: min_coverage.clamp(0.0, 1.0),
            expects_ground_standing,
            max_vertical_orientation_degrees: max_vertical_orientation_degrees.clamp(0.0, 180.0),
            max_scale_change: max_scale_change.clamp(0.0, 1.0),
        }
    }
}

impl Default for CustomSearchParams {
    fn default() -> Self {
        Self {
            min_coverage: 0.4,
            expects_ground_standing: false,
            max_vertical_orientation_degrees: 0.0,
            max_scale_change: 0.1,
        }
    }
}

/// One catalog record.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntry {
    pub model_id: ModelId,
    /// Canonical bounding box in model space; `extents.z` is the height.
    pub bounding_box: OrientedBox,
    /// Default minimum coverage threshold in `[0, 1]`.
    pub default_min_coverage: f32,
    pub custom: Option<CustomSearchParams>,
    /// Display name used in logs.
    pub name: String,
}

impl ModelEntry {
    pub fn new(model_id: ModelId, bounding_box: OrientedBox, default_min_coverage: f32) -> Self {
        Self {
            model_id,
            bounding_box,
            default_min_coverage: default_min_coverage.clamp(0.0, 1.0),
            custom: None,
            name: model_id.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_custom_params(mut self, params: CustomSearchParams) -> Self {
        self.custom = Some(params);
        self
    }
}

/// Catalog held in memory, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: BTreeMap<ModelId, ModelEntry>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, entry: ModelEntry) {
        self.entries.insert(entry.model_id, entry);
    }

    pub fn with_entry(mut self, entry: ModelEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ModelCatalog for InMemoryCatalog {
    fn bounding_box(&self, model_id: ModelId) -> Option<OrientedBox> {
        self.entries.get(&model_id).map(|e| e.bounding_box)
    }

    fn model_ids(&self) -> Vec<ModelId> {
        self.entries.keys().copied().collect()
    }

    fn entry(&self, model_id: ModelId) -> Option<ModelEntry> {
        self.entries.get(&model_id).cloned()
    }
}
