//! Detection queries and the geometry of the areas they search.
//!
//! A [`SearchQuery`] asks the backend to look for one model inside one
//! [`SearchArea`]. Queries are grouped into a [`QueryBatch`] that is handed
//! to the backend in a single detection call.

mod builder;

use std::fmt;

use nalgebra::Vector3;

use crate::catalog::ModelEntry;
use crate::config::{QueryConfig, SearchAreaShape};
use crate::geometry::{FieldOfView, OrientedBox, Sphere};
use crate::model::ModelId;

pub use builder::{estimated_target, QueryBuilder};

/// Region a query is restricted to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchArea {
    Box(OrientedBox),
    FieldOfView(FieldOfView),
    Sphere(Sphere),
}

impl SearchArea {
    pub fn shape(&self) -> SearchAreaShape {
        match self {
            SearchArea::Box(_) => SearchAreaShape::Box,
            SearchArea::FieldOfView(_) => SearchAreaShape::FieldOfView,
            SearchArea::Sphere(_) => SearchAreaShape::Sphere,
        }
    }

    /// Whether a world-space point falls inside the area.
    pub fn contains(&self, point: &Vector3<f32>) -> bool {
        match self {
            SearchArea::Box(b) => b.contains(point),
            SearchArea::FieldOfView(fov) => fov.contains(point),
            SearchArea::Sphere(s) => s.contains(point),
        }
    }
}

/// Tolerances the backend applies when matching a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParams {
    pub min_coverage: f32,
    pub max_scale_change: f32,
    pub max_vertical_orientation_degrees: f32,
    pub expects_ground_standing: bool,
}

impl ScanParams {
    /// Scan parameters for a catalog entry.
    ///
    /// Custom per-model parameters win. Otherwise the model's default
    /// coverage is scaled by the configured factor and the tolerances come
    /// from config.
    pub fn for_model(entry: &ModelEntry, config: &QueryConfig) -> Self {
        match entry.custom {
            Some(custom) => Self {
                min_coverage: custom.min_coverage,
                max_scale_change: custom.max_scale_change,
                max_vertical_orientation_degrees: custom.max_vertical_orientation_degrees,
                expects_ground_standing: custom.expects_ground_standing,
            },
            None => Self {
                min_coverage: (entry.default_min_coverage * config.coverage_threshold_factor())
                    .clamp(0.0, 1.0),
                max_scale_change: config.max_scale_change(),
                max_vertical_orientation_degrees: config.allowed_vertical_orientation_degrees(),
                expects_ground_standing: false,
            },
        }
    }
}

/// One model to look for, where, and how strictly.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub model_id: ModelId,
    pub area: SearchArea,
    pub scan: ScanParams,
}

/// Why a batch was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchOrigin {
    /// Per-model search planned by the scheduler.
    Autonomous,
    /// Requested through `start_query` or `queue_queries_in_bounds`.
    Requested,
    /// Tightened box around a partially covered instance.
    Refinement,
}

impl fmt::Display for BatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOrigin::Autonomous => write!(f, "autonomous"),
            BatchOrigin::Requested => write!(f, "requested"),
            BatchOrigin::Refinement => write!(f, "refinement"),
        }
    }
}

/// Queries dispatched together in a single detection call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBatch {
    pub queries: Vec<SearchQuery>,
    /// Box the batch was restricted to, for requested and refinement batches.
    pub bounds: Option<OrientedBox>,
    pub origin: BatchOrigin,
}

impl QueryBatch {
    pub fn new(queries: Vec<SearchQuery>, bounds: Option<OrientedBox>, origin: BatchOrigin) -> Self {
        Self {
            queries,
            bounds,
            origin,
        }
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.queries.iter().map(|q| q.model_id).collect()
    }
}
