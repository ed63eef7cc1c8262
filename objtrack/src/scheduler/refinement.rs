//! Autonomous search-area refinement.
//!
//! The refiner owns a single search box. While nothing is tracked it keeps
//! asking for a search inside that box. Once instances are found it
//! periodically grades each one by coverage:
//!
//! | Coverage | Decision |
//! |----------|----------|
//! | `>= desired` | [`RefinementDecision::Freeze`]: wrap the box around the instance |
//! | `>= desired * 0.6` | [`RefinementDecision::Refine`]: search a box 1.10x the instance's bounds |
//! | below | [`RefinementDecision::Untrusted`]: leave it to global search |

use std::time::{Duration, Instant};

use nalgebra::Vector3;

use crate::catalog::{ModelCatalog, ModelEntry};
use crate::geometry::{yaw_only, OrientedBox, Pose};
use crate::model::TrackedInstance;
use crate::registry::RegistrySnapshot;

/// Growth applied to an instance's bounds when searching again around it.
pub const REFINE_BOX_SCALE: f32 = 1.10;

/// Fraction of the desired coverage below which an instance is untrusted.
pub const COARSE_COVERAGE_RATIO: f32 = 0.6;

/// Distance in front of the camera of the initial search box, metres.
pub const SEARCH_AREA_DISTANCE: f32 = 2.5;

/// Initial search box size relative to the largest model footprint.
pub const SEARCH_AREA_SIZE_FACTOR: f32 = 1.5;

/// What to do about one tracked instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefinementDecision {
    /// Coverage is good enough; no further query.
    Freeze(OrientedBox),
    /// Search again in this tighter box.
    Refine(OrientedBox),
    Untrusted,
}

/// Coverage above which an instance is not searched for again.
pub fn desired_coverage(entry: &ModelEntry) -> f32 {
    entry
        .custom
        .map(|c| c.min_coverage)
        .unwrap_or(entry.default_min_coverage)
}

/// Grade one instance. Unlocated instances are untrusted.
pub fn decide(instance: &TrackedInstance, entry: &ModelEntry) -> RefinementDecision {
    let Some(pose) = instance.pose else {
        return RefinementDecision::Untrusted;
    };
    let desired = desired_coverage(entry);
    let coarse = desired * COARSE_COVERAGE_RATIO;
    let world_box = entry.bounding_box.placed_at(&pose);

    if instance.coverage >= desired {
        RefinementDecision::Freeze(world_box)
    } else if instance.coverage >= coarse {
        RefinementDecision::Refine(world_box.scaled(REFINE_BOX_SCALE))
    } else {
        RefinementDecision::Untrusted
    }
}

/// Level box in front of the camera large enough for any catalog model.
///
/// `None` when the catalog is empty or knows no bounding boxes.
pub fn default_search_area(camera: &Pose, catalog: &dyn ModelCatalog) -> Option<OrientedBox> {
    // (larger footprint side, height, smaller footprint side)
    let largest = catalog
        .model_ids()
        .into_iter()
        .filter_map(|id| catalog.bounding_box(id))
        .map(|b| {
            let e = b.extents;
            Vector3::new(e.x.max(e.y), e.z, e.x.min(e.y))
        })
        .reduce(|a, b| a.sup(&b))?;

    Some(OrientedBox::new(
        camera.position + camera.forward() * SEARCH_AREA_DISTANCE,
        largest * SEARCH_AREA_SIZE_FACTOR,
        yaw_only(&camera.orientation),
    ))
}

/// A box the refiner wants searched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefinerRequest {
    /// Nothing is tracked: search the current box.
    Global(OrientedBox),
    /// Search around a partially covered instance.
    Refine(OrientedBox),
}

/// Keeps and moves the autonomous search box.
#[derive(Debug, Clone)]
pub struct SearchAreaRefiner {
    interval: Duration,
    search_box: Option<OrientedBox>,
    last_request: Option<Instant>,
}

impl SearchAreaRefiner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            search_box: None,
            last_request: None,
        }
    }

    /// Current search box, if one has been placed.
    pub fn search_box(&self) -> Option<OrientedBox> {
        self.search_box
    }

    /// Re-centre the search box in front of the camera.
    pub fn reset(&mut self, camera: &Pose, catalog: &dyn ModelCatalog) {
        self.search_box = default_search_area(camera, catalog);
    }

    /// Decide which boxes to search this tick.
    ///
    /// `busy` is true while a detection call is in flight or batches are
    /// queued; nothing is requested then.
    pub fn plan(
        &mut self,
        now: Instant,
        busy: bool,
        snapshot: &RegistrySnapshot,
        catalog: &dyn ModelCatalog,
        camera: &Pose,
    ) -> Vec<RefinerRequest> {
        if busy {
            return Vec::new();
        }

        if snapshot.is_empty() {
            if self.search_box.is_none() {
                self.reset(camera, catalog);
            }
            self.last_request = Some(now);
            return self.search_box.map(RefinerRequest::Global).into_iter().collect();
        }

        let due = self
            .last_request
            .map_or(true, |last| now.duration_since(last) >= self.interval);
        if !due {
            return Vec::new();
        }
        self.last_request = Some(now);

        let mut requests = Vec::new();
        for instance in snapshot.iter() {
            let Some(entry) = catalog.entry(instance.model_id) else {
                continue;
            };
            match decide(instance, &entry) {
                RefinementDecision::Freeze(wrapped) => {
                    self.search_box = Some(wrapped);
                }
                RefinementDecision::Refine(tighter) => {
                    tracing::debug!(
                        instance = %instance.instance_id,
                        coverage = instance.coverage,
                        "Refining search area around instance"
                    );
                    self.search_box = Some(tighter);
                    requests.push(RefinerRequest::Refine(tighter));
                }
                RefinementDecision::Untrusted => {}
            }
        }
        requests
    }
}
