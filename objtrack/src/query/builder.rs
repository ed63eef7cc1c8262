//! Query construction.
//!
//! | Shape | Centre | Size |
//! |-------|--------|------|
//! | Box | estimated target | `xy_diag * s` horizontally, `height * s` vertically |
//! | FieldOfView | camera | configured far distance, FOV and aspect |
//! | Sphere | estimated target | `diagonal / 2 * s` |
//!
//! The estimated target is the point half the far distance ahead of the
//! camera. Boxes keep only the camera's yaw so they stay level.

use nalgebra::Vector3;

use super::{ScanParams, SearchArea, SearchQuery};
use crate::config::{SearchAreaShape, SearchConfig};
use crate::geometry::{yaw_only, FieldOfView, OrientedBox, Pose, Sphere};
use crate::model::ModelId;

/// Point half the far distance in front of the camera.
pub fn estimated_target(camera: &Pose, far_distance: f32) -> Vector3<f32> {
    camera.position + camera.forward() * (far_distance * 0.5)
}

/// Builds per-model queries from the search configuration.
///
/// Pure: the same inputs always produce the same query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    far_distance: f32,
    horizontal_fov_degrees: f32,
    aspect_ratio: f32,
    scale_factor: f32,
}

impl QueryBuilder {
    pub fn new(
        far_distance: f32,
        horizontal_fov_degrees: f32,
        aspect_ratio: f32,
        scale_factor: f32,
    ) -> Self {
        Self {
            far_distance,
            horizontal_fov_degrees,
            aspect_ratio,
            scale_factor,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            config.frustum_far_distance,
            config.frustum_horizontal_fov_degrees,
            config.frustum_aspect_ratio,
            config.area_scale_factor,
        )
    }

    /// The configured viewing frustum anchored at `camera`.
    pub fn field_of_view(&self, camera: &Pose) -> FieldOfView {
        FieldOfView::new(
            *camera,
            self.far_distance,
            self.horizontal_fov_degrees,
            self.aspect_ratio,
        )
    }

    /// Query for `model_id` sized to its bounding box.
    pub fn build(
        &self,
        model_id: ModelId,
        model_bbox: &OrientedBox,
        scan: ScanParams,
        shape: SearchAreaShape,
        camera: &Pose,
    ) -> SearchQuery {
        let area = match shape {
            SearchAreaShape::Box => {
                let s = self.scale_factor;
                let horizontal = model_bbox.xy_diagonal() * s;
                let vertical = model_bbox.height() * s;
                SearchArea::Box(OrientedBox::new(
                    estimated_target(camera, self.far_distance),
                    Vector3::new(horizontal, vertical, horizontal),
                    yaw_only(&camera.orientation),
                ))
            }
            SearchAreaShape::FieldOfView => SearchArea::FieldOfView(self.field_of_view(camera)),
            SearchAreaShape::Sphere => SearchArea::Sphere(Sphere::new(
                estimated_target(camera, self.far_distance),
                model_bbox.diagonal() * 0.5 * self.scale_factor,
            )),
        };

        SearchQuery {
            model_id,
            area,
            scan,
        }
    }

    /// Query for `model_id` restricted to an explicit box.
    pub fn build_in_bounds(
        &self,
        model_id: ModelId,
        scan: ScanParams,
        bounds: &OrientedBox,
    ) -> SearchQuery {
        SearchQuery {
            model_id,
            area: SearchArea::Box(*bounds),
            scan,
        }
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}
