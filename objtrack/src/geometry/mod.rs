//! Spatial primitives shared by the query builder, scheduler and mode manager.
//!
//! All coordinates are expressed in a single caller-chosen world frame with
//! `+Y` up and `+Z` as the camera's forward axis. Rotations are unit
//! quaternions; positions and extents are `f32` metres.
//!
//! # Types
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`Pose`] | Position + orientation of a camera or located instance |
//! | [`OrientedBox`] | Centre, full-size extents and orientation |
//! | [`FieldOfView`] | Viewing frustum anchored at a pose |
//! | [`Sphere`] | Centre and radius |

use nalgebra::{UnitQuaternion, Vector3};

/// Camera-local forward axis.
pub fn forward_axis() -> Vector3<f32> {
    Vector3::z()
}

/// Position and orientation in the world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World-space position in metres.
    pub position: Vector3<f32>,
    /// World-space orientation.
    pub orientation: UnitQuaternion<f32>,
}

impl Pose {
    /// Create a pose from a position and orientation.
    pub fn new(position: Vector3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose at the origin with identity orientation.
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Pose at `position` with identity orientation.
    pub fn at(position: Vector3<f32>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// World-space forward direction (rotated `+Z`).
    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * forward_axis()
    }

    /// Map a point from this pose's local frame into the world frame.
    pub fn transform_point(&self, local: &Vector3<f32>) -> Vector3<f32> {
        self.position + self.orientation * local
    }

    /// Map a world-space point into this pose's local frame.
    pub fn inverse_transform_point(&self, world: &Vector3<f32>) -> Vector3<f32> {
        self.orientation.inverse() * (world - self.position)
    }

    /// Euclidean distance between this pose's position and a world point.
    pub fn distance_to(&self, point: &Vector3<f32>) -> f32 {
        (point - self.position).norm()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Strip roll and pitch from an orientation, keeping rotation about `+Y`.
///
/// The yaw is read from the forward vector projected onto the horizontal
/// plane, so a box built with the result always stays level.
pub fn yaw_only(orientation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let forward = orientation * forward_axis();
    let yaw = forward.x.atan2(forward.z);
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
}

/// Box with full-size extents, centred at `center` and rotated by `orientation`.
///
/// For model bounding boxes the `z` extent is the model's height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Vector3<f32>,
    pub extents: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl OrientedBox {
    pub fn new(
        center: Vector3<f32>,
        extents: Vector3<f32>,
        orientation: UnitQuaternion<f32>,
    ) -> Self {
        Self {
            center,
            extents,
            orientation,
        }
    }

    /// Axis-aligned box (identity orientation).
    pub fn axis_aligned(center: Vector3<f32>, extents: Vector3<f32>) -> Self {
        Self::new(center, extents, UnitQuaternion::identity())
    }

    /// Length of the full diagonal.
    pub fn diagonal(&self) -> f32 {
        self.extents.norm()
    }

    /// Diagonal of the footprint spanned by the `x` and `y` extents.
    pub fn xy_diagonal(&self) -> f32 {
        (self.extents.x * self.extents.x + self.extents.y * self.extents.y).sqrt()
    }

    /// Height of the box (`z` extent).
    pub fn height(&self) -> f32 {
        self.extents.z
    }

    /// Same box with every extent multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            extents: self.extents * factor,
            ..*self
        }
    }

    /// Express a box given in an instance's local frame in world space.
    pub fn placed_at(&self, pose: &Pose) -> Self {
        Self {
            center: pose.transform_point(&self.center),
            extents: self.extents,
            orientation: pose.orientation * self.orientation,
        }
    }

    /// Whether a world-space point lies inside the box (boundary inclusive).
    pub fn contains(&self, point: &Vector3<f32>) -> bool {
        let local = self.orientation.inverse() * (point - self.center);
        let half = self.extents * 0.5;
        local.x.abs() <= half.x && local.y.abs() <= half.y && local.z.abs() <= half.z
    }
}

/// Viewing frustum anchored at a camera pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    pub pose: Pose,
    pub far_distance: f32,
    pub horizontal_fov_degrees: f32,
    /// Horizontal / vertical.
    pub aspect_ratio: f32,
}

impl FieldOfView {
    pub fn new(
        pose: Pose,
        far_distance: f32,
        horizontal_fov_degrees: f32,
        aspect_ratio: f32,
    ) -> Self {
        Self {
            pose,
            far_distance,
            horizontal_fov_degrees,
            aspect_ratio,
        }
    }

    fn half_tangents(&self) -> (f32, f32) {
        let tan_h = (self.horizontal_fov_degrees.to_radians() * 0.5).tan();
        let aspect = if self.aspect_ratio > f32::EPSILON {
            self.aspect_ratio
        } else {
            1.0
        };
        (tan_h, tan_h / aspect)
    }

    /// Angular visibility test, ignoring the far plane.
    pub fn within_angles(&self, point: &Vector3<f32>) -> bool {
        let local = self.pose.inverse_transform_point(point);
        if local.z <= 0.0 {
            return false;
        }
        let (tan_h, tan_v) = self.half_tangents();
        local.x.abs() <= local.z * tan_h && local.y.abs() <= local.z * tan_v
    }

    /// Full frustum test including the far plane.
    pub fn contains(&self, point: &Vector3<f32>) -> bool {
        let local = self.pose.inverse_transform_point(point);
        local.z <= self.far_distance && self.within_angles(point)
    }
}

/// Sphere in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vector3<f32>,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vector3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, point: &Vector3<f32>) -> bool {
        (point - self.center).norm() <= self.radius
    }
}
