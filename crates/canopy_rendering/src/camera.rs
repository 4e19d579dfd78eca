//! Camera description consumed by the culling math.
//!
//! Camera-local space is left-handed: +X right, +Y up, +Z forward. The
//! projection keeps clip depth in `[-w, w]`, so the Gribb-Hartmann rows
//! `r3 ± r2` give the near and far planes directly.

#![allow(clippy::cast_precision_loss)]

use glam::{Mat4, Quat, Vec3, Vec4};

/// A perspective camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quat,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Viewport width in pixels.
    pub pixel_width: u32,
    /// Viewport height in pixels.
    pub pixel_height: u32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            fov_y_degrees: 60.0,
            pixel_width: 1920,
            pixel_height: 1080,
            near: 0.3,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Camera at `position` looking along `rotation * +Z`.
    #[must_use]
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    /// Sets the vertical field of view.
    #[must_use]
    pub fn with_fov(mut self, fov_y_degrees: f32) -> Self {
        self.fov_y_degrees = fov_y_degrees;
        self
    }

    /// Sets the viewport size.
    #[must_use]
    pub fn with_viewport(mut self, pixel_width: u32, pixel_height: u32) -> Self {
        self.pixel_width = pixel_width;
        self.pixel_height = pixel_height;
        self
    }

    /// Sets the clip distances.
    #[must_use]
    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Width over height.
    #[inline]
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.pixel_width.max(1) as f32 / self.pixel_height.max(1) as f32
    }

    /// World-space viewing direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Camera-local to world transform.
    #[must_use]
    pub fn local_to_world(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// World to camera-local transform.
    #[must_use]
    pub fn world_to_camera(&self) -> Mat4 {
        self.local_to_world().inverse()
    }

    /// Perspective projection, row-major:
    ///
    /// ```text
    ///   | f/a  0   0            0          |
    ///   | 0    f   0            0          |
    ///   | 0    0   (F+N)/(F-N)  -2FN/(F-N) |
    ///   | 0    0   1            0          |
    /// ```
    ///
    /// with `f = 1 / tan(fov / 2)`.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        let f = 1.0 / (self.fov_y_degrees.to_radians() * 0.5).tan();
        let (n, far) = (self.near, self.far);
        let depth = far - n;

        Mat4::from_cols(
            Vec4::new(f / self.aspect(), 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, (far + n) / depth, 1.0),
            Vec4::new(0.0, 0.0, -2.0 * far * n / depth, 0.0),
        )
    }

    /// `projection * world_to_camera`.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.world_to_camera()
    }
}
