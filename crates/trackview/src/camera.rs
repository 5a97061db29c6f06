//! Camera matrices for the orbit viewer.

use glam::{Mat4, Vec3};
use trackview_core::ViewerOptions;

/// Fixed-distance perspective camera looking down -Z at the orbit center.
///
/// Orbiting is done by rotating the view with the trackball matrix, so the
/// camera itself never moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    /// Distance from the eye to the orbit center.
    pub distance: f32,
    /// Uniform scale applied to the model.
    pub model_scale: f32,
}

impl Camera {
    #[must_use]
    pub fn from_options(options: &ViewerOptions) -> Self {
        Self {
            fov: options.fov_degrees.to_radians(),
            aspect_ratio: options.aspect_ratio(),
            near: options.near,
            far: options.far,
            distance: options.camera_distance,
            model_scale: options.model_scale,
        }
    }

    /// Updates the aspect ratio for a new framebuffer size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// View matrix for a trackball rotation: pull back, then rotate.
    #[must_use]
    pub fn view_matrix(&self, rotation: Mat4) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.distance)) * rotation
    }

    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.model_scale))
    }
}
