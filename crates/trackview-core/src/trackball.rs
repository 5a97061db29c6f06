//! Virtual trackball (arcball) camera rotation.
//!
//! Pointer positions in window space are projected onto a unit sphere that
//! fills the window. Dragging from one sphere point to another rotates the
//! orientation about the axis perpendicular to both points by the angle between
//! them. Positions outside the sphere's silhouette fall back to the equator,
//! which turns edge drags into pure rolls about the view axis.

use glam::{Mat4, Quat, UVec2, Vec2, Vec3};

/// Squared axis length below which a drag is treated as no motion.
const MIN_AXIS_LENGTH_SQUARED: f32 = 1e-12;

/// Arcball state driven by pointer drags.
#[derive(Debug, Clone)]
pub struct Trackball {
    /// Orientation committed by the last finished drag.
    committed: Quat,
    /// Orientation of the drag in progress (equals `committed` when idle).
    in_progress: Quat,
    /// Whether a drag is in progress.
    dragging: bool,
    /// Sphere point under the pointer when the drag began.
    drag_start: Vec3,
    /// Window size used to normalize pointer coordinates.
    viewport: Option<UVec2>,
}

impl Trackball {
    /// Creates a trackball with identity orientation and no viewport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            committed: Quat::IDENTITY,
            in_progress: Quat::IDENTITY,
            dragging: false,
            drag_start: Vec3::Z,
            viewport: None,
        }
    }

    /// Creates a trackball for a window of the given size.
    #[must_use]
    pub fn with_viewport(width: i32, height: i32) -> Self {
        let mut trackball = Self::new();
        trackball.set_viewport_size(width, height);
        trackball
    }

    /// Stores the window size used to normalize pointer coordinates.
    ///
    /// Non-positive sizes are ignored and the previous size is kept.
    pub fn set_viewport_size(&mut self, width: i32, height: i32) {
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => self.viewport = Some(UVec2::new(w, h)),
            _ => log::warn!("ignoring trackball viewport size {width}x{height}"),
        }
    }

    /// Returns the stored viewport size.
    #[must_use]
    pub fn viewport_size(&self) -> Option<UVec2> {
        self.viewport
    }

    /// Returns whether a drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Returns the orientation committed by the last finished drag.
    #[must_use]
    pub fn committed_orientation(&self) -> Quat {
        self.committed
    }

    /// Starts a drag at the given window position.
    pub fn begin_drag(&mut self, x: f32, y: f32) {
        self.dragging = true;
        self.drag_start = self.project_to_sphere(x, y);
        self.in_progress = self.committed;
    }

    /// Ends the drag and commits the orientation reached so far.
    pub fn end_drag(&mut self, x: f32, y: f32) {
        // The release point does not move the orientation; the last update
        // already did.
        let _release_point = self.project_to_sphere(x, y);
        self.dragging = false;
        self.committed = self.in_progress.normalize();
        self.in_progress = self.committed;
    }

    /// Updates the drag with a new pointer position and returns the view
    /// rotation.
    ///
    /// While idle this returns the committed rotation unchanged, so repeated
    /// calls are idempotent.
    pub fn update_drag(&mut self, x: f32, y: f32) -> Mat4 {
        if !self.dragging {
            return Self::view_rotation(self.committed);
        }

        let current = self.project_to_sphere(x, y);
        let cos_angle = self.drag_start.dot(current).clamp(-1.0, 1.0);
        let angle = cos_angle.acos();
        let axis = current.cross(self.drag_start);

        self.in_progress = if axis.length_squared() <= MIN_AXIS_LENGTH_SQUARED || angle == 0.0 {
            self.committed
        } else {
            self.committed * Quat::from_axis_angle(axis.normalize(), angle)
        };

        Self::view_rotation(self.in_progress)
    }

    /// Returns the current view rotation without changing any state.
    #[must_use]
    pub fn rotation_matrix(&self) -> Mat4 {
        if self.dragging {
            Self::view_rotation(self.in_progress)
        } else {
            Self::view_rotation(self.committed)
        }
    }

    /// Drops any drag and returns to the identity orientation.
    pub fn reset(&mut self) {
        self.committed = Quat::IDENTITY;
        self.in_progress = Quat::IDENTITY;
        self.dragging = false;
    }

    /// Maps window coordinates into `[-0.5, 0.5]²` with y pointing up.
    #[must_use]
    pub fn normalized_coordinates(&self, x: f32, y: f32) -> Vec2 {
        match self.viewport {
            Some(size) => Vec2::new(x / size.x as f32 - 0.5, 0.5 - y / size.y as f32),
            None => Vec2::ZERO,
        }
    }

    /// Projects a window position onto the unit sphere.
    ///
    /// Inside the sphere's silhouette (radius 0.5 in normalized coordinates)
    /// the result lies on the front hemisphere; outside it lies on the
    /// equator (`z = 0`).
    #[must_use]
    pub fn project_to_sphere(&self, x: f32, y: f32) -> Vec3 {
        let p = self.normalized_coordinates(x, y);
        let r = p.length();

        if r < 0.5 {
            Vec3::new(2.0 * p.x, 2.0 * p.y, (1.0 - 4.0 * r * r).sqrt()).normalize()
        } else {
            Vec3::new(p.x / r, p.y / r, 0.0)
        }
    }

    /// View matrices apply the inverse camera rotation, hence the transpose.
    fn view_rotation(orientation: Quat) -> Mat4 {
        Mat4::from_quat(orientation).transpose()
    }
}

impl Default for Trackball {
    fn default() -> Self {
        Self::new()
    }
}
