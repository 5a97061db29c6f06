//! Configuration options for the viewer.

use std::path::{Path, PathBuf};

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Downscale shift applied to the secondary target in blurring modes.
pub const DEFAULT_DOWNSCALE_LEVEL: u32 = 4;

/// Startup configuration for the viewer.
///
/// Every field has a default, so a JSON file only needs to name the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Window title.
    pub title: String,

    /// Window width in physical pixels.
    pub window_width: u32,

    /// Window height in physical pixels.
    pub window_height: u32,

    /// Whether the window may be resized by the user.
    pub resizable: bool,

    /// Path of the OBJ mesh loaded at startup.
    pub mesh_path: PathBuf,

    /// Right shift applied to the window size for the blur target.
    pub downscale_level: u32,

    /// Clear color of the scene pass (RGBA).
    pub clear_color: Vec4,

    /// Vertical field of view in degrees.
    pub fov_degrees: f32,

    /// Near clipping plane.
    pub near: f32,

    /// Far clipping plane.
    pub far: f32,

    /// Distance from the camera to the orbit center.
    pub camera_distance: f32,

    /// Uniform scale applied to the loaded model.
    pub model_scale: f32,

    /// MSAA sample count of the presented image (1 or 4).
    pub sample_count: u32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            title: "trackview".to_string(),
            window_width: 800,
            window_height: 600,
            resizable: false,
            mesh_path: PathBuf::from("models/bunny.obj"),
            downscale_level: DEFAULT_DOWNSCALE_LEVEL,
            clear_color: Vec4::new(0.0, 0.0, 1.0, 1.0),
            fov_degrees: 45.0,
            near: 1.0,
            far: 10.0,
            camera_distance: 5.0,
            model_scale: 3.0,
            sample_count: 4,
        }
    }
}

impl ViewerOptions {
    /// Reads options from a JSON file and validates them.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parses options from JSON text and validates them.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks that the options describe a viewer that can start.
    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(CoreError::InvalidOption {
                name: "window size",
                reason: format!("{}x{} has a zero side", self.window_width, self.window_height),
            });
        }
        if self.downscale_level >= u32::BITS {
            return Err(CoreError::InvalidOption {
                name: "downscale_level",
                reason: format!("shift of {} is wider than the pixel size", self.downscale_level),
            });
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(CoreError::InvalidOption {
                name: "clip planes",
                reason: format!("need 0 < near < far, got near={} far={}", self.near, self.far),
            });
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(CoreError::InvalidOption {
                name: "fov_degrees",
                reason: format!("{} is outside (0, 180)", self.fov_degrees),
            });
        }
        if !matches!(self.sample_count, 1 | 4) {
            return Err(CoreError::InvalidOption {
                name: "sample_count",
                reason: format!("{} is not 1 or 4", self.sample_count),
            });
        }
        Ok(())
    }

    /// Aspect ratio of the window.
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.window_width as f32 / self.window_height.max(1) as f32
    }
}
