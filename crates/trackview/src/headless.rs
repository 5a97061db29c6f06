//! Rendering without a window.
//!
//! Runs the same pipeline as the interactive viewer against an offscreen
//! screen texture and reads the result back. Useful for batch snapshots and
//! integration tests.

use glam::Mat4;
use pollster::FutureExt;
use trackview_core::{FilterMode, Mesh, ViewerOptions};
use trackview_render::{FilterPipeline, FullscreenQuad, PipelineSettings, WgpuDevice};

use crate::camera::Camera;
use crate::error::{Result, ViewerError};

/// Renders one frame of `mesh` and returns the screen contents.
///
/// The image has the configured window size. `rotation` plays the role of
/// the trackball matrix.
pub fn render_to_image(
    options: &ViewerOptions,
    mesh: &Mesh,
    mode: FilterMode,
    rotation: Mat4,
) -> Result<image::RgbaImage> {
    let (width, height) = (options.window_width, options.window_height);
    let device = WgpuDevice::new_headless(width, height, options.sample_count).block_on()?;

    let camera = Camera::from_options(options);
    let settings = PipelineSettings {
        initial_mode: mode,
        ..PipelineSettings::from_options(options, camera.projection_matrix())
    };
    let mut pipeline =
        FilterPipeline::new(device, width, height, &settings, mesh, &FullscreenQuad::UNIT)?;

    pipeline.render_frame(camera.view_matrix(rotation), camera.model_matrix(), mesh)?;
    pipeline.present()?;
    let image = pipeline.device().read_screen()?;
    log::debug!("rendered {width}x{height} headless frame in mode {mode}");
    Ok(image)
}

/// Renders one frame and writes it to `path` (format from the extension).
pub fn render_to_file(
    path: impl AsRef<std::path::Path>,
    options: &ViewerOptions,
    mesh: &Mesh,
    mode: FilterMode,
    rotation: Mat4,
) -> Result<()> {
    let path = path.as_ref();
    let image = render_to_image(options, mesh, mode, rotation)?;
    image.save(path).map_err(|source| ViewerError::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("saved {}", path.display());
    Ok(())
}
