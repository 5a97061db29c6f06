//! Error types for the viewer application.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop the viewer from starting or running.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// Invalid options or mesh data.
    #[error(transparent)]
    Core(#[from] trackview_core::CoreError),

    /// Graphics device, shader or render target failure.
    #[error(transparent)]
    Render(#[from] trackview_render::RenderError),

    /// The mesh file could not be read or parsed.
    #[error("failed to load mesh '{path}': {source}")]
    MeshLoad {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    /// A rendered image could not be written.
    #[error("failed to save image '{path}': {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The event loop could not be created or failed while running.
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    /// The window could not be created.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}

/// A specialized Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
