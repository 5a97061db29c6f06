//! Rendering error types.

use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// Surface configuration failed.
    #[error("surface configuration failed")]
    SurfaceConfigurationFailed,

    /// Shader compilation or linking failed.
    #[error("shader compilation failed for '{program}': {message}")]
    ShaderCompilationFailed { program: String, message: String },

    /// A program does not declare a uniform the pipeline needs.
    #[error("program '{program}' has no uniform named '{name}'")]
    UniformNotFound { program: String, name: String },

    /// Buffer creation failed.
    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    /// Attachment allocation failed or the target is incomplete.
    #[error("render target {width}x{height} is incomplete: {reason}")]
    IncompleteRenderTarget {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A destroyed render target was bound.
    #[error("render target has been destroyed")]
    InvalidRenderTarget,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// The device cannot read back the presented image.
    #[error("screen readback is only available on headless devices")]
    ReadbackUnavailable,

    /// Mapping a readback buffer failed.
    #[error("failed to map readback buffer")]
    BufferMapFailed,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
