//! Rendering backend for trackview.
//!
//! This crate provides:
//! - the [`RenderDevice`] seam and its two backends, [`WgpuDevice`] and the
//!   CPU-side [`SoftwareDevice`]
//! - [`RenderTarget`] off-screen color+depth targets with scoped binding
//! - shader programs and their uniform/attribute layouts (WGSL)
//! - the [`FilterPipeline`] that renders the scene and runs the active filters

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pixel sizes and vertex counts move between u32, usize and f32
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod buffer;
pub mod device;
pub mod engine;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod quad;
pub mod shader;
pub mod software;
pub mod target;

pub use device::{
    AttachmentHandle, Framebuffer, ProgramHandle, RenderDevice, TargetAttachments,
    UniformLocation, UniformValue,
};
pub use engine::WgpuDevice;
pub use error::{RenderError, RenderResult};
pub use pipeline::{FilterPipeline, PipelineSettings};
pub use quad::FullscreenQuad;
pub use shader::{ProgramKind, ProgramSource, ShaderBuilder, ShaderProgram, UniformType};
pub use software::{DeviceCommand, SoftwareDevice};
pub use target::{RenderTarget, TargetBinding};
