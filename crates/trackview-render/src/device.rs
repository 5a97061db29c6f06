//! The graphics-device seam used by the filter pipeline.
//!
//! [`RenderDevice`] exposes the handful of state-machine operations the
//! pipeline needs: render-target allocation, framebuffer binding, program
//! selection, uniform upload and two kinds of draws. Backends own every
//! resource and hand out plain `Copy` ids.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::RenderResult;
use crate::quad::FullscreenQuad;
use crate::shader::{ProgramSource, UniformType};

/// Id of a device-owned color texture or depth buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentHandle(pub(crate) u32);

impl AttachmentHandle {
    /// Raw id, for logging.
    #[must_use]
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Id of a device-owned shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

impl ProgramHandle {
    /// Raw id, for logging.
    #[must_use]
    pub fn id(self) -> u32 {
        self.0
    }
}

/// The attachments backing one off-screen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetAttachments {
    /// Sampleable color texture.
    pub color: AttachmentHandle,
    /// Depth buffer.
    pub depth: AttachmentHandle,
}

/// Destination of subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Framebuffer {
    /// The window (or the headless screen texture).
    #[default]
    Screen,
    /// An off-screen render target.
    Offscreen(TargetAttachments),
}

/// Byte offset and type of a uniform inside a program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    /// Offset from the start of the block.
    pub offset: u32,
    /// Declared type.
    pub ty: UniformType,
}

/// A value written to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Mat4(Mat4),
}

impl UniformValue {
    /// Type of the value.
    #[must_use]
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Writes the value's bytes into a uniform block at `offset`.
    pub(crate) fn write_into(&self, block: &mut [u8], offset: u32) {
        let start = offset as usize;
        match self {
            UniformValue::Float(v) => {
                block[start..start + 4].copy_from_slice(bytemuck::bytes_of(v));
            }
            UniformValue::Vec2(v) => {
                block[start..start + 8].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
            }
            UniformValue::Mat4(m) => {
                block[start..start + 64].copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()));
            }
        }
    }
}

/// Graphics state machine consumed by [`crate::FilterPipeline`].
///
/// Calls are sequenced: a draw lands in whatever framebuffer is bound at the
/// time, with the viewport, depth-write flag and program current at the time.
/// Nothing is visible on screen until [`RenderDevice::present`].
pub trait RenderDevice {
    /// Allocates a sampleable color attachment and a depth buffer.
    ///
    /// Fails if either attachment cannot be allocated at this size.
    fn create_render_target(&mut self, width: u32, height: u32)
        -> RenderResult<TargetAttachments>;

    /// Releases both attachments of a target.
    fn destroy_render_target(&mut self, attachments: TargetAttachments);

    /// Redirects subsequent draws.
    fn bind_framebuffer(&mut self, framebuffer: Framebuffer);

    /// Returns the framebuffer draws currently land in.
    fn bound_framebuffer(&self) -> Framebuffer;

    fn set_viewport(&mut self, width: u32, height: u32);

    fn set_depth_write(&mut self, enabled: bool);

    /// Clears color and depth of the bound framebuffer.
    fn clear(&mut self, color: Vec4);

    /// Compiles and links a program. Compilation failures are fatal.
    fn create_program(&mut self, source: &ProgramSource) -> RenderResult<ProgramHandle>;

    fn use_program(&mut self, program: ProgramHandle);

    /// Sets a uniform of `program`. The value persists across draws.
    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: UniformValue,
    );

    /// Uploads the flattened vertex data used by mesh draws.
    fn upload_mesh(&mut self, positions: &[Vec3], normals: &[Vec3]) -> RenderResult<()>;

    /// Uploads the shared full-screen quad.
    fn upload_quad(&mut self, quad: &FullscreenQuad) -> RenderResult<()>;

    /// Draws `count` mesh vertices starting at `first` with the current program.
    fn draw_mesh_range(&mut self, first: u32, count: u32);

    /// Draws the full-screen quad with the current program sampling `input`.
    fn draw_fullscreen_quad(&mut self, input: AttachmentHandle);

    /// Rebuilds the mip chain of a color attachment from its base level.
    fn generate_mipmaps(&mut self, texture: AttachmentHandle);

    /// Resizes the screen framebuffer.
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Finishes the frame and shows the screen framebuffer.
    fn present(&mut self) -> RenderResult<()>;

    /// Drains errors the device reported since the last call.
    fn take_errors(&mut self) -> Vec<String>;
}
