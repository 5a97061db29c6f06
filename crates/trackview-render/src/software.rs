//! CPU reference backend.
//!
//! [`SoftwareDevice`] executes every call immediately on `f32` RGBA images
//! and keeps a log of [`DeviceCommand`]s, which makes it both a reference
//! renderer for the filter programs and an instrumented recorder for the
//! pipeline's call sequence. Mesh draws do not rasterize geometry: they
//! stamp an optional scene image into the viewport, so post-processing can
//! be checked against known input.

use std::collections::HashMap;

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use image::{Rgba, Rgba32FImage};

use crate::device::{
    AttachmentHandle, Framebuffer, ProgramHandle, RenderDevice, TargetAttachments,
    UniformLocation, UniformValue,
};
use crate::error::{RenderError, RenderResult};
use crate::filters;
use crate::quad::FullscreenQuad;
use crate::shader::{ProgramKind, ProgramSource, FRAGMENT_ENTRY, VERTEX_ENTRY};

/// Largest attachment edge accepted by default.
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateTarget {
        attachments: TargetAttachments,
        width: u32,
        height: u32,
    },
    DestroyTarget {
        attachments: TargetAttachments,
    },
    Bind(Framebuffer),
    Viewport {
        width: u32,
        height: u32,
    },
    DepthWrite(bool),
    Clear(Vec4),
    CreateProgram {
        program: ProgramHandle,
        kind: ProgramKind,
    },
    UseProgram(ProgramKind),
    SetUniform {
        program: ProgramKind,
        name: &'static str,
        value: UniformValue,
    },
    /// A mesh draw, with the modelview uniforms current at the time.
    DrawMesh {
        target: Framebuffer,
        first: u32,
        count: u32,
        modelview: Mat4,
        modelview_inverse: Mat4,
    },
    DrawQuad {
        target: Framebuffer,
        program: ProgramKind,
        input: AttachmentHandle,
    },
    GenerateMipmaps(AttachmentHandle),
    ResizeSurface {
        width: u32,
        height: u32,
    },
    Present,
}

#[derive(Debug)]
enum Attachment {
    /// Mip chain, base level first.
    Color(Vec<Rgba32FImage>),
    Depth,
}

#[derive(Debug)]
struct SoftProgram {
    source: ProgramSource,
    values: HashMap<&'static str, UniformValue>,
}

impl SoftProgram {
    fn mat4(&self, name: &str) -> Mat4 {
        match self.values.get(name) {
            Some(UniformValue::Mat4(m)) => *m,
            _ => Mat4::IDENTITY,
        }
    }

    fn float(&self, name: &str) -> f32 {
        match self.values.get(name) {
            Some(UniformValue::Float(v)) => *v,
            _ => 0.0,
        }
    }
}

/// Immediate-mode CPU device with a command log.
#[derive(Debug)]
pub struct SoftwareDevice {
    screen: Rgba32FImage,
    attachments: HashMap<AttachmentHandle, Attachment>,
    next_attachment: u32,
    programs: Vec<SoftProgram>,
    current_program: Option<ProgramHandle>,
    bound: Framebuffer,
    viewport: UVec2,
    depth_write: bool,
    mesh_vertices: usize,
    quad: Option<FullscreenQuad>,
    scene: Option<Rgba32FImage>,
    max_texture_size: u32,
    commands: Vec<DeviceCommand>,
    errors: Vec<String>,
    frames_presented: u64,
}

impl SoftwareDevice {
    /// Creates a device whose screen is `width`×`height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: Rgba32FImage::new(width, height),
            attachments: HashMap::new(),
            next_attachment: 1,
            programs: Vec::new(),
            current_program: None,
            bound: Framebuffer::Screen,
            viewport: UVec2::new(width, height),
            depth_write: true,
            mesh_vertices: 0,
            quad: None,
            scene: None,
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            commands: Vec::new(),
            errors: Vec::new(),
            frames_presented: 0,
        }
    }

    /// Limits attachment sizes, like a GPU's maximum texture dimension.
    #[must_use]
    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    /// Image that mesh draws stamp into the bound viewport.
    pub fn set_scene_image(&mut self, image: Option<Rgba32FImage>) {
        self.scene = image;
    }

    /// Queues an error as if the driver had reported it.
    pub fn inject_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Clears the command log.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// The screen framebuffer.
    #[must_use]
    pub fn screen(&self) -> &Rgba32FImage {
        &self.screen
    }

    /// Base level of a color attachment.
    #[must_use]
    pub fn texture(&self, handle: AttachmentHandle) -> Option<&Rgba32FImage> {
        match self.attachments.get(&handle) {
            Some(Attachment::Color(levels)) => levels.first(),
            _ => None,
        }
    }

    /// Number of mip levels currently held by a color attachment.
    #[must_use]
    pub fn mip_level_count(&self, handle: AttachmentHandle) -> usize {
        match self.attachments.get(&handle) {
            Some(Attachment::Color(levels)) => levels.len(),
            _ => 0,
        }
    }

    /// Whether an attachment is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, handle: AttachmentHandle) -> bool {
        self.attachments.contains_key(&handle)
    }

    #[must_use]
    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    #[must_use]
    pub fn viewport(&self) -> UVec2 {
        self.viewport
    }

    #[must_use]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    fn allocate(&mut self, attachment: Attachment) -> AttachmentHandle {
        let handle = AttachmentHandle(self.next_attachment);
        self.next_attachment += 1;
        self.attachments.insert(handle, attachment);
        handle
    }

    fn current(&self) -> Option<&SoftProgram> {
        self.current_program
            .and_then(|handle| self.programs.get(handle.0 as usize))
    }

    fn bound_image_mut(&mut self) -> Option<&mut Rgba32FImage> {
        match self.bound {
            Framebuffer::Screen => Some(&mut self.screen),
            Framebuffer::Offscreen(target) => match self.attachments.get_mut(&target.color) {
                Some(Attachment::Color(levels)) => levels.first_mut(),
                _ => None,
            },
        }
    }

    /// Writes `shade(uv)` into every pixel of the viewport.
    fn fill_viewport<F>(&mut self, shade: F)
    where
        F: Fn(Vec2) -> Vec4,
    {
        let viewport = self.viewport;
        let Some(image) = self.bound_image_mut() else {
            self.errors
                .push("draw into a framebuffer with no color attachment".into());
            return;
        };
        if viewport.x == 0 || viewport.y == 0 {
            return;
        }
        let width = viewport.x.min(image.width());
        let height = viewport.y.min(image.height());
        for y in 0..height {
            for x in 0..width {
                let uv = Vec2::new(
                    (x as f32 + 0.5) / viewport.x as f32,
                    (y as f32 + 0.5) / viewport.y as f32,
                );
                image.put_pixel(x, y, Rgba(shade(uv).to_array()));
            }
        }
    }
}

/// Nearest-texel lookup with clamp-to-edge addressing.
fn sample_nearest(image: &Rgba32FImage, uv: Vec2) -> Vec4 {
    let (width, height) = image.dimensions();
    let x = ((uv.x * width as f32).floor() as i64).clamp(0, i64::from(width) - 1);
    let y = ((uv.y * height as f32).floor() as i64).clamp(0, i64::from(height) - 1);
    Vec4::from_array(image.get_pixel(x as u32, y as u32).0)
}

/// Picks the mip level a GPU would sample when minifying `source` into `viewport`.
fn select_level(levels: &[Rgba32FImage], viewport: UVec2) -> usize {
    let Some(base) = levels.first() else {
        return 0;
    };
    let scale = (base.width() as f32 / viewport.x.max(1) as f32)
        .max(base.height() as f32 / viewport.y.max(1) as f32);
    if scale <= 1.0 {
        return 0;
    }
    (scale.log2().floor() as usize).min(levels.len() - 1)
}

/// Halves an image with a 2x2 box filter.
fn downsample(source: &Rgba32FImage) -> Rgba32FImage {
    let (width, height) = source.dimensions();
    let (dst_width, dst_height) = ((width / 2).max(1), (height / 2).max(1));
    Rgba32FImage::from_fn(dst_width, dst_height, |x, y| {
        let mut sum = Vec4::ZERO;
        for (sx, sy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let px = (2 * x + sx).min(width - 1);
            let py = (2 * y + sy).min(height - 1);
            sum += Vec4::from_array(source.get_pixel(px, py).0);
        }
        Rgba((sum * 0.25).to_array())
    })
}

impl RenderDevice for SoftwareDevice {
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> RenderResult<TargetAttachments> {
        let max = self.max_texture_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::IncompleteRenderTarget {
                width,
                height,
                reason: format!(
                    "attachment size must be within 1..={}",
                    self.max_texture_size
                ),
            });
        }
        let color = self.allocate(Attachment::Color(vec![Rgba32FImage::new(width, height)]));
        let depth = self.allocate(Attachment::Depth);
        let attachments = TargetAttachments { color, depth };
        self.commands.push(DeviceCommand::CreateTarget {
            attachments,
            width,
            height,
        });
        Ok(attachments)
    }

    fn destroy_render_target(&mut self, attachments: TargetAttachments) {
        self.attachments.remove(&attachments.color);
        self.attachments.remove(&attachments.depth);
        self.commands
            .push(DeviceCommand::DestroyTarget { attachments });
    }

    fn bind_framebuffer(&mut self, framebuffer: Framebuffer) {
        if let Framebuffer::Offscreen(target) = framebuffer {
            if !self.attachments.contains_key(&target.color) {
                self.errors.push(format!(
                    "bound destroyed render target (color {})",
                    target.color.id()
                ));
            }
        }
        self.bound = framebuffer;
        self.commands.push(DeviceCommand::Bind(framebuffer));
    }

    fn bound_framebuffer(&self) -> Framebuffer {
        self.bound
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = UVec2::new(width, height);
        self.commands
            .push(DeviceCommand::Viewport { width, height });
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
        self.commands.push(DeviceCommand::DepthWrite(enabled));
    }

    fn clear(&mut self, color: Vec4) {
        if let Some(image) = self.bound_image_mut() {
            for pixel in image.pixels_mut() {
                *pixel = Rgba(color.to_array());
            }
        }
        self.commands.push(DeviceCommand::Clear(color));
    }

    fn create_program(&mut self, source: &ProgramSource) -> RenderResult<ProgramHandle> {
        if !source.vertex.contains(VERTEX_ENTRY) || !source.fragment.contains(FRAGMENT_ENTRY) {
            return Err(RenderError::ShaderCompilationFailed {
                program: source.kind.label().to_string(),
                message: format!("missing entry point {VERTEX_ENTRY} or {FRAGMENT_ENTRY}"),
            });
        }
        let program = ProgramHandle(self.programs.len() as u32);
        self.programs.push(SoftProgram {
            source: *source,
            values: HashMap::new(),
        });
        self.commands.push(DeviceCommand::CreateProgram {
            program,
            kind: source.kind,
        });
        Ok(program)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        match self.programs.get(program.0 as usize) {
            Some(p) => {
                self.current_program = Some(program);
                self.commands
                    .push(DeviceCommand::UseProgram(p.source.kind));
            }
            None => self
                .errors
                .push(format!("use of unknown program {}", program.id())),
        }
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: UniformValue,
    ) {
        let Some(p) = self.programs.get_mut(program.0 as usize) else {
            self.errors
                .push(format!("uniform set on unknown program {}", program.id()));
            return;
        };
        let Some(decl) = p
            .source
            .uniforms
            .iter()
            .find(|u| u.offset == location.offset && u.ty == value.ty())
        else {
            self.errors.push(format!(
                "{} has no {:?} uniform at offset {}",
                p.source.kind,
                value.ty(),
                location.offset
            ));
            return;
        };
        p.values.insert(decl.name, value);
        self.commands.push(DeviceCommand::SetUniform {
            program: p.source.kind,
            name: decl.name,
            value,
        });
    }

    fn upload_mesh(&mut self, positions: &[Vec3], normals: &[Vec3]) -> RenderResult<()> {
        if positions.len() != normals.len() {
            return Err(RenderError::BufferCreationFailed(format!(
                "{} positions but {} normals",
                positions.len(),
                normals.len()
            )));
        }
        self.mesh_vertices = positions.len();
        Ok(())
    }

    fn upload_quad(&mut self, quad: &FullscreenQuad) -> RenderResult<()> {
        self.quad = Some(*quad);
        Ok(())
    }

    fn draw_mesh_range(&mut self, first: u32, count: u32) {
        let Some(program) = self.current() else {
            self.errors.push("mesh draw without a program".into());
            return;
        };
        if !program.source.kind.draws_mesh() {
            let kind = program.source.kind;
            self.errors
                .push(format!("mesh draw with the {kind} program"));
            return;
        }
        let modelview = program.mat4("modelview_matrix");
        let modelview_inverse = program.mat4("modelview_inverse_matrix");
        if u64::from(first) + u64::from(count) > self.mesh_vertices as u64 {
            self.errors.push(format!(
                "mesh draw {first}..{} past {} uploaded vertices",
                u64::from(first) + u64::from(count),
                self.mesh_vertices
            ));
            return;
        }
        self.commands.push(DeviceCommand::DrawMesh {
            target: self.bound,
            first,
            count,
            modelview,
            modelview_inverse,
        });
        if let Some(scene) = self.scene.take() {
            self.fill_viewport(|uv| sample_nearest(&scene, uv));
            self.scene = Some(scene);
        }
    }

    fn draw_fullscreen_quad(&mut self, input: AttachmentHandle) {
        let Some(program) = self.current() else {
            self.errors.push("quad draw without a program".into());
            return;
        };
        let kind = program.source.kind;
        let (dx, dy) = (program.float("dx"), program.float("dy"));
        if self.quad.is_none() {
            self.errors
                .push("quad draw before the quad was uploaded".into());
            return;
        }
        // Snapshot the input so sampling the bound target reads the old image.
        let levels = match self.attachments.get(&input) {
            Some(Attachment::Color(levels)) => levels.clone(),
            _ => {
                self.errors
                    .push(format!("quad draw samples unknown texture {}", input.id()));
                return;
            }
        };
        self.commands.push(DeviceCommand::DrawQuad {
            target: self.bound,
            program: kind,
            input,
        });

        let level = &levels[select_level(&levels, self.viewport)];
        let sample = |uv: Vec2| sample_nearest(level, uv);
        self.fill_viewport(|uv| {
            filters::shade_fragment(kind, sample, uv, dx, dy).unwrap_or(Vec4::ZERO)
        });
    }

    fn generate_mipmaps(&mut self, texture: AttachmentHandle) {
        match self.attachments.get_mut(&texture) {
            Some(Attachment::Color(levels)) => {
                levels.truncate(1);
                while let Some(last) = levels.last() {
                    if last.width() == 1 && last.height() == 1 {
                        break;
                    }
                    let next = downsample(last);
                    levels.push(next);
                }
                self.commands.push(DeviceCommand::GenerateMipmaps(texture));
            }
            _ => self
                .errors
                .push(format!("mipmaps requested for unknown texture {}", texture.id())),
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.screen = Rgba32FImage::new(width, height);
        self.commands
            .push(DeviceCommand::ResizeSurface { width, height });
    }

    fn present(&mut self) -> RenderResult<()> {
        self.frames_presented += 1;
        self.commands.push(DeviceCommand::Present);
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}
