//! The wgpu rendering device.

mod frame;
mod mipmap;
mod pipelines;
mod readback;
mod textures;

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use glam::{UVec2, Vec3, Vec4};

use crate::buffer;
use crate::device::{
    AttachmentHandle, Framebuffer, ProgramHandle, RenderDevice, TargetAttachments,
    UniformLocation, UniformValue,
};
use crate::error::{RenderError, RenderResult};
use crate::quad::FullscreenQuad;
use crate::shader::ProgramSource;

use frame::{DrawKind, FrameRecorder, FrameStep, RecordedDraw, RecordedPass, UniformArena};
use mipmap::MipmapGenerator;
use pipelines::{create_render_pipeline, GpuProgram, PipelineKey};
use textures::{ColorAttachment, DepthAttachment, GpuAttachment, ScreenTargets};

pub use textures::{mip_level_count, DEPTH_FORMAT, OFFSCREEN_FORMAT};

struct MeshBuffers {
    positions: wgpu::Buffer,
    normals: wgpu::Buffer,
    vertex_count: u32,
}

struct QuadBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Where the frame's screen passes end up.
enum ScreenOutput {
    Surface(wgpu::SurfaceTexture),
    Headless,
}

/// [`RenderDevice`] backed by wgpu.
///
/// State-machine calls are recorded and replayed into a single command
/// encoder by [`RenderDevice::present`]. Validation errors raised while
/// recording or submitting a frame are collected by an error scope that spans
/// the frame and come back out of [`RenderDevice::take_errors`].
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: wgpu::SurfaceConfiguration,
    sample_count: u32,
    screen: ScreenTargets,
    sampler: wgpu::Sampler,
    mipmaps: MipmapGenerator,
    uniforms: UniformArena,
    uniform_alignment: u32,

    attachments: HashMap<AttachmentHandle, GpuAttachment>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    mesh: Option<MeshBuffers>,
    quad: Option<QuadBuffers>,
    next_id: u32,

    frame: FrameRecorder,
    bound: Framebuffer,
    viewport: UVec2,
    depth_write: bool,
    current_program: Option<ProgramHandle>,
    errors: Vec<String>,
}

impl WgpuDevice {
    /// Creates a device presenting to `window`.
    pub async fn new_windowed(
        window: Arc<winit::window::Window>,
        sample_count: u32,
    ) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;
        let (device, queue) = request_device(&adapter, "trackview device").await?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        // Filters work on unencoded values, like a default GL framebuffer.
        let format = caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(RenderError::SurfaceConfigurationFailed)?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sample_count = supported_sample_count(&adapter, format, sample_count);
        Ok(Self::from_parts(
            device,
            queue,
            Some(surface),
            surface_config,
            sample_count,
        ))
    }

    /// Creates a device rendering the screen into an off-screen texture that
    /// [`WgpuDevice::read_screen`] can read back.
    pub async fn new_headless(width: u32, height: u32, sample_count: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;
        let (device, queue) = request_device(&adapter, "trackview device (headless)").await?;

        let format = wgpu::TextureFormat::Rgba8Unorm;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let sample_count = supported_sample_count(&adapter, format, sample_count);
        Ok(Self::from_parts(device, queue, None, surface_config, sample_count))
    }

    fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<wgpu::Surface<'static>>,
        surface_config: wgpu::SurfaceConfiguration,
        sample_count: u32,
    ) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let screen = ScreenTargets::new(&device, &surface_config, sample_count, surface.is_none());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("filter input sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..wgpu::SamplerDescriptor::default()
        });
        let mut mipmaps = MipmapGenerator::new(&device);
        mipmaps.ensure_pipeline(&device, OFFSCREEN_FORMAT);
        let uniforms = UniformArena::new(&device);
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment;

        log::info!(
            "wgpu device ready: {}x{} {:?}, {} sample(s){}",
            surface_config.width,
            surface_config.height,
            surface_config.format,
            sample_count,
            if surface.is_none() { ", headless" } else { "" }
        );

        Self {
            device,
            queue,
            surface,
            surface_config,
            sample_count,
            screen,
            sampler,
            mipmaps,
            uniforms,
            uniform_alignment,
            attachments: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            mesh: None,
            quad: None,
            next_id: 1,
            frame: FrameRecorder::default(),
            bound: Framebuffer::Screen,
            viewport: UVec2::ONE,
            depth_write: true,
            current_program: None,
            errors: Vec::new(),
        }
    }

    /// Size of the screen framebuffer.
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.surface_config.width, self.surface_config.height)
    }

    /// Color format of the screen framebuffer.
    #[must_use]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    /// MSAA sample count of the screen framebuffer.
    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Returns true if the screen is an off-screen texture.
    #[must_use]
    pub fn is_headless(&self) -> bool {
        self.surface.is_none()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Reports the frame's validation errors and opens the next frame's scope.
    fn finish_frame_scope(&mut self) {
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            self.errors.push(error.to_string());
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    /// Acquires the frame's output, or `None` if the frame should be skipped.
    fn acquire_output(&self) -> RenderResult<Option<ScreenOutput>> {
        let Some(surface) = &self.surface else {
            return Ok(Some(ScreenOutput::Headless));
        };
        match surface.get_current_texture() {
            Ok(texture) => Ok(Some(ScreenOutput::Surface(texture))),
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::debug!("surface outdated, reconfiguring");
                surface.configure(&self.device, &self.surface_config);
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(RenderError::OutOfMemory),
            Err(err) => {
                log::warn!("skipping frame: {err}");
                Ok(None)
            }
        }
    }

    /// Records a draw with the current program into the bound framebuffer.
    fn record_draw(&mut self, kind: DrawKind) {
        let Some(handle) = self.current_program else {
            self.errors.push("draw issued with no program in use".to_string());
            return;
        };
        let Some(program) = self.programs.get(&handle) else {
            self.errors
                .push(format!("draw issued with unknown program {}", handle.id()));
            return;
        };
        if program.kind.draws_mesh() != matches!(kind, DrawKind::Mesh { .. }) {
            self.errors.push(format!(
                "program '{}' cannot issue this kind of draw",
                program.kind
            ));
            return;
        }

        let (format, sample_count) = match self.bound {
            Framebuffer::Screen => (self.surface_config.format, self.sample_count),
            Framebuffer::Offscreen(_) => (OFFSCREEN_FORMAT, 1),
        };
        let key = PipelineKey {
            program: handle,
            format,
            sample_count,
            depth_write: self.depth_write,
        };
        let device = &self.device;
        self.pipelines
            .entry(key)
            .or_insert_with(|| create_render_pipeline(device, program, key));

        let uniform_offset = self
            .frame
            .push_uniforms(&program.block, self.uniform_alignment);
        self.frame.draw(
            self.bound,
            RecordedDraw {
                pipeline: key,
                program: handle,
                viewport: self.viewport,
                uniform_offset,
                kind,
            },
        );
    }

    /// Resolves the color view, resolve target and depth view of a pass.
    fn pass_views<'a>(
        &'a self,
        target: Framebuffer,
        output: &'a wgpu::TextureView,
    ) -> Option<(
        &'a wgpu::TextureView,
        Option<&'a wgpu::TextureView>,
        &'a wgpu::TextureView,
        UVec2,
    )> {
        match target {
            Framebuffer::Screen => {
                let (color, resolve) = match &self.screen.msaa {
                    Some((_, view)) => (view, Some(output)),
                    None => (output, None),
                };
                Some((color, resolve, &self.screen.depth.view, self.size()))
            }
            Framebuffer::Offscreen(attachments) => {
                let Some(GpuAttachment::Color(color)) = self.attachments.get(&attachments.color)
                else {
                    return None;
                };
                let Some(GpuAttachment::Depth(depth)) = self.attachments.get(&attachments.depth)
                else {
                    return None;
                };
                Some((
                    &color.render_view,
                    None,
                    &depth.view,
                    UVec2::new(color.width, color.height),
                ))
            }
        }
    }

    fn create_bind_group(
        &self,
        program: &GpuProgram,
        draw: &RecordedDraw,
    ) -> Result<wgpu::BindGroup, String> {
        let uniforms = wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: self.uniforms.buffer(),
            offset: 0,
            size: NonZeroU64::new(program.block_size()),
        });

        let input_view = match draw.kind {
            DrawKind::Mesh { .. } => None,
            DrawKind::Quad { input, feedback } => match self.attachments.get(&input) {
                Some(GpuAttachment::Color(color)) if feedback => match &color.feedback {
                    Some(copy) => Some(&copy.view),
                    None => {
                        return Err(format!("attachment {} has no feedback copy", input.id()));
                    }
                },
                Some(GpuAttachment::Color(color)) => Some(&color.sample_view),
                _ => return Err(format!("attachment {} is not a color texture", input.id())),
            },
        };

        let bind_group = match input_view {
            None => self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("model shading bind group"),
                layout: &program.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms,
                }],
            }),
            Some(view) => self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("filter bind group"),
                layout: &program.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniforms,
                    },
                ],
            }),
        };
        Ok(bind_group)
    }

    /// Encodes one recorded pass. `fresh` marks a screen pass that is the first
    /// to touch this frame's output.
    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &RecordedPass,
        output: &wgpu::TextureView,
        fresh: bool,
    ) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(handle) = pass.feedback_copy {
            if let Some(GpuAttachment::Color(color)) = self.attachments.get(&handle) {
                color.copy_to_feedback(encoder);
            }
        }

        let Some((color_view, resolve_target, depth_view, target_size)) =
            self.pass_views(pass.target, output)
        else {
            errors.push("pass targets a destroyed render target".to_string());
            return errors;
        };

        let mut bind_groups = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            let bind_group = self
                .programs
                .get(&draw.program)
                .ok_or_else(|| format!("program {} was not found", draw.program.id()))
                .and_then(|program| self.create_bind_group(program, draw));
            match bind_group {
                Ok(bind_group) => bind_groups.push(Some(bind_group)),
                Err(message) => {
                    errors.push(message);
                    bind_groups.push(None);
                }
            }
        }

        let (color_load, depth_load) = match pass.clear {
            Some(c) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(c.x),
                    g: f64::from(c.y),
                    b: f64::from(c.z),
                    a: f64::from(c.w),
                }),
                wgpu::LoadOp::Clear(1.0),
            ),
            None if fresh => (
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                wgpu::LoadOp::Clear(1.0),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("trackview pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        for (draw, bind_group) in pass.draws.iter().zip(&bind_groups) {
            let (Some(pipeline), Some(bind_group)) =
                (self.pipelines.get(&draw.pipeline), bind_group)
            else {
                continue;
            };
            let viewport = draw.viewport.min(target_size).max(UVec2::ONE);
            render_pass.set_pipeline(pipeline);
            render_pass.set_viewport(
                0.0,
                0.0,
                viewport.x as f32,
                viewport.y as f32,
                0.0,
                1.0,
            );
            render_pass.set_bind_group(0, bind_group, &[draw.uniform_offset]);

            match draw.kind {
                DrawKind::Mesh { first, count } => {
                    let Some(mesh) = &self.mesh else {
                        errors.push("mesh draw issued before a mesh was uploaded".to_string());
                        continue;
                    };
                    render_pass.set_vertex_buffer(0, mesh.positions.slice(..));
                    render_pass.set_vertex_buffer(1, mesh.normals.slice(..));
                    render_pass.draw(first..first + count, 0..1);
                }
                DrawKind::Quad { .. } => {
                    let Some(quad) = &self.quad else {
                        errors.push("quad draw issued before the quad was uploaded".to_string());
                        continue;
                    };
                    render_pass.set_vertex_buffer(0, quad.vertices.slice(..));
                    render_pass.set_index_buffer(quad.indices.slice(..), wgpu::IndexFormat::Uint16);
                    render_pass.draw_indexed(0..quad.index_count, 0, 0..1);
                }
            }
        }

        errors
    }
}

async fn request_device(
    adapter: &wgpu::Adapter,
    label: &str,
) -> RenderResult<(wgpu::Device, wgpu::Queue)> {
    let info = adapter.get_info();
    log::info!("using adapter {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
        })
        .await?;
    Ok((device, queue))
}

/// Falls back to one sample when the adapter cannot multisample `format`.
fn supported_sample_count(
    adapter: &wgpu::Adapter,
    format: wgpu::TextureFormat,
    requested: u32,
) -> u32 {
    if requested <= 1 {
        return 1;
    }
    let color = adapter.get_texture_format_features(format).flags;
    let depth = adapter.get_texture_format_features(DEPTH_FORMAT).flags;
    if color.sample_count_supported(requested) && depth.sample_count_supported(requested) {
        requested
    } else {
        log::warn!("{requested}x MSAA is not supported for {format:?}; using 1 sample");
        1
    }
}

impl RenderDevice for WgpuDevice {
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> RenderResult<TargetAttachments> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::IncompleteRenderTarget {
                width,
                height,
                reason: format!("size must be between 1 and {max}"),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let color = ColorAttachment::new(&self.device, width, height);
        let depth = DepthAttachment::new(&self.device, width, height, 1);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            return Err(RenderError::IncompleteRenderTarget {
                width,
                height,
                reason: error.to_string(),
            });
        }

        let attachments = TargetAttachments {
            color: AttachmentHandle(self.allocate_id()),
            depth: AttachmentHandle(self.allocate_id()),
        };
        self.attachments
            .insert(attachments.color, GpuAttachment::Color(color));
        self.attachments
            .insert(attachments.depth, GpuAttachment::Depth(depth));
        log::debug!(
            "created {width}x{height} render target (color {}, depth {})",
            attachments.color.id(),
            attachments.depth.id()
        );
        Ok(attachments)
    }

    fn destroy_render_target(&mut self, attachments: TargetAttachments) {
        self.attachments.remove(&attachments.color);
        self.attachments.remove(&attachments.depth);
        if self.bound == Framebuffer::Offscreen(attachments) {
            self.bound = Framebuffer::Screen;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Framebuffer) {
        self.bound = framebuffer;
    }

    fn bound_framebuffer(&self) -> Framebuffer {
        self.bound
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = UVec2::new(width, height);
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    fn clear(&mut self, color: Vec4) {
        self.frame.clear(self.bound, color);
    }

    fn create_program(&mut self, source: &ProgramSource) -> RenderResult<ProgramHandle> {
        source.validate()?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let program = match GpuProgram::new(&self.device, source) {
            Ok(program) => program,
            Err(err) => {
                let _ = pollster::block_on(self.device.pop_error_scope());
                return Err(err);
            }
        };
        let handle = ProgramHandle(self.allocate_id());
        let key = PipelineKey {
            program: handle,
            format: OFFSCREEN_FORMAT,
            sample_count: 1,
            depth_write: source.kind.draws_mesh(),
        };
        let pipeline = create_render_pipeline(&self.device, &program, key);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilationFailed {
                program: source.kind.to_string(),
                message: error.to_string(),
            });
        }

        self.pipelines.insert(key, pipeline);
        self.programs.insert(handle, program);
        log::debug!("compiled program '{}' as {}", source.kind, handle.id());
        Ok(handle)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: UniformValue,
    ) {
        let Some(gpu) = self.programs.get_mut(&program) else {
            self.errors
                .push(format!("set_uniform on unknown program {}", program.id()));
            return;
        };
        let end = location.offset as usize + location.ty.size() as usize;
        if value.ty() != location.ty || end > gpu.block.len() {
            self.errors.push(format!(
                "uniform at offset {} of '{}' does not accept {:?}",
                location.offset,
                gpu.kind,
                value.ty()
            ));
            return;
        }
        value.write_into(&mut gpu.block, location.offset);
    }

    fn upload_mesh(&mut self, positions: &[Vec3], normals: &[Vec3]) -> RenderResult<()> {
        if positions.is_empty() {
            return Err(RenderError::BufferCreationFailed(
                "mesh has no vertices".to_string(),
            ));
        }
        if positions.len() != normals.len() {
            return Err(RenderError::BufferCreationFailed(format!(
                "{} positions but {} normals",
                positions.len(),
                normals.len()
            )));
        }

        let positions: Vec<[f32; 3]> = positions.iter().map(|p| p.to_array()).collect();
        let normals: Vec<[f32; 3]> = normals.iter().map(|n| n.to_array()).collect();
        self.mesh = Some(MeshBuffers {
            positions: buffer::create_vertex_buffer(
                &self.device,
                &positions,
                Some("mesh positions"),
            ),
            normals: buffer::create_vertex_buffer(&self.device, &normals, Some("mesh normals")),
            vertex_count: positions.len() as u32,
        });
        Ok(())
    }

    fn upload_quad(&mut self, quad: &FullscreenQuad) -> RenderResult<()> {
        self.quad = Some(QuadBuffers {
            vertices: buffer::create_vertex_buffer(
                &self.device,
                &quad.vertices,
                Some("fullscreen quad vertices"),
            ),
            indices: buffer::create_index_buffer(
                &self.device,
                &quad.indices,
                Some("fullscreen quad indices"),
            ),
            index_count: quad.index_count(),
        });
        Ok(())
    }

    fn draw_mesh_range(&mut self, first: u32, count: u32) {
        let vertex_count = self.mesh.as_ref().map_or(0, |mesh| mesh.vertex_count);
        if u64::from(first) + u64::from(count) > u64::from(vertex_count) {
            self.errors.push(format!(
                "draw range {first}+{count} exceeds {vertex_count} uploaded vertices"
            ));
            return;
        }
        self.record_draw(DrawKind::Mesh { first, count });
    }

    fn draw_fullscreen_quad(&mut self, input: AttachmentHandle) {
        let feedback =
            matches!(self.bound, Framebuffer::Offscreen(target) if target.color == input);
        match self.attachments.get_mut(&input) {
            Some(GpuAttachment::Color(color)) => {
                if feedback {
                    color.ensure_feedback(&self.device);
                }
            }
            _ => {
                self.errors
                    .push(format!("attachment {} is not a color texture", input.id()));
                return;
            }
        }
        self.record_draw(DrawKind::Quad { input, feedback });
    }

    fn generate_mipmaps(&mut self, texture: AttachmentHandle) {
        self.frame.generate_mipmaps(texture);
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.surface_config);
        }
        self.screen = ScreenTargets::new(
            &self.device,
            &self.surface_config,
            self.sample_count,
            self.surface.is_none(),
        );
    }

    fn present(&mut self) -> RenderResult<()> {
        let frame = self.frame.take();

        let output = match self.acquire_output() {
            Ok(Some(output)) => output,
            Ok(None) => {
                self.finish_frame_scope();
                return Ok(());
            }
            Err(err) => {
                self.finish_frame_scope();
                return Err(err);
            }
        };
        let output_view = match &output {
            ScreenOutput::Surface(texture) => Some(
                texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
            ),
            ScreenOutput::Headless => self
                .screen
                .headless
                .as_ref()
                .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default())),
        };
        let Some(output_view) = output_view else {
            self.finish_frame_scope();
            return Err(RenderError::SurfaceConfigurationFailed);
        };

        self.uniforms
            .upload(&self.device, &self.queue, &frame.uniforms);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("trackview frame encoder"),
            });
        let mut errors = Vec::new();
        let mut screen_touched = false;
        for step in &frame.steps {
            match step {
                FrameStep::Mipmaps(handle) => match self.attachments.get(handle) {
                    Some(GpuAttachment::Color(color)) => {
                        self.mipmaps
                            .generate(&self.device, &mut encoder, &color.texture);
                    }
                    _ => errors.push(format!(
                        "cannot generate mipmaps for attachment {}",
                        handle.id()
                    )),
                },
                FrameStep::Pass(pass) => {
                    let fresh = pass.target == Framebuffer::Screen && !screen_touched;
                    screen_touched |= pass.target == Framebuffer::Screen;
                    errors.extend(self.encode_pass(&mut encoder, pass, &output_view, fresh));
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let ScreenOutput::Surface(texture) = output {
            texture.present();
        }

        self.errors.extend(errors);
        self.finish_frame_scope();
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}
