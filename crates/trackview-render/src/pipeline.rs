//! The multi-pass filter pipeline.
//!
//! Every frame renders the mesh into the full-resolution primary target A,
//! runs the stages of the active [`FilterMode`] on A (using the secondary
//! target B as the intermediate for blurs) and finally copies A to the
//! screen.

use glam::{Mat4, UVec2, Vec4};
use trackview_core::{FilterMode, FilterStage, Mesh, ViewerOptions};

use crate::device::{RenderDevice, UniformLocation, UniformValue};
use crate::error::RenderResult;
use crate::quad::FullscreenQuad;
use crate::shader::{ProgramKind, ShaderProgram};
use crate::target::RenderTarget;

/// Immutable settings handed to the pipeline at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Right shift applied to the window size for the blur target.
    pub downscale_level: u32,
    /// Background of the scene pass.
    pub clear_color: Vec4,
    /// Projection used by the model-shading program.
    pub projection: Mat4,
    /// Mode active on the first frame.
    pub initial_mode: FilterMode,
}

impl PipelineSettings {
    /// Settings derived from viewer options and a projection.
    #[must_use]
    pub fn from_options(options: &ViewerOptions, projection: Mat4) -> Self {
        Self {
            downscale_level: options.downscale_level,
            clear_color: options.clear_color,
            projection,
            initial_mode: FilterMode::default(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            downscale_level: trackview_core::DEFAULT_DOWNSCALE_LEVEL,
            clear_color: Vec4::new(0.0, 0.0, 1.0, 1.0),
            projection: Mat4::IDENTITY,
            initial_mode: FilterMode::default(),
        }
    }
}

/// One program per pass.
#[derive(Debug)]
struct Programs {
    model: ShaderProgram,
    passthrough: ShaderProgram,
    horizontal_blur: ShaderProgram,
    vertical_blur: ShaderProgram,
    greyscale: ShaderProgram,
}

impl Programs {
    fn compile<D: RenderDevice + ?Sized>(device: &mut D) -> RenderResult<Self> {
        Ok(Self {
            model: ShaderProgram::create(device, &ProgramKind::ModelShading.source())?,
            passthrough: ShaderProgram::create(device, &ProgramKind::Passthrough.source())?,
            horizontal_blur: ShaderProgram::create(device, &ProgramKind::HorizontalBlur.source())?,
            vertical_blur: ShaderProgram::create(device, &ProgramKind::VerticalBlur.source())?,
            greyscale: ShaderProgram::create(device, &ProgramKind::Greyscale.source())?,
        })
    }
}

/// Uniform locations resolved once at startup.
#[derive(Debug, Clone, Copy)]
struct Locations {
    projection: UniformLocation,
    modelview: UniformLocation,
    modelview_inverse: UniformLocation,
    dx: UniformLocation,
    dy: UniformLocation,
}

impl Locations {
    fn resolve(programs: &Programs) -> RenderResult<Self> {
        Ok(Self {
            projection: programs.model.require_uniform("projection_matrix")?,
            modelview: programs.model.require_uniform("modelview_matrix")?,
            modelview_inverse: programs.model.require_uniform("modelview_inverse_matrix")?,
            dx: programs.horizontal_blur.require_uniform("dx")?,
            dy: programs.vertical_blur.require_uniform("dy")?,
        })
    }
}

/// Owns the programs, render targets and filter mode, and sequences passes.
pub struct FilterPipeline<D: RenderDevice> {
    device: D,
    programs: Programs,
    locations: Locations,
    primary: RenderTarget,
    secondary: RenderTarget,
    mode: FilterMode,
    width: u32,
    height: u32,
    downscale_level: u32,
    clear_color: Vec4,
}

impl<D: RenderDevice> FilterPipeline<D> {
    /// Compiles every program, uploads the geometry and allocates both targets.
    ///
    /// Any failure here is an initialization error.
    pub fn new(
        mut device: D,
        width: u32,
        height: u32,
        settings: &PipelineSettings,
        mesh: &Mesh,
        quad: &FullscreenQuad,
    ) -> RenderResult<Self> {
        let programs = Programs::compile(&mut device)?;
        let locations = Locations::resolve(&programs)?;

        device.upload_mesh(mesh.positions(), mesh.normals())?;
        device.upload_quad(quad)?;

        let primary = RenderTarget::create(&mut device, width, height)?;
        let size = settings
            .initial_mode
            .secondary_target_size(width, height, settings.downscale_level);
        let secondary = RenderTarget::create(&mut device, size.x, size.y)?;

        let mut pipeline = Self {
            device,
            programs,
            locations,
            primary,
            secondary,
            mode: settings.initial_mode,
            width,
            height,
            downscale_level: settings.downscale_level,
            clear_color: settings.clear_color,
        };
        pipeline.set_projection(settings.projection);
        pipeline.update_blur_steps();

        // Drivers may report benign errors while the context comes up.
        for error in pipeline.device.take_errors() {
            log::debug!("ignoring startup device error: {error}");
        }

        log::info!(
            "filter pipeline ready: {width}x{height}, {} mesh parts, mode {}",
            mesh.part_count(),
            pipeline.mode
        );
        Ok(pipeline)
    }

    /// Renders one frame: scene pass, filter stages, screen pass.
    pub fn render_frame(&mut self, view: Mat4, model: Mat4, mesh: &Mesh) -> RenderResult<()> {
        self.render_scene(view, model, mesh)?;

        for stage in self.mode.stages() {
            match stage {
                FilterStage::Greyscale => self.run_greyscale()?,
                FilterStage::Blur => self.run_blur()?,
            }
        }

        self.draw_to_screen();
        Ok(())
    }

    /// Shows the last rendered frame.
    pub fn present(&mut self) -> RenderResult<()> {
        self.device.present()?;
        self.report_errors("present");
        Ok(())
    }

    /// Switches the filter mode, reallocating the secondary target.
    ///
    /// Returns whether anything changed.
    pub fn set_filter_mode(&mut self, mode: FilterMode) -> RenderResult<bool> {
        if mode == self.mode {
            return Ok(false);
        }
        let size = mode.secondary_target_size(self.width, self.height, self.downscale_level);
        self.replace_secondary(size)?;
        log::info!("filter mode {} -> {mode}", self.mode);
        self.mode = mode;
        Ok(true)
    }

    #[must_use]
    pub fn filter_mode(&self) -> FilterMode {
        self.mode
    }

    /// Sets the projection used by the scene pass.
    pub fn set_projection(&mut self, projection: Mat4) {
        self.device.set_uniform(
            self.programs.model.handle(),
            self.locations.projection,
            UniformValue::Mat4(projection),
        );
    }

    /// Reallocates both targets for a new window size.
    ///
    /// Zero sizes (a minimized window) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            log::debug!("ignoring resize to {width}x{height}");
            return Ok(());
        }
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }

        let mut primary = RenderTarget::create(&mut self.device, width, height)?;
        std::mem::swap(&mut self.primary, &mut primary);
        primary.destroy(&mut self.device);

        self.width = width;
        self.height = height;
        self.device.resize_surface(width, height);

        let size = self
            .mode
            .secondary_target_size(width, height, self.downscale_level);
        self.replace_secondary(size)?;
        log::info!("resized to {width}x{height}");
        Ok(())
    }

    /// Window size the pipeline renders at.
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Full-resolution target A.
    #[must_use]
    pub fn primary_target(&self) -> &RenderTarget {
        &self.primary
    }

    /// Blur intermediate B.
    #[must_use]
    pub fn secondary_target(&self) -> &RenderTarget {
        &self.secondary
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Consumes the pipeline and returns its device.
    pub fn into_device(self) -> D {
        self.device
    }

    fn replace_secondary(&mut self, size: UVec2) -> RenderResult<()> {
        let mut secondary = RenderTarget::create(&mut self.device, size.x, size.y)?;
        std::mem::swap(&mut self.secondary, &mut secondary);
        secondary.destroy(&mut self.device);
        self.update_blur_steps();
        log::info!("secondary target now {}x{}", size.x, size.y);
        Ok(())
    }

    /// Blur taps are one texel of B apart.
    fn update_blur_steps(&mut self) {
        let size = self.secondary.size().as_vec2();
        self.device.set_uniform(
            self.programs.horizontal_blur.handle(),
            self.locations.dx,
            UniformValue::Float(1.0 / size.x),
        );
        self.device.set_uniform(
            self.programs.vertical_blur.handle(),
            self.locations.dy,
            UniformValue::Float(1.0 / size.y),
        );
    }

    fn render_scene(&mut self, view: Mat4, model: Mat4, mesh: &Mesh) -> RenderResult<()> {
        let program = self.programs.model.handle();
        let locations = self.locations;
        let (width, height) = (self.primary.width(), self.primary.height());

        let mut target = self.primary.bind(&mut self.device)?;
        target.clear(self.clear_color);
        target.set_viewport(width, height);
        target.use_program(program);
        mesh.walk(model, |_, part, world| {
            let modelview = view * world;
            target.set_uniform(program, locations.modelview, UniformValue::Mat4(modelview));
            target.set_uniform(
                program,
                locations.modelview_inverse,
                UniformValue::Mat4(modelview.inverse()),
            );
            if part.count > 0 {
                target.draw_mesh_range(part.first, part.count);
            }
        });
        target.unbind();

        self.report_errors("scene pass");
        Ok(())
    }

    /// Greyscale in place: A is both input and output.
    fn run_greyscale(&mut self) -> RenderResult<()> {
        let input = self.primary.as_texture();
        let (width, height) = (self.primary.width(), self.primary.height());

        let mut target = self.primary.bind(&mut self.device)?;
        target.set_depth_write(false);
        target.set_viewport(width, height);
        target.use_program(self.programs.greyscale.handle());
        target.draw_fullscreen_quad(input);
        target.set_depth_write(true);
        target.unbind();

        self.report_errors("greyscale pass");
        Ok(())
    }

    /// Vertical blur from mipmapped A into B, then horizontal blur from B into A.
    fn run_blur(&mut self) -> RenderResult<()> {
        let scene = self.primary.as_texture();
        self.device.generate_mipmaps(scene);

        let (width, height) = (self.secondary.width(), self.secondary.height());
        let mut target = self.secondary.bind(&mut self.device)?;
        target.set_depth_write(false);
        target.set_viewport(width, height);
        target.use_program(self.programs.vertical_blur.handle());
        target.draw_fullscreen_quad(scene);
        target.set_depth_write(true);
        target.unbind();

        let blurred = self.secondary.as_texture();
        let (width, height) = (self.primary.width(), self.primary.height());
        let mut target = self.primary.bind(&mut self.device)?;
        target.set_depth_write(false);
        target.set_viewport(width, height);
        target.use_program(self.programs.horizontal_blur.handle());
        target.draw_fullscreen_quad(blurred);
        target.set_depth_write(true);
        target.unbind();

        self.report_errors("blur pass");
        Ok(())
    }

    fn draw_to_screen(&mut self) {
        let device = &mut self.device;
        device.set_viewport(self.width, self.height);
        device.set_depth_write(false);
        device.use_program(self.programs.passthrough.handle());
        device.draw_fullscreen_quad(self.primary.as_texture());
        device.set_depth_write(true);

        self.report_errors("screen pass");
    }

    fn report_errors(&mut self, pass: &str) {
        for error in self.device.take_errors() {
            log::warn!("device error after {pass}: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Framebuffer;
    use crate::software::{DeviceCommand, SoftwareDevice};
    use trackview_core::{MeshBuilder, Vec3};

    fn one_triangle() -> Mesh {
        let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 3);
        builder
            .push_vertices(&[Vec3::ZERO, Vec3::X, Vec3::Y], &[Vec3::Z; 3])
            .unwrap();
        builder.build().unwrap()
    }

    fn pipeline(width: u32, height: u32) -> FilterPipeline<SoftwareDevice> {
        FilterPipeline::new(
            SoftwareDevice::new(width, height),
            width,
            height,
            &PipelineSettings::default(),
            &one_triangle(),
            &FullscreenQuad::UNIT,
        )
        .unwrap()
    }

    fn quad_programs(commands: &[DeviceCommand]) -> Vec<ProgramKind> {
        commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawQuad { program, .. } => Some(*program),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pass_sequence_per_mode() {
        let mesh = one_triangle();
        let expected = [
            (FilterMode::Standard, vec![ProgramKind::Passthrough]),
            (
                FilterMode::Blur,
                vec![
                    ProgramKind::VerticalBlur,
                    ProgramKind::HorizontalBlur,
                    ProgramKind::Passthrough,
                ],
            ),
            (
                FilterMode::Greyscale,
                vec![ProgramKind::Greyscale, ProgramKind::Passthrough],
            ),
            (
                FilterMode::ComboGreyscaleBlur,
                vec![
                    ProgramKind::Greyscale,
                    ProgramKind::VerticalBlur,
                    ProgramKind::HorizontalBlur,
                    ProgramKind::Passthrough,
                ],
            ),
        ];
        for (mode, programs) in expected {
            let mut p = pipeline(64, 32);
            p.set_filter_mode(mode).unwrap();
            p.device_mut().clear_commands();
            p.render_frame(Mat4::IDENTITY, Mat4::IDENTITY, &mesh).unwrap();
            assert_eq!(quad_programs(p.device().commands()), programs, "{mode}");
            assert!(p.device().depth_write(), "depth writes restored in {mode}");
            assert_eq!(p.device().bound_framebuffer(), Framebuffer::Screen);
        }
    }

    #[test]
    fn test_blur_reads_mipmapped_scene_into_secondary() {
        let mesh = one_triangle();
        let mut p = pipeline(64, 32);
        p.set_filter_mode(FilterMode::Blur).unwrap();
        p.device_mut().clear_commands();
        p.render_frame(Mat4::IDENTITY, Mat4::IDENTITY, &mesh).unwrap();

        let a = p.primary_target().attachments();
        let b = p.secondary_target().attachments();
        let commands = p.device().commands();
        let mip = commands
            .iter()
            .position(|c| *c == DeviceCommand::GenerateMipmaps(a.color))
            .unwrap();
        let vertical = commands
            .iter()
            .position(|c| {
                *c == DeviceCommand::DrawQuad {
                    target: Framebuffer::Offscreen(b),
                    program: ProgramKind::VerticalBlur,
                    input: a.color,
                }
            })
            .unwrap();
        let horizontal = commands
            .iter()
            .position(|c| {
                *c == DeviceCommand::DrawQuad {
                    target: Framebuffer::Offscreen(a),
                    program: ProgramKind::HorizontalBlur,
                    input: b.color,
                }
            })
            .unwrap();
        assert!(mip < vertical && vertical < horizontal);
        assert!(commands.contains(&DeviceCommand::Viewport { width: 4, height: 2 }));
    }

    #[test]
    fn test_blur_steps_follow_secondary_size() {
        let mut p = pipeline(800, 600);
        p.set_filter_mode(FilterMode::Blur).unwrap();
        let commands = p.device().commands();
        let last = |name: &str| {
            commands.iter().rev().find_map(|c| match c {
                DeviceCommand::SetUniform {
                    name: n,
                    value: UniformValue::Float(v),
                    ..
                } if *n == name => Some(*v),
                _ => None,
            })
        };
        assert_eq!(last("dx"), Some(1.0 / 50.0));
        assert_eq!(last("dy"), Some(1.0 / 37.0));
    }

    #[test]
    fn test_startup_errors_are_swallowed_once() {
        let mut device = SoftwareDevice::new(8, 8);
        device.inject_error("GL_INVALID_ENUM from the loader");
        let mut p = FilterPipeline::new(
            device,
            8,
            8,
            &PipelineSettings::default(),
            &one_triangle(),
            &FullscreenQuad::UNIT,
        )
        .unwrap();
        assert!(p.device_mut().take_errors().is_empty());

        p.device_mut().inject_error("late error");
        p.render_frame(Mat4::IDENTITY, Mat4::IDENTITY, &one_triangle())
            .unwrap();
        assert!(p.device_mut().take_errors().is_empty());
    }

    #[test]
    fn test_resize_reallocates_targets() {
        let mut p = pipeline(64, 64);
        p.set_filter_mode(FilterMode::Blur).unwrap();
        let old_a = p.primary_target().as_texture();
        p.resize(128, 32).unwrap();
        assert_eq!(p.primary_target().size(), UVec2::new(128, 32));
        assert_eq!(p.secondary_target().size(), UVec2::new(8, 2));
        assert!(!p.device().is_allocated(old_a));
        assert_eq!(p.device().screen().dimensions(), (128, 32));

        p.resize(0, 0).unwrap();
        assert_eq!(p.size(), UVec2::new(128, 32));
    }

    #[test]
    fn test_failed_resize_keeps_targets() {
        let device = SoftwareDevice::new(64, 64).with_max_texture_size(64);
        let mut p = FilterPipeline::new(
            device,
            64,
            64,
            &PipelineSettings::default(),
            &one_triangle(),
            &FullscreenQuad::UNIT,
        )
        .unwrap();
        assert!(p.resize(128, 128).is_err());
        assert_eq!(p.size(), UVec2::new(64, 64));
        assert!(p.primary_target().is_valid());
        assert!(p.secondary_target().is_valid());
        p.render_frame(Mat4::IDENTITY, Mat4::IDENTITY, &one_triangle())
            .unwrap();
    }
}
