//! Window and event loop management.

mod events;

use std::sync::Arc;

use pollster::FutureExt;
use trackview_core::{FilterMode, Mesh, Trackball, ViewerOptions};
use trackview_render::{FilterPipeline, FullscreenQuad, PipelineSettings, WgpuDevice};
use winit::dpi::PhysicalSize;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::Window;

use crate::camera::Camera;
use crate::error::{Result, ViewerError};
use crate::input::InputCommand;

/// The viewer application state.
pub struct App {
    options: ViewerOptions,
    camera: Camera,
    trackball: Trackball,
    mesh: Mesh,
    window: Option<Arc<Window>>,
    pipeline: Option<FilterPipeline<WgpuDevice>>,
    cursor: (f32, f32),
    ctrl_down: bool,
    close_requested: bool,
    /// First fatal error; returned from [`run`] once the loop exits.
    error: Option<ViewerError>,
}

impl App {
    pub fn new(options: ViewerOptions, mesh: Mesh) -> Self {
        let camera = Camera::from_options(&options);
        let trackball = Trackball::with_viewport(
            options.window_width as i32,
            options.window_height as i32,
        );
        Self {
            options,
            camera,
            trackball,
            mesh,
            window: None,
            pipeline: None,
            cursor: (0.0, 0.0),
            ctrl_down: false,
            close_requested: false,
            error: None,
        }
    }

    /// Creates the window and everything that renders into it.
    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.options.window_width,
                self.options.window_height,
            ))
            .with_resizable(self.options.resizable);
        let window = Arc::new(event_loop.create_window(attributes)?);

        let device = WgpuDevice::new_windowed(window.clone(), self.options.sample_count)
            .block_on()?;
        let size = device.size();
        self.resize_views(size.x, size.y);

        let settings =
            PipelineSettings::from_options(&self.options, self.camera.projection_matrix());
        let pipeline = FilterPipeline::new(
            device,
            size.x,
            size.y,
            &settings,
            &self.mesh,
            &FullscreenQuad::UNIT,
        )?;
        log::info!(
            "{} ready at {}x{} (mode {})",
            self.options.title,
            size.x,
            size.y,
            pipeline.filter_mode()
        );

        window.request_redraw();
        self.window = Some(window);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Keeps camera and trackball in step with the framebuffer size.
    fn resize_views(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
        self.trackball.set_viewport_size(width as i32, height as i32);
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.resize_views(width, height);
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.resize(width, height)?;
            pipeline.set_projection(self.camera.projection_matrix());
        }
        Ok(())
    }

    fn apply(&mut self, command: InputCommand) -> Result<()> {
        let (x, y) = self.cursor;
        match command {
            InputCommand::BeginDrag => self.trackball.begin_drag(x, y),
            InputCommand::EndDrag => self.trackball.end_drag(x, y),
            InputCommand::UpdateDrag => {
                self.trackball.update_drag(x, y);
            }
            InputCommand::SetFilterMode(mode) => self.set_filter_mode(mode)?,
            InputCommand::Quit => self.close_requested = true,
        }
        Ok(())
    }

    fn set_filter_mode(&mut self, mode: FilterMode) -> Result<()> {
        if let Some(pipeline) = &mut self.pipeline {
            if pipeline.set_filter_mode(mode)? {
                if let Some(window) = &self.window {
                    window.set_title(&format!("{} [{}]", self.options.title, mode.label()));
                }
            }
        }
        Ok(())
    }

    /// Renders and presents one frame.
    fn redraw(&mut self) -> Result<()> {
        let Some(pipeline) = &mut self.pipeline else {
            return Ok(());
        };
        let view = self.camera.view_matrix(self.trackball.rotation_matrix());
        pipeline.render_frame(view, self.camera.model_matrix(), &self.mesh)?;
        pipeline.present()?;
        Ok(())
    }

    /// Records a fatal error and stops the loop.
    fn fail(&mut self, error: ViewerError) {
        log::error!("{error}");
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.close_requested = true;
    }
}

/// Opens the viewer window and runs until it is closed.
pub fn run(options: ViewerOptions, mesh: Mesh) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(options, mesh);
    event_loop.run_app(&mut app)?;
    log::info!("Bye");
    match app.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
