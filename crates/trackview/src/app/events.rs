use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use super::App;
use crate::input::{self, InputCommand};

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(error) = self.init_window(event_loop) {
            self.fail(error);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let result = match event {
            WindowEvent::CloseRequested => self.apply(InputCommand::Quit),
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::ModifiersChanged(modifiers) => {
                self.ctrl_down = modifiers.state().control_key();
                Ok(())
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                if self.trackball.is_dragging() {
                    self.apply(InputCommand::UpdateDrag)
                } else {
                    Ok(())
                }
            }
            WindowEvent::MouseInput { state, .. } => self.apply(input::mouse_command(state)),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match input::key_command(code, self.ctrl_down) {
                Some(command) => self.apply(command),
                None => Ok(()),
            },
            WindowEvent::RedrawRequested => {
                let result = self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
                result
            }
            _ => Ok(()),
        };

        if let Err(error) = result {
            self.fail(error);
        }
        if self.close_requested {
            event_loop.exit();
        }
    }
}
