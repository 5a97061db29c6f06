//! Mapping from window events to viewer commands.
//!
//! Kept free of any window or device state so the bindings can be tested on
//! their own.

use trackview_core::FilterMode;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// What the viewer should do in response to an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    /// Start a trackball drag at the cursor.
    BeginDrag,
    /// Finish the trackball drag at the cursor.
    EndDrag,
    /// Continue the trackball drag at the cursor.
    UpdateDrag,
    /// Switch the post-processing filter.
    SetFilterMode(FilterMode),
    /// Leave the event loop.
    Quit,
}

/// Command for a pressed key, if the key is bound.
///
/// Escape and Ctrl+Q quit; the digits 0-3 on the main row or the keypad
/// select a filter mode.
#[must_use]
pub fn key_command(code: KeyCode, ctrl: bool) -> Option<InputCommand> {
    let digit = match code {
        KeyCode::Escape => return Some(InputCommand::Quit),
        KeyCode::KeyQ if ctrl => return Some(InputCommand::Quit),
        KeyCode::Digit0 | KeyCode::Numpad0 => 0,
        KeyCode::Digit1 | KeyCode::Numpad1 => 1,
        KeyCode::Digit2 | KeyCode::Numpad2 => 2,
        KeyCode::Digit3 | KeyCode::Numpad3 => 3,
        _ => return None,
    };
    FilterMode::from_digit(digit).map(InputCommand::SetFilterMode)
}

/// Command for a mouse button transition. Every button drives the trackball.
#[must_use]
pub fn mouse_command(state: ElementState) -> InputCommand {
    match state {
        ElementState::Pressed => InputCommand::BeginDrag,
        ElementState::Released => InputCommand::EndDrag,
    }
}
