//! trackview: an interactive mesh viewer with trackball orbiting and
//! switchable post-processing filters.
//!
//! Drag with any mouse button to rotate the model. Keys `0`-`3` switch the
//! filter:
//!
//! | key | mode |
//! |-----|------|
//! | `0` | standard |
//! | `1` | blur through a downscaled target |
//! | `2` | greyscale |
//! | `3` | greyscale, then blur |
//!
//! `Escape` or `Ctrl+Q` quits.
//!
//! # Quick Start
//!
//! ```no_run
//! use trackview::*;
//!
//! fn main() -> Result<()> {
//!     let options = ViewerOptions::default();
//!     let mesh = load_mesh(&options.mesh_path)?;
//!     run(options, mesh)
//! }
//! ```

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Window sizes and cursor positions move between integer and float types
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

mod app;
pub mod camera;
pub mod error;
pub mod headless;
pub mod input;
pub mod loader;

pub use app::{run, App};
pub use camera::Camera;
pub use error::{Result, ViewerError};
pub use headless::{render_to_file, render_to_image};
pub use input::{key_command, mouse_command, InputCommand};
pub use loader::{load_mesh, mesh_from_models};

pub use trackview_core::{FilterMode, Mat4, Mesh, Trackball, Vec3, ViewerOptions};
