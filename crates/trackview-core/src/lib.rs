//! Core abstractions for trackview.
//!
//! This crate holds everything that does not touch the GPU:
//! - [`Trackball`] arcball rotation driven by pointer drags
//! - [`Mesh`] hierarchy stored as an arena of [`MeshPart`]s
//! - [`FilterMode`] and the ordered [`FilterStage`]s it runs
//! - [`ViewerOptions`] startup configuration

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pixel sizes are converted to f32 for normalization
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod error;
pub mod filter;
pub mod mesh;
pub mod options;
pub mod trackball;

pub use error::{CoreError, Result};
pub use filter::{FilterMode, FilterStage};
pub use mesh::{Mesh, MeshBuilder, MeshPart, PartId};
pub use options::{ViewerOptions, DEFAULT_DOWNSCALE_LEVEL};
pub use trackball::Trackball;

// Re-export glam types for convenience
pub use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};
