//! CPU versions of the full-screen filter programs.
//!
//! These mirror the WGSL fragment stages in `shaders/` so the software
//! backend produces the same image a GPU would, up to sampling precision.

use glam::{Vec2, Vec3, Vec4};

use crate::shader::ProgramKind;

/// Rec. 601 luma weights used by the greyscale pass.
pub const LUMA_WEIGHTS: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// Center and one-sided weights of the 9-tap Gaussian used by both blur passes.
pub const BLUR_WEIGHTS: [f32; 5] = [0.227_027, 0.194_594_6, 0.121_621_6, 0.054_054, 0.016_216];

/// Replaces color with its luma, keeping alpha.
#[must_use]
pub fn greyscale(color: Vec4) -> Vec4 {
    let luma = color.truncate().dot(LUMA_WEIGHTS);
    Vec4::new(luma, luma, luma, color.w)
}

/// Gaussian blur along `step`, sampling through `sample`.
pub fn blur<F>(sample: F, uv: Vec2, step: Vec2) -> Vec4
where
    F: Fn(Vec2) -> Vec4,
{
    let mut color = sample(uv) * BLUR_WEIGHTS[0];
    for (i, weight) in BLUR_WEIGHTS.iter().enumerate().skip(1) {
        let offset = step * i as f32;
        color += sample(uv + offset) * *weight;
        color += sample(uv - offset) * *weight;
    }
    color
}

/// Runs one filter program's fragment stage at `uv`.
///
/// `dx` and `dy` are the program's blur step uniforms; programs that do not
/// declare them ignore the values. Returns `None` for programs that do not
/// draw the full-screen quad.
pub fn shade_fragment<F>(kind: ProgramKind, sample: F, uv: Vec2, dx: f32, dy: f32) -> Option<Vec4>
where
    F: Fn(Vec2) -> Vec4,
{
    match kind {
        ProgramKind::ModelShading => None,
        ProgramKind::Passthrough => Some(sample(uv)),
        ProgramKind::Greyscale => Some(greyscale(sample(uv))),
        ProgramKind::HorizontalBlur => Some(blur(sample, uv, Vec2::new(dx, 0.0))),
        ProgramKind::VerticalBlur => Some(blur(sample, uv, Vec2::new(0.0, dy))),
    }
}
