//! Filter pipeline integration tests on the software device.

use image::{Rgba, Rgba32FImage};
use trackview_core::{FilterMode, Mat4, Mesh, MeshBuilder, UVec2, Vec3, Vec4};
use trackview_render::filters::greyscale;
use trackview_render::{
    DeviceCommand, FilterPipeline, Framebuffer, FullscreenQuad, PipelineSettings, RenderDevice,
    SoftwareDevice,
};

fn triangle_mesh() -> Mesh {
    let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 3);
    builder
        .push_vertices(&[Vec3::ZERO, Vec3::X, Vec3::Y], &[Vec3::Z; 3])
        .unwrap();
    builder.build().unwrap()
}

fn pipeline_with(width: u32, height: u32, mesh: &Mesh) -> FilterPipeline<SoftwareDevice> {
    FilterPipeline::new(
        SoftwareDevice::new(width, height),
        width,
        height,
        &PipelineSettings::default(),
        mesh,
        &FullscreenQuad::UNIT,
    )
    .unwrap()
}

/// A scene with enough structure for blur and greyscale to change it.
fn gradient_scene(width: u32, height: u32) -> Rgba32FImage {
    Rgba32FImage::from_fn(width, height, |x, y| {
        let checker = if (x / 4 + y / 4) % 2 == 0 { 1.0 } else { 0.2 };
        Rgba([
            x as f32 / width as f32,
            checker,
            y as f32 / height as f32,
            1.0,
        ])
    })
}

fn map_image(image: &Rgba32FImage, f: impl Fn(Vec4) -> Vec4) -> Rgba32FImage {
    Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        Rgba(f(Vec4::from_array(image.get_pixel(x, y).0)).to_array())
    })
}

/// Renders one frame of `scene` in `mode` and returns the screen.
fn render_scene(mode: FilterMode, scene: Rgba32FImage) -> Rgba32FImage {
    let mesh = triangle_mesh();
    let (width, height) = scene.dimensions();
    let mut pipeline = pipeline_with(width, height, &mesh);
    pipeline.set_filter_mode(mode).unwrap();
    pipeline.device_mut().set_scene_image(Some(scene));
    pipeline
        .render_frame(Mat4::IDENTITY, Mat4::IDENTITY, &mesh)
        .unwrap();
    pipeline.present().unwrap();
    pipeline.device().screen().clone()
}

fn max_difference(a: &Rgba32FImage, b: &Rgba32FImage) -> f32 {
    assert_eq!(a.dimensions(), b.dimensions());
    a.pixels()
        .zip(b.pixels())
        .flat_map(|(p, q)| p.0.into_iter().zip(q.0).map(|(u, v)| (u - v).abs()))
        .fold(0.0, f32::max)
}

#[test]
fn test_mode_switch_to_same_mode_is_a_no_op() {
    let mesh = triangle_mesh();
    let mut pipeline = pipeline_with(320, 240, &mesh);
    for mode in FilterMode::ALL {
        pipeline.set_filter_mode(mode).unwrap();
        let primary = pipeline.primary_target().attachments();
        let secondary = pipeline.secondary_target().attachments();
        pipeline.device_mut().clear_commands();

        assert!(!pipeline.set_filter_mode(mode).unwrap());
        assert_eq!(pipeline.primary_target().attachments(), primary);
        assert_eq!(pipeline.secondary_target().attachments(), secondary);
        assert!(pipeline.device().commands().is_empty());
    }
}

#[test]
fn test_secondary_target_follows_mode() {
    let mesh = triangle_mesh();
    let mut pipeline = pipeline_with(800, 600, &mesh);
    assert_eq!(pipeline.secondary_target().size(), UVec2::new(800, 600));

    assert!(pipeline.set_filter_mode(FilterMode::Blur).unwrap());
    assert_eq!(pipeline.secondary_target().size(), UVec2::new(50, 37));
    assert_eq!(pipeline.primary_target().size(), UVec2::new(800, 600));

    assert!(pipeline.set_filter_mode(FilterMode::Standard).unwrap());
    assert_eq!(pipeline.secondary_target().size(), UVec2::new(800, 600));

    let created = pipeline
        .device()
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::CreateTarget { .. }))
        .count();
    let destroyed = pipeline
        .device()
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::DestroyTarget { .. }))
        .count();
    // A and B at startup, then one B per switch.
    assert_eq!(created, 4);
    assert_eq!(destroyed, 2);
}

#[test]
fn test_scene_pass_draws_parts_in_tree_order() {
    let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
    let normals = [Vec3::Z; 3];
    let root_transform = Mat4::from_scale(Vec3::splat(0.5));
    let left = Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0));
    let leaf = Mat4::from_rotation_z(0.5);
    let right = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));

    let mut builder = MeshBuilder::new(root_transform, 0, 0);
    let first = builder.push_vertices(&positions, &normals).unwrap();
    let second = builder.push_vertices(&positions, &normals).unwrap();
    let root = builder.root();
    let left_id = builder.add_part(root, left, first, 3).unwrap();
    builder.add_part(left_id, leaf, second, 3).unwrap();
    builder.add_part(root, right, first, 3).unwrap();
    let mesh = builder.build().unwrap();

    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    let model = Mat4::from_scale(Vec3::splat(2.0));
    let mut pipeline = pipeline_with(64, 64, &mesh);
    pipeline.device_mut().clear_commands();
    pipeline.render_frame(view, model, &mesh).unwrap();

    let draws: Vec<(u32, Mat4, Mat4)> = pipeline
        .device()
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::DrawMesh {
                first,
                modelview,
                modelview_inverse,
                ..
            } => Some((*first, *modelview, *modelview_inverse)),
            _ => None,
        })
        .collect();

    // The root has an empty range and is not drawn.
    let base = view * model * root_transform;
    let expected = [
        (first, base * left),
        (second, base * left * leaf),
        (first, base * right),
    ];
    assert_eq!(draws.len(), expected.len());
    for ((first, modelview, inverse), (expected_first, expected_modelview)) in
        draws.iter().zip(expected)
    {
        assert_eq!(*first, expected_first);
        assert!(modelview.abs_diff_eq(expected_modelview, 1e-5));
        assert!((*modelview * *inverse).abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }
}

#[test]
fn test_combo_equals_blur_of_greyscale() {
    let scene = gradient_scene(64, 48);
    let combo = render_scene(FilterMode::ComboGreyscaleBlur, scene.clone());
    let blur_of_grey = render_scene(FilterMode::Blur, map_image(&scene, greyscale));
    let blur = render_scene(FilterMode::Blur, scene);

    assert!(max_difference(&combo, &blur_of_grey) < 1e-5);
    assert!(max_difference(&combo, &blur) > 1e-2);
}

#[test]
fn test_white_stays_white_through_greyscale() {
    let white = Rgba32FImage::from_pixel(32, 32, Rgba([1.0; 4]));
    let screen = render_scene(FilterMode::Greyscale, white.clone());
    assert!(max_difference(&screen, &white) < 1e-5);
}

#[test]
fn test_standard_mode_presents_the_scene() {
    let scene = gradient_scene(40, 30);
    let screen = render_scene(FilterMode::Standard, scene.clone());
    assert!(max_difference(&screen, &scene) < 1e-6);
}

#[test]
fn test_frame_ends_on_screen_with_depth_writes() {
    let mesh = triangle_mesh();
    let mut pipeline = pipeline_with(64, 64, &mesh);
    pipeline.set_filter_mode(FilterMode::ComboGreyscaleBlur).unwrap();
    for _ in 0..3 {
        pipeline
            .render_frame(Mat4::IDENTITY, Mat4::IDENTITY, &mesh)
            .unwrap();
        pipeline.present().unwrap();
    }
    let device = pipeline.device();
    assert_eq!(device.frames_presented(), 3);
    assert_eq!(device.bound_framebuffer(), Framebuffer::Screen);
    assert!(device.depth_write());
}
