//! OBJ mesh loading.
//!
//! Every OBJ object becomes one child part of the root with a contiguous draw
//! range over flattened, non-indexed triangles. The root part centers the
//! model on the origin and scales its largest side to 1.

use std::path::Path;

use glam::{Mat4, Vec3};
use trackview_core::{CoreError, Mesh, MeshBuilder};

use crate::error::{Result, ViewerError};

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

/// Loads an OBJ file into a mesh hierarchy.
pub fn load_mesh(path: &Path) -> Result<Mesh> {
    log::info!("loading mesh {}", path.display());
    let (models, _materials) =
        tobj::load_obj(path, &load_options()).map_err(|source| ViewerError::MeshLoad {
            path: path.to_path_buf(),
            source,
        })?;
    let mesh = mesh_from_models(&models)?;
    log::info!(
        "loaded {} vertices in {} parts",
        mesh.positions().len(),
        mesh.part_count()
    );
    Ok(mesh)
}

/// Flattens parsed OBJ models into a mesh.
///
/// Normals are taken from the file when every vertex has one and computed per
/// face otherwise.
pub fn mesh_from_models(models: &[tobj::Model]) -> std::result::Result<Mesh, CoreError> {
    let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 0);
    let root = builder.root();

    for model in models {
        let (positions, normals) = flatten(&model.mesh);
        if positions.is_empty() {
            log::debug!("skipping empty object '{}'", model.name);
            continue;
        }
        let first = builder.push_vertices(&positions, &normals)?;
        builder.add_part(root, Mat4::IDENTITY, first, positions.len() as u32)?;
        log::debug!("object '{}': {} vertices", model.name, positions.len());
    }

    let (min, max) = builder.bounds().ok_or(CoreError::EmptyMesh)?;
    builder.set_transform(root, normalizing_transform(min, max))?;
    builder.build()
}

/// Expands indexed triangles into one position and normal per corner.
fn flatten(mesh: &tobj::Mesh) -> (Vec<Vec3>, Vec<Vec3>) {
    let vertex = |data: &[f32], index: u32| {
        let i = index as usize * 3;
        Vec3::new(data[i], data[i + 1], data[i + 2])
    };
    let has_normals = !mesh.normals.is_empty() && mesh.normals.len() == mesh.positions.len();

    let mut positions = Vec::with_capacity(mesh.indices.len());
    let mut normals = Vec::with_capacity(mesh.indices.len());
    for triangle in mesh.indices.chunks_exact(3) {
        let corners = [
            vertex(&mesh.positions, triangle[0]),
            vertex(&mesh.positions, triangle[1]),
            vertex(&mesh.positions, triangle[2]),
        ];
        positions.extend_from_slice(&corners);

        if has_normals {
            normals.extend(triangle.iter().map(|&i| vertex(&mesh.normals, i)));
        } else {
            let face = (corners[1] - corners[0])
                .cross(corners[2] - corners[0])
                .try_normalize()
                .unwrap_or(Vec3::Z);
            normals.extend_from_slice(&[face; 3]);
        }
    }
    (positions, normals)
}

/// Centers the bounds on the origin and scales the largest side to 1.
fn normalizing_transform(min: Vec3, max: Vec3) -> Mat4 {
    let center = (min + max) * 0.5;
    let extent = (max - min).max_element();
    let scale = if extent > 0.0 { 1.0 / extent } else { 1.0 };
    Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-center)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<tobj::Model> {
        let mut reader = std::io::BufReader::new(text.as_bytes());
        let (models, _) = tobj::load_obj_buf(&mut reader, &load_options(), |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })
        .unwrap();
        models
    }

    const TWO_OBJECTS: &str = "\
o first
v 0 0 0
v 2 0 0
v 0 2 0
v 0 0 2
f 1 2 3
f 1 3 4
o second
v 4 0 0
v 4 2 0
v 4 0 2
f 5 6 7
";

    #[test]
    fn test_objects_become_child_parts() {
        let mesh = mesh_from_models(&parse(TWO_OBJECTS)).unwrap();
        assert_eq!(mesh.positions().len(), 9);
        assert_eq!(mesh.normals().len(), 9);
        assert_eq!(mesh.part_count(), 3);

        let root = mesh.part(mesh.root()).unwrap();
        assert_eq!(root.count, 0);
        let ranges: Vec<(u32, u32)> = root
            .children
            .iter()
            .map(|&id| {
                let part = mesh.part(id).unwrap();
                (part.first, part.count)
            })
            .collect();
        assert_eq!(ranges, vec![(0, 6), (6, 3)]);
    }

    #[test]
    fn test_face_normals_when_missing() {
        let mesh = mesh_from_models(&parse(TWO_OBJECTS)).unwrap();
        // First face lies in z = 0 with counter-clockwise winding.
        for normal in &mesh.normals()[0..3] {
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-6));
        }
        for normal in mesh.normals() {
            assert!((normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_file_normals_are_kept() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 1 0
f 1//1 2//1 3//1
";
        let mesh = mesh_from_models(&parse(text)).unwrap();
        for normal in mesh.normals() {
            assert!(normal.abs_diff_eq(Vec3::Y, 1e-6));
        }
    }

    #[test]
    fn test_root_normalizes_bounds() {
        let mesh = mesh_from_models(&parse(TWO_OBJECTS)).unwrap();
        let root = mesh.part(mesh.root()).unwrap();
        let (min, max) = mesh.bounds().unwrap();
        let min = root.transform.transform_point3(min);
        let max = root.transform.transform_point3(max);
        assert!(min.abs_diff_eq(Vec3::new(-0.5, -0.25, -0.25), 1e-6));
        assert!(max.abs_diff_eq(Vec3::new(0.5, 0.25, 0.25), 1e-6));
    }

    #[test]
    fn test_empty_obj_is_an_error() {
        let err = mesh_from_models(&parse("# nothing here\n")).unwrap_err();
        assert!(matches!(err, CoreError::EmptyMesh));
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = load_mesh(Path::new("does/not/exist.obj")).unwrap_err();
        assert!(matches!(err, ViewerError::MeshLoad { .. }));
    }
}
