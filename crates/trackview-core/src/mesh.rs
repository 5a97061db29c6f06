//! Hierarchical mesh stored as an arena of parts.
//!
//! Parts address their children by [`PartId`] rather than owning them, so the
//! tree can be walked without recursion and shared read-only without lifetime
//! plumbing. Parts are only added through [`MeshBuilder`], and a part can only
//! be attached below an existing one, which keeps the arena a tree.

use glam::{Mat4, Vec3};

use crate::error::{CoreError, Result};

/// Index of a part inside its [`Mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(usize);

impl PartId {
    /// Returns the arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of the mesh hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    /// Transform relative to the parent part.
    pub transform: Mat4,
    /// First vertex of this part's draw range.
    pub first: u32,
    /// Number of vertices in the draw range (0 for pure grouping nodes).
    pub count: u32,
    /// Children in draw order.
    pub children: Vec<PartId>,
}

impl MeshPart {
    fn new(transform: Mat4, first: u32, count: u32) -> Self {
        Self {
            transform,
            first,
            count,
            children: Vec::new(),
        }
    }
}

/// A loaded mesh: flattened triangle-list vertex data plus the part tree.
#[derive(Debug, Clone)]
pub struct Mesh {
    parts: Vec<MeshPart>,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
}

impl Mesh {
    /// Returns the root part's id.
    #[must_use]
    pub fn root(&self) -> PartId {
        PartId(0)
    }

    /// Returns a part by id.
    #[must_use]
    pub fn part(&self, id: PartId) -> Option<&MeshPart> {
        self.parts.get(id.0)
    }

    /// Returns the number of parts, including the root.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Vertex positions, three per triangle.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Vertex normals, parallel to [`Mesh::positions`].
    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Axis-aligned bounds of all vertex positions, or `None` if empty.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Walks the hierarchy depth-first, parents before children.
    ///
    /// `visit` receives each part with its world transform, the product of
    /// `parent_transform` and every local transform from the root down to the
    /// part. Siblings are visited in list order.
    pub fn walk<F>(&self, parent_transform: Mat4, mut visit: F)
    where
        F: FnMut(PartId, &MeshPart, Mat4),
    {
        let mut stack = vec![(self.root(), parent_transform)];
        while let Some((id, parent)) = stack.pop() {
            let part = &self.parts[id.0];
            let world = parent * part.transform;
            visit(id, part, world);
            // Reversed so the first child is popped first.
            for &child in part.children.iter().rev() {
                stack.push((child, world));
            }
        }
    }
}

/// Incremental constructor for [`Mesh`].
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    parts: Vec<MeshPart>,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
}

impl MeshBuilder {
    /// Starts a mesh whose root part has the given transform and draw range.
    #[must_use]
    pub fn new(root_transform: Mat4, first: u32, count: u32) -> Self {
        Self {
            parts: vec![MeshPart::new(root_transform, first, count)],
            positions: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Returns the root part's id.
    #[must_use]
    pub fn root(&self) -> PartId {
        PartId(0)
    }

    /// Appends vertex data and returns the index of its first vertex.
    pub fn push_vertices(&mut self, positions: &[Vec3], normals: &[Vec3]) -> Result<u32> {
        if positions.len() != normals.len() {
            return Err(CoreError::SizeMismatch {
                expected: positions.len(),
                actual: normals.len(),
            });
        }
        let first = self.positions.len() as u32;
        self.positions.extend_from_slice(positions);
        self.normals.extend_from_slice(normals);
        Ok(first)
    }

    /// Attaches a new part as the last child of `parent`.
    pub fn add_part(
        &mut self,
        parent: PartId,
        transform: Mat4,
        first: u32,
        count: u32,
    ) -> Result<PartId> {
        if parent.0 >= self.parts.len() {
            return Err(CoreError::PartNotFound(parent.0));
        }
        let id = PartId(self.parts.len());
        self.parts.push(MeshPart::new(transform, first, count));
        self.parts[parent.0].children.push(id);
        Ok(id)
    }

    /// Replaces the transform of an existing part.
    pub fn set_transform(&mut self, id: PartId, transform: Mat4) -> Result<()> {
        let part = self
            .parts
            .get_mut(id.0)
            .ok_or(CoreError::PartNotFound(id.0))?;
        part.transform = transform;
        Ok(())
    }

    /// Current bounds of the pushed positions.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Finishes the mesh, checking every draw range against the vertex data.
    pub fn build(self) -> Result<Mesh> {
        let len = self.positions.len();
        for part in &self.parts {
            let end = u64::from(part.first) + u64::from(part.count);
            if part.count > 0 && end > len as u64 {
                return Err(CoreError::DrawRangeOutOfBounds {
                    first: part.first,
                    end,
                    len,
                });
            }
        }
        Ok(Mesh {
            parts: self.parts,
            positions: self.positions,
            normals: self.normals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> ([Vec3; 3], [Vec3; 3]) {
        (
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            [Vec3::Z, Vec3::Z, Vec3::Z],
        )
    }

    #[test]
    fn test_walk_visits_parents_first_in_list_order() {
        let (p, n) = triangle();
        let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 0);
        builder.push_vertices(&p, &n).unwrap();
        let root = builder.root();
        let a = builder.add_part(root, Mat4::IDENTITY, 0, 3).unwrap();
        let b = builder.add_part(root, Mat4::IDENTITY, 0, 3).unwrap();
        let a1 = builder.add_part(a, Mat4::IDENTITY, 0, 3).unwrap();
        let mesh = builder.build().unwrap();

        let mut order = Vec::new();
        mesh.walk(Mat4::IDENTITY, |id, _, _| order.push(id));
        assert_eq!(order, vec![root, a, a1, b]);
    }

    #[test]
    fn test_walk_accumulates_transforms_root_to_leaf() {
        let t_root = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let t_child = Mat4::from_scale(Vec3::splat(2.0));
        let t_leaf = Mat4::from_rotation_z(0.5);
        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));

        let mut builder = MeshBuilder::new(t_root, 0, 0);
        let child = builder.add_part(builder.root(), t_child, 0, 0).unwrap();
        let leaf = builder.add_part(child, t_leaf, 0, 0).unwrap();
        let mesh = builder.build().unwrap();

        let mut worlds = Vec::new();
        mesh.walk(model, |id, _, world| worlds.push((id, world)));
        assert_eq!(worlds[0], (mesh.root(), model * t_root));
        assert_eq!(worlds[1], (child, model * t_root * t_child));
        assert_eq!(worlds[2], (leaf, model * t_root * t_child * t_leaf));
    }

    #[test]
    fn test_add_part_rejects_unknown_parent() {
        let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 0);
        let result = builder.add_part(PartId(7), Mat4::IDENTITY, 0, 0);
        assert!(matches!(result, Err(CoreError::PartNotFound(7))));
    }

    #[test]
    fn test_build_rejects_range_past_end() {
        let (p, n) = triangle();
        let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 0);
        builder.push_vertices(&p, &n).unwrap();
        builder.add_part(builder.root(), Mat4::IDENTITY, 1, 3).unwrap();
        assert!(matches!(
            builder.build(),
            Err(CoreError::DrawRangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_push_vertices_size_mismatch() {
        let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 0);
        let result = builder.push_vertices(&[Vec3::ZERO, Vec3::X], &[Vec3::Z]);
        assert!(matches!(result, Err(CoreError::SizeMismatch { .. })));
    }

    #[test]
    fn test_bounds() {
        let mut builder = MeshBuilder::new(Mat4::IDENTITY, 0, 0);
        assert!(builder.bounds().is_none());
        builder
            .push_vertices(
                &[Vec3::new(-1.0, 2.0, 0.5), Vec3::new(3.0, -2.0, 0.0)],
                &[Vec3::Z, Vec3::Z],
            )
            .unwrap();
        let mesh = builder.build().unwrap();
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(max, Vec3::new(3.0, 2.0, 0.5));
    }
}
