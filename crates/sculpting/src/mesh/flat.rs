//! Flat-shading render buffers.
//!
//! One render vertex per display-triangle corner, all three carrying the
//! face normal. Triangle `t` owns entries `3t..3t+3`; the index buffer is
//! the identity.

use glam::Vec3;

use crate::types::{Face, FaceId, Material};

#[derive(Debug, Clone, Default)]
pub struct FlatShading {
    pub(crate) positions: Vec<Vec3>,
    pub(crate) normals: Vec<Vec3>,
    pub(crate) colors: Vec<Vec3>,
    pub(crate) materials: Vec<Material>,
    pub(crate) indices: Vec<u32>,
}

/// Borrowed per-vertex attributes that flat buffers are derived from.
pub(crate) struct FlatSource<'a> {
    pub faces: &'a [Face],
    pub face_normals: &'a [Vec3],
    pub triangle_offsets: &'a [u32],
    pub positions: &'a [Vec3],
    pub colors: &'a [Vec3],
    pub materials: &'a [Material],
}

impl FlatShading {
    pub fn new(triangle_count: usize) -> Self {
        let corners = triangle_count * 3;
        Self {
            positions: vec![Vec3::ZERO; corners],
            normals: vec![Vec3::ZERO; corners],
            colors: vec![Vec3::ONE; corners],
            materials: vec![Material::default(); corners],
            indices: (0..corners as u32).collect(),
        }
    }

    /// Number of render vertices.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub(crate) fn update_faces(&mut self, source: &FlatSource<'_>, faces: &[FaceId]) {
        for &face_id in faces {
            let face = &source.faces[face_id.index()];
            let normal = source.face_normals[face_id.index()];
            let first = source.triangle_offsets[face_id.index()] as usize;
            for (t, tri) in face.triangles().enumerate() {
                let base = (first + t) * 3;
                for (corner, vertex) in tri.iter().enumerate() {
                    let slot = base + corner;
                    self.positions[slot] = source.positions[vertex.index()];
                    self.normals[slot] = normal;
                    self.colors[slot] = source.colors[vertex.index()];
                    self.materials[slot] = source.materials[vertex.index()];
                }
            }
        }
    }

    pub(crate) fn update_all(&mut self, source: &FlatSource<'_>) {
        let all: Vec<FaceId> = (0..source.faces.len() as u32).map(FaceId).collect();
        self.update_faces(source, &all);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_expands_to_six_corners() {
        let faces = vec![Face::quad(0, 1, 2, 3)];
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y];
        let colors = vec![Vec3::ONE; 4];
        let materials = vec![Material::default(); 4];
        let source = FlatSource {
            faces: &faces,
            face_normals: &[Vec3::Z],
            triangle_offsets: &[0],
            positions: &positions,
            colors: &colors,
            materials: &materials,
        };

        let mut flat = FlatShading::new(2);
        flat.update_all(&source);
        assert_eq!(flat.len(), 6);
        assert_eq!(flat.indices, vec![0, 1, 2, 3, 4, 5]);
        // second triangle is a, c, d
        assert_eq!(flat.positions[3], Vec3::ZERO);
        assert_eq!(flat.positions[4], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(flat.positions[5], Vec3::Y);
        assert!(flat.normals.iter().all(|n| *n == Vec3::Z));
    }
}
