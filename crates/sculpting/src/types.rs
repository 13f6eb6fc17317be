//! Core sculpting types.
//!
//! Identifiers are plain indices into the mesh arrays wrapped in newtypes,
//! and the per-vertex material is laid out for direct GPU upload.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Type-safe vertex identifier (index into the mesh vertex arrays)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub u32);

impl VertexId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type-safe face identifier (index into the mesh face array)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl FaceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-vertex material triple.
///
/// `mask` is the sculpt/paint mask weight: 0.0 fully protects the vertex,
/// 1.0 leaves it fully editable.
#[derive(
    Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable,
)]
#[repr(C)]
pub struct Material {
    pub roughness: f32,
    pub metallic: f32,
    pub mask: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            roughness: 0.18,
            metallic: 0.08,
            mask: 1.0,
        }
    }
}

impl Material {
    pub fn new(roughness: f32, metallic: f32, mask: f32) -> Self {
        Self {
            roughness,
            metallic,
            mask,
        }
    }
}

/// A triangle or quad. Quads are split along `a-c` for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub corners: [VertexId; 3],
    /// Fourth corner, present for quads only
    pub fourth: Option<VertexId>,
}

impl Face {
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self {
            corners: [VertexId(a), VertexId(b), VertexId(c)],
            fourth: None,
        }
    }

    pub fn quad(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self {
            corners: [VertexId(a), VertexId(b), VertexId(c)],
            fourth: Some(VertexId(d)),
        }
    }

    pub fn is_quad(&self) -> bool {
        self.fourth.is_some()
    }

    /// All corners in winding order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.corners.iter().copied().chain(self.fourth)
    }

    /// Number of display triangles this face expands to (1 or 2).
    pub fn triangle_count(&self) -> usize {
        if self.is_quad() { 2 } else { 1 }
    }

    /// Display triangles: `abc`, then `acd` for quads.
    pub fn triangles(&self) -> impl Iterator<Item = [VertexId; 3]> + '_ {
        let [a, b, c] = self.corners;
        std::iter::once([a, b, c]).chain(self.fourth.map(|d| [a, c, d]))
    }
}

/// Which half of a symmetric stroke a call handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Primary = 0,
    Mirrored = 1,
}

impl Side {
    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Linear blend used by the paint kernels: `old * (1 - t) + target * t`.
#[inline]
pub fn blend(old: f32, target: f32, t: f32) -> f32 {
    old * (1.0 - t) + target * t
}

/// Vector form of [`blend`].
#[inline]
pub fn blend_vec3(old: Vec3, target: Vec3, t: f32) -> Vec3 {
    old * (1.0 - t) + target * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_triangulation() {
        let quad = Face::quad(0, 1, 2, 3);
        let tris: Vec<_> = quad.triangles().collect();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0], [VertexId(0), VertexId(1), VertexId(2)]);
        assert_eq!(tris[1], [VertexId(0), VertexId(2), VertexId(3)]);
        assert_eq!(quad.vertices().count(), 4);

        let tri = Face::triangle(4, 5, 6);
        assert_eq!(tri.triangle_count(), 1);
        assert_eq!(tri.vertices().count(), 3);
    }

    #[test]
    fn test_material_is_gpu_layout() {
        assert_eq!(std::mem::size_of::<Material>(), 12);
        let materials = [Material::default(); 2];
        let bytes: &[u8] = bytemuck::cast_slice(&materials);
        assert_eq!(bytes.len(), 24);
    }

    #[test]
    fn test_blend_endpoints() {
        assert_eq!(blend(0.2, 0.8, 0.0), 0.2);
        assert!((blend(0.2, 0.8, 1.0) - 0.8).abs() < 1e-6);
        assert_eq!(blend_vec3(Vec3::ZERO, Vec3::ONE, 0.5), Vec3::splat(0.5));
    }
}
