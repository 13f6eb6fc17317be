//! Ray picking and symmetry.
//!
//! A tick's input is a [`PickRequest`]: a world-space ray plus the brush
//! radius in screen pixels. [`pick`] intersects the ray with the mesh
//! (Möller–Trumbore over the candidate faces the spatial index returns) and
//! gathers the vertices inside the brush sphere into a [`PickingResult`].

use std::fmt;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use tracing::trace;

use crate::error::SculptError;
use crate::mesh::SurfaceMesh;
use crate::types::{FaceId, VertexId};

const EPSILON: f32 = 1e-6;

/// One pointer sample turned into a pick query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRequest {
    pub ray_origin: Vec3,
    pub ray_direction: Vec3,
    /// Brush radius in screen pixels
    pub screen_radius: f32,
    /// World units covered by one pixel at the picked depth
    pub world_per_pixel: f32,
}

impl PickRequest {
    pub fn new(ray_origin: Vec3, ray_direction: Vec3, screen_radius: f32, world_per_pixel: f32) -> Self {
        Self {
            ray_origin,
            ray_direction,
            screen_radius,
            world_per_pixel,
        }
    }

    pub fn with_screen_radius(mut self, screen_radius: f32) -> Self {
        self.screen_radius = screen_radius;
        self
    }

    pub fn world_radius(&self) -> f32 {
        self.screen_radius * self.world_per_pixel
    }

    /// Interpolated request between two samples (dab spacing).
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            ray_origin: self.ray_origin.lerp(other.ray_origin, t),
            ray_direction: self.ray_direction.lerp(other.ray_direction, t),
            screen_radius: self.screen_radius + (other.screen_radius - self.screen_radius) * t,
            world_per_pixel: self.world_per_pixel + (other.world_per_pixel - self.world_per_pixel) * t,
        }
    }
}

/// Brush alpha texture, sampled in brush-plane coordinates.
pub trait AlphaMask: fmt::Debug + Send + Sync {
    /// Weight in [0, 1] at `uv`, where the brush disc spans [-1, 1]².
    fn sample(&self, uv: Vec2) -> f32;
}

/// Result of intersecting one pick request with the mesh.
#[derive(Debug, Clone)]
pub struct PickingResult {
    /// Vertices inside the brush sphere, ascending
    pub picked_vertices: Vec<VertexId>,
    pub picked_face: FaceId,
    pub screen_radius: f32,
    pub local_radius_squared: f32,
    pub intersection_point: Vec3,
    pub picked_normal: Vec3,
    /// Unit view direction (from the eye into the scene)
    pub eye_direction: Vec3,
    alpha: Option<Arc<dyn AlphaMask>>,
    display_radius: Option<f32>,
}

impl PickingResult {
    /// Brush radius in world units.
    pub fn radius(&self) -> f32 {
        self.local_radius_squared.sqrt()
    }

    pub fn with_alpha(mut self, alpha: Option<Arc<dyn AlphaMask>>) -> Self {
        self.alpha = alpha;
        self
    }

    /// Alpha weight at `position`; 1.0 without an alpha mask.
    pub fn alpha(&self, position: Vec3) -> f32 {
        let Some(mask) = &self.alpha else {
            return 1.0;
        };
        let radius = self.radius();
        if radius <= 0.0 {
            return 0.0;
        }
        let (tangent, bitangent) = self.picked_normal.any_orthonormal_pair();
        let offset = position - self.intersection_point;
        let uv = Vec2::new(offset.dot(tangent), offset.dot(bitangent)) / radius;
        mask.sample(uv).clamp(0.0, 1.0)
    }

    /// Cursor radius to show instead of [`Self::screen_radius`] (lock-replay).
    pub fn display_radius(&self) -> f32 {
        self.display_radius.unwrap_or(self.screen_radius)
    }

    pub fn set_display_radius(&mut self, radius: f32) {
        self.display_radius = Some(radius);
    }
}

/// Ray/triangle hit: distance and barycentrics of `v1`, `v2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

/// Möller–Trumbore intersection; hits behind the origin are rejected.
pub fn ray_triangle_intersection(
    ray_origin: Vec3,
    ray_dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let pvec = ray_dir.cross(edge2);
    let det = edge1.dot(pvec);
    // Parallel to the triangle plane
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray_origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray_dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < EPSILON {
        return None;
    }

    Some(TriangleHit { t, u, v })
}

/// Closest face hit by a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub face: FaceId,
    pub point: Vec3,
    pub distance: f32,
}

/// Closest intersection of the ray with the committed geometry.
pub fn intersect_ray(
    mesh: &SurfaceMesh,
    origin: Vec3,
    direction: Vec3,
) -> Result<Option<RayHit>, SculptError> {
    let Some(direction) = direction.try_normalize() else {
        return Ok(None);
    };
    let positions = mesh.positions();
    let candidates = mesh.ray_candidate_faces(origin, direction)?;

    let mut best: Option<RayHit> = None;
    for &face_id in &candidates {
        let face = &mesh.faces()[face_id.index()];
        let Some(entry) = mesh.face_aabb(face_id).ray_entry(origin, direction) else {
            continue;
        };
        if best.is_some_and(|closest| entry > closest.distance) {
            continue;
        }
        for [a, b, c] in face.triangles() {
            let hit = ray_triangle_intersection(
                origin,
                direction,
                positions[a.index()],
                positions[b.index()],
                positions[c.index()],
            );
            if let Some(hit) = hit {
                if best.is_none_or(|closest| hit.t < closest.distance) {
                    best = Some(RayHit {
                        face: face_id,
                        point: origin + direction * hit.t,
                        distance: hit.t,
                    });
                }
            }
        }
    }
    trace!("ray: {} candidate faces of {}", candidates.len(), mesh.face_count());
    Ok(best)
}

/// Pick the brush footprint for `request`.
///
/// `Ok(None)` when the ray misses the mesh. Spatial-index ids outside the
/// mesh are a fatal precondition failure (see [`crate::SculptError`]).
pub fn pick(mesh: &SurfaceMesh, request: &PickRequest) -> Result<Option<PickingResult>, SculptError> {
    let Some(hit) = intersect_ray(mesh, request.ray_origin, request.ray_direction)? else {
        return Ok(None);
    };

    let radius = request.world_radius().max(0.0);
    let mut picked_vertices = mesh.query_radius(hit.point, radius)?;
    picked_vertices.sort_unstable();
    picked_vertices.dedup();

    let normals = mesh.normals();
    let normal_sum: Vec3 = picked_vertices.iter().map(|v| normals[v.index()]).sum();
    let picked_normal = normal_sum
        .try_normalize()
        .unwrap_or(mesh.face_normals()[hit.face.index()]);

    trace!(
        "pick: face {} at {:?}, {} vertices within {:.4}",
        hit.face.0,
        hit.point,
        picked_vertices.len(),
        radius
    );

    Ok(Some(PickingResult {
        picked_vertices,
        picked_face: hit.face,
        screen_radius: request.screen_radius,
        local_radius_squared: radius * radius,
        intersection_point: hit.point,
        picked_normal,
        eye_direction: request.ray_direction.normalize_or_zero(),
        alpha: None,
        display_radius: None,
    }))
}

/// Supplies the mirrored pick request for symmetric strokes.
pub trait SymmetryMirror: fmt::Debug {
    fn mirror(&self, request: &PickRequest) -> PickRequest;
}

/// Reflection through a plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneMirror {
    pub point: Vec3,
    /// Unit plane normal
    pub normal: Vec3,
}

impl PlaneMirror {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self {
            point,
            normal: normal.normalize_or(Vec3::X),
        }
    }

    /// Mirror across the `x = 0` plane.
    pub fn x_axis() -> Self {
        Self::new(Vec3::ZERO, Vec3::X)
    }

    pub fn reflect_point(&self, p: Vec3) -> Vec3 {
        p - 2.0 * (p - self.point).dot(self.normal) * self.normal
    }

    pub fn reflect_vector(&self, v: Vec3) -> Vec3 {
        v - 2.0 * v.dot(self.normal) * self.normal
    }
}

impl SymmetryMirror for PlaneMirror {
    fn mirror(&self, request: &PickRequest) -> PickRequest {
        PickRequest {
            ray_origin: self.reflect_point(request.ray_origin),
            ray_direction: self.reflect_vector(request.ray_direction),
            ..*request
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_support::grid_mesh;

    fn down_at(x: f32, y: f32, screen_radius: f32) -> PickRequest {
        PickRequest::new(Vec3::new(x, y, 10.0), Vec3::NEG_Z, screen_radius, 0.01)
    }

    #[derive(Debug)]
    struct HalfDisc;

    impl AlphaMask for HalfDisc {
        fn sample(&self, uv: Vec2) -> f32 {
            if uv.x >= 0.0 { 1.0 } else { 0.0 }
        }
    }

    #[test]
    fn test_ray_triangle_hit() {
        let hit = ray_triangle_intersection(
            Vec3::new(0.25, 0.25, 1.0),
            Vec3::NEG_Z,
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        )
        .unwrap();
        assert!((hit.t - 1.0).abs() < EPSILON);
        assert!((hit.u - 0.25).abs() < EPSILON);
        assert!((hit.v - 0.25).abs() < EPSILON);

        let behind = ray_triangle_intersection(Vec3::new(0.25, 0.25, -1.0), Vec3::NEG_Z, Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!(behind.is_none());
    }

    #[test]
    fn test_pick_collects_sphere() {
        let mesh = grid_mesh(4);
        // 110 px * 0.01 = 1.1 world units around (2.05, 2.05)
        let result = pick(&mesh, &down_at(2.05, 2.05, 110.0)).unwrap().unwrap();
        assert!((result.intersection_point - Vec3::new(2.05, 2.05, 0.0)).length() < 1e-5);
        assert!((result.radius() - 1.1).abs() < 1e-5);
        assert_eq!(result.picked_vertices.len(), 5);
        assert!(result.picked_vertices.windows(2).all(|w| w[0] < w[1]));
        assert!((result.picked_normal - Vec3::Z).length() < 1e-5);
        assert_eq!(result.eye_direction, Vec3::NEG_Z);
        assert_eq!(result.alpha(Vec3::ZERO), 1.0);
    }

    #[test]
    fn test_ray_tests_only_nearby_faces() {
        let mesh = grid_mesh(60);
        let origin = Vec3::new(30.5, 20.5, 10.0);
        let candidates = mesh.ray_candidate_faces(origin, Vec3::NEG_Z).unwrap();
        assert!(candidates.contains(&FaceId(20 * 60 + 30)));
        assert!(candidates.len() <= 16, "{} candidates", candidates.len());

        let hit = intersect_ray(&mesh, origin, Vec3::NEG_Z).unwrap().unwrap();
        assert_eq!(hit.face, FaceId(20 * 60 + 30));
        assert!((hit.point - Vec3::new(30.5, 20.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_ray_finds_stretched_face() {
        let mut mesh = grid_mesh(4);
        // drag one corner far out so its faces span several cells
        mesh.attributes_mut().positions[0] = Vec3::new(-6.0, -6.0, 0.0);
        mesh.update_geometry(&[FaceId(0)], &[VertexId(0)]);

        let hit = intersect_ray(&mesh, Vec3::new(-3.0, -2.9, 5.0), Vec3::NEG_Z)
            .unwrap()
            .unwrap();
        assert_eq!(hit.face, FaceId(0));
    }

    #[test]
    fn test_pick_miss() {
        let mesh = grid_mesh(2);
        assert!(pick(&mesh, &down_at(5.0, 5.0, 10.0)).unwrap().is_none());
    }

    #[test]
    fn test_alpha_mask_and_display_radius() {
        let mesh = grid_mesh(4);
        let mut result = pick(&mesh, &down_at(2.05, 2.05, 100.0))
            .unwrap()
            .unwrap()
            .with_alpha(Some(Arc::new(HalfDisc)));
        let (tangent, _) = result.picked_normal.any_orthonormal_pair();
        assert_eq!(result.alpha(result.intersection_point + tangent * 0.5), 1.0);
        assert_eq!(result.alpha(result.intersection_point - tangent * 0.5), 0.0);

        assert_eq!(result.display_radius(), 100.0);
        result.set_display_radius(40.0);
        assert_eq!(result.display_radius(), 40.0);
        assert_eq!(result.screen_radius, 100.0);
    }

    #[test]
    fn test_plane_mirror_reflects_ray() {
        let mirror = PlaneMirror::new(Vec3::new(2.0, 0.0, 0.0), Vec3::X);
        let request = PickRequest::new(Vec3::new(1.0, 1.0, 5.0), Vec3::new(0.6, 0.0, -0.8), 20.0, 0.01);
        let mirrored = mirror.mirror(&request);
        assert!((mirrored.ray_origin - Vec3::new(3.0, 1.0, 5.0)).length() < 1e-6);
        assert!((mirrored.ray_direction - Vec3::new(-0.6, 0.0, -0.8)).length() < 1e-6);
        assert_eq!(mirrored.screen_radius, 20.0);
    }
}
