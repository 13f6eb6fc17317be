//! Spatial indexing for brush picking.
//!
//! The stroke pipeline only needs two things from a spatial index: "which
//! vertices lie inside this sphere" and "these faces moved, catch up". The
//! [`SpatialIndex`] trait captures that contract; [`VertexOctree`] is the
//! default implementation.

use std::fmt;

use glam::Vec3;
use sculpt_config::OctreeConfig;
use tracing::trace;

use crate::types::{Face, FaceId, VertexId};

/// Radius queries over the committed geometry.
///
/// `refresh` must be called after every geometry mutation before the next
/// pick; ids returned by `query_radius` must be valid vertex ids of the mesh.
pub trait SpatialIndex: fmt::Debug {
    /// Rebuild from scratch for the given positions.
    fn rebuild(&mut self, positions: &[Vec3]);

    /// All vertices within `radius` of `center`.
    fn query_radius(&self, center: Vec3, radius: f32) -> Vec<VertexId>;

    /// All vertices within `margin` of the ray starting at `origin`.
    ///
    /// `direction` must be unit length.
    fn query_ray(&self, origin: Vec3, direction: Vec3, margin: f32) -> Vec<VertexId>;

    /// Bring the vertices of `touched` faces up to date with `positions`.
    fn refresh(&mut self, positions: &[Vec3], faces: &[Face], touched: &[FaceId]);
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.include_point(point);
        }
        aabb
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// The box grown by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(self.min - Vec3::splat(margin), self.max + Vec3::splat(margin))
    }

    /// Conservative ray test against the bounding sphere of the box.
    ///
    /// Returns a lower bound of the distance at which the ray can first touch
    /// the box. `direction` must be unit length.
    pub fn ray_entry(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let center = self.center();
        let radius = self.size().length() * 0.5 + 1e-5;
        let along = (center - origin).dot(direction);
        let closest = origin + direction * along.max(0.0);
        if closest.distance_squared(center) > radius * radius {
            return None;
        }
        Some((along - radius).max(0.0))
    }

    /// Get the octant index for a point (0-7).
    fn octant_for_point(&self, point: Vec3) -> usize {
        let center = self.center();
        let mut index = 0;
        if point.x >= center.x {
            index |= 1;
        }
        if point.y >= center.y {
            index |= 2;
        }
        if point.z >= center.z {
            index |= 4;
        }
        index
    }

    /// Get the bounds for a specific octant.
    fn octant_bounds(&self, octant: usize) -> Aabb {
        let center = self.center();
        let min = Vec3::new(
            if octant & 1 != 0 { center.x } else { self.min.x },
            if octant & 2 != 0 { center.y } else { self.min.y },
            if octant & 4 != 0 { center.z } else { self.min.z },
        );
        let max = Vec3::new(
            if octant & 1 != 0 { self.max.x } else { center.x },
            if octant & 2 != 0 { self.max.y } else { center.y },
            if octant & 4 != 0 { self.max.z } else { center.z },
        );
        Aabb::new(min, max)
    }
}

/// An item stored in the octree: vertex ID and position.
#[derive(Debug, Clone, Copy)]
struct OctreeItem {
    vertex_id: VertexId,
    position: Vec3,
}

/// A node in the octree (either internal or leaf).
#[derive(Debug)]
enum OctreeNode {
    Leaf {
        bounds: Aabb,
        items: Vec<OctreeItem>,
    },
    Internal {
        bounds: Aabb,
        children: Box<[Option<OctreeNode>; 8]>,
    },
}

/// Vertex octree used as the default [`SpatialIndex`].
///
/// Remembers the position each vertex was inserted at so a refresh can
/// remove it from its old leaf. A vertex that leaves the root bounds forces
/// a full rebuild.
#[derive(Debug)]
pub struct VertexOctree {
    root: OctreeNode,
    config: OctreeConfig,
    indexed_positions: Vec<Vec3>,
}

impl Default for VertexOctree {
    fn default() -> Self {
        Self::with_config(OctreeConfig::default())
    }
}

impl VertexOctree {
    pub fn with_config(config: OctreeConfig) -> Self {
        Self {
            root: OctreeNode::Leaf {
                bounds: Aabb::new(Vec3::ZERO, Vec3::ZERO),
                items: Vec::new(),
            },
            config,
            indexed_positions: Vec::new(),
        }
    }

    /// Build an octree from vertex positions.
    pub fn from_positions(positions: &[Vec3], config: OctreeConfig) -> Self {
        let mut octree = Self::with_config(config);
        octree.rebuild(positions);
        octree
    }

    fn bounds(&self) -> Aabb {
        match &self.root {
            OctreeNode::Leaf { bounds, .. } | OctreeNode::Internal { bounds, .. } => *bounds,
        }
    }

    fn insert(&mut self, vertex_id: VertexId, position: Vec3) {
        Self::insert_into_node(&mut self.root, vertex_id, position, 0, &self.config);
    }

    fn insert_into_node(
        node: &mut OctreeNode,
        vertex_id: VertexId,
        position: Vec3,
        depth: u32,
        config: &OctreeConfig,
    ) {
        match node {
            OctreeNode::Leaf { bounds, items } => {
                items.push(OctreeItem { vertex_id, position });

                if items.len() > config.max_items_per_leaf
                    && depth < config.max_depth
                    && bounds.size().min_element() > config.min_node_size * 2.0
                {
                    let old_items = std::mem::take(items);
                    let old_bounds = *bounds;

                    *node = OctreeNode::Internal {
                        bounds: old_bounds,
                        children: Box::new([None, None, None, None, None, None, None, None]),
                    };

                    for item in old_items {
                        Self::insert_into_node(node, item.vertex_id, item.position, depth, config);
                    }
                }
            }
            OctreeNode::Internal { bounds, children } => {
                let octant = bounds.octant_for_point(position);
                let child = children[octant].get_or_insert_with(|| OctreeNode::Leaf {
                    bounds: bounds.octant_bounds(octant),
                    items: Vec::new(),
                });
                Self::insert_into_node(child, vertex_id, position, depth + 1, config);
            }
        }
    }

    fn query_sphere_node(
        node: &OctreeNode,
        center: Vec3,
        radius: f32,
        results: &mut Vec<VertexId>,
    ) {
        match node {
            OctreeNode::Leaf { bounds, items } => {
                if !bounds.intersects_sphere(center, radius) {
                    return;
                }

                let radius_sq = radius * radius;
                for item in items {
                    if item.position.distance_squared(center) <= radius_sq {
                        results.push(item.vertex_id);
                    }
                }
            }
            OctreeNode::Internal { bounds, children } => {
                if !bounds.intersects_sphere(center, radius) {
                    return;
                }

                for child in children.iter().flatten() {
                    Self::query_sphere_node(child, center, radius, results);
                }
            }
        }
    }

    fn query_ray_node(
        node: &OctreeNode,
        origin: Vec3,
        direction: Vec3,
        margin: f32,
        results: &mut Vec<VertexId>,
    ) {
        match node {
            OctreeNode::Leaf { bounds, items } => {
                if bounds.expanded(margin).ray_entry(origin, direction).is_none() {
                    return;
                }

                let margin_sq = margin * margin;
                for item in items {
                    let along = (item.position - origin).dot(direction).max(0.0);
                    let closest = origin + direction * along;
                    if item.position.distance_squared(closest) <= margin_sq {
                        results.push(item.vertex_id);
                    }
                }
            }
            OctreeNode::Internal { bounds, children } => {
                if bounds.expanded(margin).ray_entry(origin, direction).is_none() {
                    return;
                }

                for child in children.iter().flatten() {
                    Self::query_ray_node(child, origin, direction, margin, results);
                }
            }
        }
    }

    fn remove(&mut self, vertex_id: VertexId, position: Vec3) -> bool {
        Self::remove_from_node(&mut self.root, vertex_id, position)
    }

    fn remove_from_node(node: &mut OctreeNode, vertex_id: VertexId, position: Vec3) -> bool {
        match node {
            OctreeNode::Leaf { bounds, items } => {
                if !bounds.contains_point(position) {
                    return false;
                }

                if let Some(idx) = items.iter().position(|item| item.vertex_id == vertex_id) {
                    items.swap_remove(idx);
                    return true;
                }
                false
            }
            OctreeNode::Internal { bounds, children } => {
                if !bounds.contains_point(position) {
                    return false;
                }

                let octant = bounds.octant_for_point(position);
                match &mut children[octant] {
                    Some(child) => Self::remove_from_node(child, vertex_id, position),
                    None => false,
                }
            }
        }
    }

    /// Get the total number of items in the octree.
    pub fn len(&self) -> usize {
        Self::count_items(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count_items(node: &OctreeNode) -> usize {
        match node {
            OctreeNode::Leaf { items, .. } => items.len(),
            OctreeNode::Internal { children, .. } => {
                children.iter().flatten().map(Self::count_items).sum()
            }
        }
    }
}

impl SpatialIndex for VertexOctree {
    fn rebuild(&mut self, positions: &[Vec3]) {
        let mut bounds = Aabb::from_points(positions.iter().copied());
        if positions.is_empty() {
            bounds = Aabb::new(Vec3::ZERO, Vec3::ZERO);
        }
        // Cubic root so flat meshes still subdivide, padded so vertices
        // nudged by a stroke usually stay inside
        let half = bounds.size().max_element() * 0.6 + 0.001;
        let center = bounds.center();
        let bounds = Aabb::new(center - Vec3::splat(half), center + Vec3::splat(half));

        self.root = OctreeNode::Leaf {
            bounds,
            items: Vec::with_capacity(positions.len().min(self.config.max_items_per_leaf + 1)),
        };
        self.indexed_positions = positions.to_vec();
        for (index, &position) in positions.iter().enumerate() {
            self.insert(VertexId(index as u32), position);
        }
    }

    fn query_radius(&self, center: Vec3, radius: f32) -> Vec<VertexId> {
        let mut results = Vec::new();
        Self::query_sphere_node(&self.root, center, radius, &mut results);
        results
    }

    fn query_ray(&self, origin: Vec3, direction: Vec3, margin: f32) -> Vec<VertexId> {
        let mut results = Vec::new();
        Self::query_ray_node(&self.root, origin, direction, margin, &mut results);
        results
    }

    fn refresh(&mut self, positions: &[Vec3], faces: &[Face], touched: &[FaceId]) {
        if positions.len() != self.indexed_positions.len() {
            self.rebuild(positions);
            return;
        }

        let bounds = self.bounds();
        let mut moved = 0usize;
        for face_id in touched {
            for vertex in faces[face_id.index()].vertices() {
                let old = self.indexed_positions[vertex.index()];
                let new = positions[vertex.index()];
                if old == new {
                    continue;
                }
                if !bounds.contains_point(new) {
                    trace!("octree: vertex {} left the root bounds, rebuilding", vertex.0);
                    self.rebuild(positions);
                    return;
                }
                self.remove(vertex, old);
                self.insert(vertex, new);
                self.indexed_positions[vertex.index()] = new;
                moved += 1;
            }
        }
        trace!("octree: refreshed {} vertices over {} faces", moved, touched.len());
    }
}
