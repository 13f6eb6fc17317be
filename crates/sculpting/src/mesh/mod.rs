//! The editable surface.
//!
//! [`SurfaceMesh`] owns vertex attributes and face connectivity together with
//! everything derived from them: face normals and bounds, vertex normals, the
//! spatial index, seam duplicates, flat-shading buffers, and the touched-face
//! history that drives partial display uploads.
//!
//! It also owns the stroke proxy: a snapshot of positions, colors and
//! materials taken the first time a vertex is touched during a stroke. Tools
//! read the proxy as a falloff reference and restore from it on lock-replay.

mod flat;
mod local_edit;
mod seams;
mod tags;

pub use flat::FlatShading;
pub use local_edit::{FallbackReason, LocalEditBuffers, LocalEditOutcome};
pub use seams::SeamDuplicates;
pub use tags::TagStamps;

use glam::Vec3;
use tracing::{debug, trace};

use crate::error::{check_len, check_vertex_ids, SculptError};
use crate::spatial::{Aabb, SpatialIndex, VertexOctree};
use crate::types::{Face, FaceId, Material, VertexId};
use flat::FlatSource;
use local_edit::LocalEditState;

/// Which positions a kernel measures falloff against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FalloffReference {
    /// The current, possibly already edited, surface
    Live,
    /// The snapshot taken when the vertex was first touched this stroke
    Proxy,
}

/// Full attribute state of one vertex, as captured by an undo log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexState {
    pub position: Vec3,
    pub color: Vec3,
    pub material: Material,
}

/// Plane used by clay-mode flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaPlane {
    pub center: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, Default)]
struct ProxySnapshot {
    positions: Vec<Vec3>,
    colors: Vec<Vec3>,
    materials: Vec<Material>,
    captured: TagStamps,
    generation: u32,
}

impl ProxySnapshot {
    fn is_captured(&self, vertex: VertexId) -> bool {
        self.captured.is_vertex_tagged(vertex, self.generation)
    }

    /// Uncaptured vertices have not been edited this stroke, so their live
    /// position is also their stroke-start position.
    fn resolve(&self, vertex: VertexId, live: Vec3, reference: FalloffReference) -> Vec3 {
        match reference {
            FalloffReference::Proxy if self.is_captured(vertex) => self.positions[vertex.index()],
            _ => live,
        }
    }
}

/// Split borrow handed to stroke kernels: live attributes writable, proxy
/// read-only.
pub(crate) struct AttributesMut<'a> {
    pub positions: &'a mut [Vec3],
    pub colors: &'a mut [Vec3],
    pub materials: &'a mut [Material],
    proxy: &'a ProxySnapshot,
}

impl AttributesMut<'_> {
    /// Same lookup as [`SurfaceMesh::reference_position`].
    pub fn reference_position(&self, vertex: VertexId, reference: FalloffReference) -> Vec3 {
        self.proxy
            .resolve(vertex, self.positions[vertex.index()], reference)
    }
}

#[derive(Debug)]
pub struct SurfaceMesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Vec3>,
    materials: Vec<Material>,
    proxy: ProxySnapshot,

    faces: Vec<Face>,
    face_normals: Vec<Vec3>,
    face_areas: Vec<f32>,
    face_aabbs: Vec<Aabb>,
    /// Upper bound on any face's bounding-box diagonal; only grows between full updates
    max_face_extent: f32,
    vertex_faces: Vec<Vec<FaceId>>,
    /// First display triangle of each face
    triangle_offsets: Vec<u32>,
    triangle_count: usize,
    /// Full display index buffer, seam corners already redirected
    indices: Vec<u32>,

    seams: SeamDuplicates,
    flat: Option<FlatShading>,
    tags: TagStamps,
    spatial: Box<dyn SpatialIndex>,

    touched_history: Vec<Vec<FaceId>>,
    local_edit: LocalEditState,
}

impl SurfaceMesh {
    /// Build a mesh from positions and faces.
    ///
    /// Colors default to white and materials to [`Material::default`].
    pub fn new(positions: Vec<Vec3>, faces: Vec<Face>) -> Result<Self, SculptError> {
        let vertex_count = positions.len();
        for (index, face) in faces.iter().enumerate() {
            let corners: Vec<VertexId> = face.vertices().collect();
            if let Some(bad) = corners.iter().find(|v| v.index() >= vertex_count) {
                return Err(SculptError::FaceIndexOutOfRange {
                    face: index,
                    vertex: bad.0,
                    vertex_count,
                });
            }
            for (i, a) in corners.iter().enumerate() {
                if corners[i + 1..].contains(a) {
                    return Err(SculptError::DegenerateFace(index));
                }
            }
        }

        let mut vertex_faces = vec![Vec::new(); vertex_count];
        let mut triangle_offsets = Vec::with_capacity(faces.len());
        let mut triangle_count = 0usize;
        for (index, face) in faces.iter().enumerate() {
            for vertex in face.vertices() {
                vertex_faces[vertex.index()].push(FaceId(index as u32));
            }
            triangle_offsets.push(triangle_count as u32);
            triangle_count += face.triangle_count();
        }

        let face_count = faces.len();
        let mut mesh = Self {
            normals: vec![Vec3::ZERO; vertex_count],
            colors: vec![Vec3::ONE; vertex_count],
            materials: vec![Material::default(); vertex_count],
            proxy: ProxySnapshot {
                positions: positions.clone(),
                colors: vec![Vec3::ONE; vertex_count],
                materials: vec![Material::default(); vertex_count],
                captured: TagStamps::new(vertex_count, 0),
                generation: 0,
            },
            positions,
            face_normals: vec![Vec3::ZERO; face_count],
            face_areas: vec![0.0; face_count],
            face_aabbs: vec![Aabb::empty(); face_count],
            max_face_extent: 0.0,
            vertex_faces,
            triangle_offsets,
            triangle_count,
            indices: Vec::new(),
            seams: SeamDuplicates::new(vertex_count, Vec::new()),
            flat: None,
            tags: TagStamps::new(vertex_count, face_count),
            spatial: Box::new(VertexOctree::default()),
            touched_history: Vec::new(),
            local_edit: LocalEditState::default(),
            faces,
        };
        mesh.proxy.generation = mesh.proxy.captured.next_generation();
        mesh.rebuild_indices(&[]);
        mesh.update_all_geometry();

        debug!(
            "Surface mesh: {} vertices, {} faces, {} triangles",
            vertex_count, face_count, mesh.triangle_count
        );
        Ok(mesh)
    }

    pub fn with_colors(mut self, colors: Vec<Vec3>) -> Result<Self, SculptError> {
        check_len("colors", self.positions.len(), colors.len())?;
        self.proxy.colors.clone_from(&colors);
        self.colors = colors;
        self.sync_all_appearance();
        Ok(self)
    }

    pub fn with_materials(mut self, materials: Vec<Material>) -> Result<Self, SculptError> {
        check_len("materials", self.positions.len(), materials.len())?;
        self.proxy.materials.clone_from(&materials);
        self.materials = materials;
        self.sync_all_appearance();
        Ok(self)
    }

    /// Split the given `(face, corner)` pairs onto their own render vertices.
    pub fn with_seam_duplicates(mut self, corners: &[(FaceId, usize)]) -> Result<Self, SculptError> {
        let mut sources = Vec::with_capacity(corners.len());
        for &(face, corner) in corners {
            let vertex = self
                .faces
                .get(face.index())
                .and_then(|f| f.vertices().nth(corner))
                .ok_or(SculptError::InvalidCorner {
                    face: face.index(),
                    corner,
                })?;
            sources.push(vertex);
        }
        self.seams = SeamDuplicates::new(self.positions.len(), sources);
        self.seams
            .sync_all(&self.positions, &self.normals, &self.colors, &self.materials);
        self.rebuild_indices(corners);
        Ok(self)
    }

    /// Keep per-corner flat-shading buffers and draw from them.
    pub fn with_flat_shading(mut self) -> Self {
        let mut flat = FlatShading::new(self.triangle_count);
        flat.update_all(&self.flat_source());
        self.flat = Some(flat);
        self
    }

    pub fn with_spatial_index(mut self, mut spatial: Box<dyn SpatialIndex>) -> Self {
        spatial.rebuild(&self.positions);
        self.spatial = spatial;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of display triangles (quads count twice).
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face_normals(&self) -> &[Vec3] {
        &self.face_normals
    }

    pub fn face_aabb(&self, face: FaceId) -> Aabb {
        self.face_aabbs[face.index()]
    }

    pub fn vertex_faces(&self, vertex: VertexId) -> &[FaceId] {
        &self.vertex_faces[vertex.index()]
    }

    pub fn proxy_positions(&self) -> &[Vec3] {
        &self.proxy.positions
    }

    pub fn proxy_colors(&self) -> &[Vec3] {
        &self.proxy.colors
    }

    pub fn seam_duplicates(&self) -> &SeamDuplicates {
        &self.seams
    }

    pub fn flat_shading(&self) -> Option<&FlatShading> {
        self.flat.as_ref()
    }

    pub fn vertex_state(&self, vertex: VertexId) -> VertexState {
        let i = vertex.index();
        VertexState {
            position: self.positions[i],
            color: self.colors[i],
            material: self.materials[i],
        }
    }

    pub(crate) fn attributes_mut(&mut self) -> AttributesMut<'_> {
        AttributesMut {
            positions: &mut self.positions,
            colors: &mut self.colors,
            materials: &mut self.materials,
            proxy: &self.proxy,
        }
    }

    // --- Proxy ---

    /// Forget every proxy capture; the next touch of each vertex re-snapshots it.
    pub fn begin_proxy_stroke(&mut self) {
        self.proxy.generation = self.proxy.captured.next_generation();
        trace!("proxy: new stroke generation {}", self.proxy.generation);
    }

    /// Snapshot the live attributes of `ids` not yet captured this stroke.
    pub fn refresh_proxy(&mut self, ids: &[VertexId]) {
        let generation = self.proxy.generation;
        for &vertex in ids {
            if self.proxy.captured.tag_vertex(vertex, generation) {
                let i = vertex.index();
                self.proxy.positions[i] = self.positions[i];
                self.proxy.colors[i] = self.colors[i];
                self.proxy.materials[i] = self.materials[i];
            }
        }
    }

    /// Whether `vertex` has been captured since the last [`Self::begin_proxy_stroke`].
    pub fn is_proxy_captured(&self, vertex: VertexId) -> bool {
        self.proxy.is_captured(vertex)
    }

    /// Position as seen by a kernel using `reference`.
    pub fn reference_position(&self, vertex: VertexId, reference: FalloffReference) -> Vec3 {
        self.proxy
            .resolve(vertex, self.positions[vertex.index()], reference)
    }

    /// Copy proxy positions back onto `ids`.
    pub fn restore_positions_from_proxy(&mut self, ids: &[VertexId]) {
        for &vertex in ids {
            if self.is_proxy_captured(vertex) {
                self.positions[vertex.index()] = self.proxy.positions[vertex.index()];
            }
        }
    }

    /// Copy proxy colors and materials back onto `ids`.
    pub fn restore_appearance_from_proxy(&mut self, ids: &[VertexId]) {
        for &vertex in ids {
            if self.is_proxy_captured(vertex) {
                let i = vertex.index();
                self.colors[i] = self.proxy.colors[i];
                self.materials[i] = self.proxy.materials[i];
            }
        }
    }

    // --- Geometry updates ---

    /// Recompute everything derived from the positions of `faces` / `vertices`
    /// and record `faces` in the touched history.
    pub fn update_geometry(&mut self, faces: &[FaceId], vertices: &[VertexId]) {
        for &face in faces {
            self.update_face(face);
        }
        // Every corner of a touched face has a stale normal, edited or not
        let ring = self.vertex_ring(faces, vertices);
        for &vertex in &ring {
            self.update_vertex_normal(vertex);
        }
        self.spatial.refresh(&self.positions, &self.faces, faces);
        self.seams
            .sync_geometry(&self.positions, &self.normals, &ring);
        self.update_flat_shading(Some(faces));
        self.mark_faces_touched(faces);
    }

    /// Recompute every derived buffer. Does not touch the history.
    pub fn update_all_geometry(&mut self) {
        self.max_face_extent = 0.0;
        for index in 0..self.faces.len() {
            self.update_face(FaceId(index as u32));
        }
        for index in 0..self.positions.len() {
            self.update_vertex_normal(VertexId(index as u32));
        }
        self.spatial.rebuild(&self.positions);
        self.seams
            .sync_all(&self.positions, &self.normals, &self.colors, &self.materials);
        self.update_flat_shading(None);
    }

    fn vertex_ring(&mut self, faces: &[FaceId], vertices: &[VertexId]) -> Vec<VertexId> {
        let generation = self.tags.next_generation();
        let mut ring = Vec::with_capacity(vertices.len());
        let corners = faces
            .iter()
            .flat_map(|face| self.faces[face.index()].vertices());
        for vertex in vertices.iter().copied().chain(corners) {
            if self.tags.tag_vertex(vertex, generation) {
                ring.push(vertex);
            }
        }
        ring
    }

    fn update_face(&mut self, face_id: FaceId) {
        let face = &self.faces[face_id.index()];
        let mut cross = Vec3::ZERO;
        for [a, b, c] in face.triangles() {
            let pa = self.positions[a.index()];
            cross += (self.positions[b.index()] - pa).cross(self.positions[c.index()] - pa);
        }
        let i = face_id.index();
        self.face_areas[i] = cross.length() * 0.5;
        self.face_normals[i] = cross.normalize_or_zero();
        self.face_aabbs[i] = Aabb::from_points(face.vertices().map(|v| self.positions[v.index()]));
        self.max_face_extent = self.max_face_extent.max(self.face_aabbs[i].size().length());
    }

    fn update_vertex_normal(&mut self, vertex: VertexId) {
        let mut sum = Vec3::ZERO;
        for face in &self.vertex_faces[vertex.index()] {
            sum += self.face_normals[face.index()] * self.face_areas[face.index()];
        }
        self.normals[vertex.index()] = sum.normalize_or_zero();
    }

    /// Resync seam duplicates' colors and materials (`None` = all of them).
    pub fn update_duplicate_colors_and_materials(&mut self, vertices: Option<&[VertexId]>) {
        match vertices {
            Some(ids) => self
                .seams
                .sync_colors_and_materials(&self.colors, &self.materials, ids),
            None => self.sync_all_appearance(),
        }
    }

    /// Refresh flat-shading buffers for `faces` (`None` = all of them).
    pub fn update_flat_shading(&mut self, faces: Option<&[FaceId]>) {
        let Some(mut flat) = self.flat.take() else {
            return;
        };
        {
            let source = self.flat_source();
            match faces {
                Some(ids) => flat.update_faces(&source, ids),
                None => flat.update_all(&source),
            }
        }
        self.flat = Some(flat);
    }

    /// Append a batch to the touched-face history.
    pub fn mark_faces_touched(&mut self, faces: &[FaceId]) {
        if !faces.is_empty() {
            self.touched_history.push(faces.to_vec());
        }
    }

    pub fn touched_history(&self) -> &[Vec<FaceId>] {
        &self.touched_history
    }

    fn sync_all_appearance(&mut self) {
        self.seams
            .sync_all(&self.positions, &self.normals, &self.colors, &self.materials);
        self.update_flat_shading(None);
    }

    fn flat_source(&self) -> FlatSource<'_> {
        FlatSource {
            faces: &self.faces,
            face_normals: &self.face_normals,
            triangle_offsets: &self.triangle_offsets,
            positions: &self.positions,
            colors: &self.colors,
            materials: &self.materials,
        }
    }

    fn rebuild_indices(&mut self, seam_corners: &[(FaceId, usize)]) {
        let vertex_count = self.positions.len() as u32;
        let mut corners: Vec<[u32; 4]> = self
            .faces
            .iter()
            .map(|face| {
                let mut render = [0u32; 4];
                for (slot, vertex) in face.vertices().enumerate() {
                    render[slot] = vertex.0;
                }
                render
            })
            .collect();
        for (slot, &(face, corner)) in seam_corners.iter().enumerate() {
            corners[face.index()][corner] = vertex_count + slot as u32;
        }

        self.indices.clear();
        self.indices.reserve(self.triangle_count * 3);
        for (face, render) in self.faces.iter().zip(&corners) {
            self.indices.extend_from_slice(&[render[0], render[1], render[2]]);
            if face.is_quad() {
                self.indices.extend_from_slice(&[render[0], render[2], render[3]]);
            }
        }
    }

    // --- Queries ---

    /// Unique faces adjacent to `vertices`, in first-seen order.
    pub fn faces_from_vertices(&mut self, vertices: &[VertexId]) -> Vec<FaceId> {
        let generation = self.tags.next_generation();
        let mut faces = Vec::new();
        for vertex in vertices {
            for &face in &self.vertex_faces[vertex.index()] {
                if self.tags.tag_face(face, generation) {
                    faces.push(face);
                }
            }
        }
        faces
    }

    /// Vertices of `ids` whose normal faces the eye: `dot(normal, eye) <= 0`.
    pub fn front_vertices(&self, ids: &[VertexId], eye_direction: Vec3) -> Vec<VertexId> {
        ids.iter()
            .copied()
            .filter(|v| self.normals[v.index()].dot(eye_direction) <= 0.0)
            .collect()
    }

    /// Area-weighted plane of the faces around `front`.
    ///
    /// Returns `None` when the summed face normal has no length (no faces, or
    /// faces cancelling each other out).
    pub fn area_plane(&mut self, front: &[VertexId], reference: FalloffReference) -> Option<AreaPlane> {
        let faces = self.faces_from_vertices(front);
        let mut normal_sum = Vec3::ZERO;
        let mut center_sum = Vec3::ZERO;
        let mut area_sum = 0.0f32;
        for face in faces {
            for [a, b, c] in self.faces[face.index()].triangles() {
                let pa = self.reference_position(a, reference);
                let pb = self.reference_position(b, reference);
                let pc = self.reference_position(c, reference);
                let cross = (pb - pa).cross(pc - pa);
                let area = cross.length();
                normal_sum += cross;
                center_sum += (pa + pb + pc) / 3.0 * area;
                area_sum += area;
            }
        }

        let normal = normal_sum.try_normalize()?;
        if area_sum <= f32::EPSILON {
            return None;
        }
        Some(AreaPlane {
            center: center_sum / area_sum,
            normal,
        })
    }

    /// Vertices whose mask channel is above zero.
    pub fn unmasked_vertices(&self) -> Vec<VertexId> {
        self.materials
            .iter()
            .enumerate()
            .filter(|(_, m)| m.mask > 0.0)
            .map(|(i, _)| VertexId(i as u32))
            .collect()
    }

    /// Radius query against the spatial index, ids checked against the mesh.
    pub fn query_radius(&self, center: Vec3, radius: f32) -> Result<Vec<VertexId>, SculptError> {
        let ids = self.spatial.query_radius(center, radius);
        check_vertex_ids("spatial index", &ids, self.positions.len())?;
        Ok(ids)
    }

    /// Faces the ray may hit, gathered from the spatial index.
    ///
    /// A face crossed by the ray has every corner within its own bounding
    /// diagonal of the hit point, so querying with the largest diagonal finds
    /// at least one corner of it. Ascending, without duplicates.
    pub fn ray_candidate_faces(&self, origin: Vec3, direction: Vec3) -> Result<Vec<FaceId>, SculptError> {
        let ids = self
            .spatial
            .query_ray(origin, direction, self.max_face_extent + 1e-5);
        check_vertex_ids("spatial index", &ids, self.positions.len())?;

        let mut faces: Vec<FaceId> = ids
            .iter()
            .flat_map(|vertex| self.vertex_faces[vertex.index()].iter().copied())
            .collect();
        faces.sort_unstable();
        faces.dedup();
        Ok(faces)
    }

    // --- Undo support ---

    /// Write captured vertex states back and refresh everything around them.
    pub fn restore_vertex_states(&mut self, states: &[(VertexId, VertexState)]) -> Result<(), SculptError> {
        let ids: Vec<VertexId> = states.iter().map(|(v, _)| *v).collect();
        check_vertex_ids("undo log", &ids, self.positions.len())?;
        for (vertex, state) in states {
            let i = vertex.index();
            self.positions[i] = state.position;
            self.colors[i] = state.color;
            self.materials[i] = state.material;
        }
        let faces = self.faces_from_vertices(&ids);
        self.seams
            .sync_colors_and_materials(&self.colors, &self.materials, &ids);
        self.update_geometry(&faces, &ids);
        Ok(())
    }
}
