//! Seam duplicates: extra render vertices that repeat a source vertex.
//!
//! A vertex on a UV seam is drawn once per UV island, so the render buffers
//! carry one extra slot per split face corner. The slots live after the
//! source vertices in the full buffers and have to follow every edit of
//! their source.

use glam::Vec3;

use crate::types::{Material, VertexId};

#[derive(Debug, Clone, Default)]
pub struct SeamDuplicates {
    /// Duplicate slot -> source vertex
    sources: Vec<VertexId>,
    /// Per source vertex, range into `slots` (CSR)
    offsets: Vec<u32>,
    slots: Vec<u32>,
    pub(crate) positions: Vec<Vec3>,
    pub(crate) normals: Vec<Vec3>,
    pub(crate) colors: Vec<Vec3>,
    pub(crate) materials: Vec<Material>,
}

impl SeamDuplicates {
    /// Build the lookup for `sources`, one duplicate slot per entry.
    pub fn new(vertex_count: usize, sources: Vec<VertexId>) -> Self {
        let mut counts = vec![0u32; vertex_count + 1];
        for source in &sources {
            counts[source.index() + 1] += 1;
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let offsets = counts;

        let mut cursor = offsets.clone();
        let mut slots = vec![0u32; sources.len()];
        for (slot, source) in sources.iter().enumerate() {
            let at = &mut cursor[source.index()];
            slots[*at as usize] = slot as u32;
            *at += 1;
        }

        let len = sources.len();
        Self {
            sources,
            offsets,
            slots,
            positions: vec![Vec3::ZERO; len],
            normals: vec![Vec3::ZERO; len],
            colors: vec![Vec3::ONE; len],
            materials: vec![Material::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source(&self, slot: usize) -> VertexId {
        self.sources[slot]
    }

    /// Duplicate slots of a source vertex.
    pub fn duplicates_of(&self, vertex: VertexId) -> &[u32] {
        let start = self.offsets[vertex.index()] as usize;
        let end = self.offsets[vertex.index() + 1] as usize;
        &self.slots[start..end]
    }

    /// Copy position and normal from the sources of `vertices`.
    pub fn sync_geometry(&mut self, positions: &[Vec3], normals: &[Vec3], vertices: &[VertexId]) {
        for &vertex in vertices {
            let start = self.offsets[vertex.index()] as usize;
            let end = self.offsets[vertex.index() + 1] as usize;
            for &slot in &self.slots[start..end] {
                self.positions[slot as usize] = positions[vertex.index()];
                self.normals[slot as usize] = normals[vertex.index()];
            }
        }
    }

    /// Copy color and material from the sources of `vertices`.
    pub fn sync_colors_and_materials(
        &mut self,
        colors: &[Vec3],
        materials: &[Material],
        vertices: &[VertexId],
    ) {
        for &vertex in vertices {
            let start = self.offsets[vertex.index()] as usize;
            let end = self.offsets[vertex.index() + 1] as usize;
            for &slot in &self.slots[start..end] {
                self.colors[slot as usize] = colors[vertex.index()];
                self.materials[slot as usize] = materials[vertex.index()];
            }
        }
    }

    /// Resync every slot.
    pub fn sync_all(
        &mut self,
        positions: &[Vec3],
        normals: &[Vec3],
        colors: &[Vec3],
        materials: &[Material],
    ) {
        for (slot, source) in self.sources.iter().enumerate() {
            let i = source.index();
            self.positions[slot] = positions[i];
            self.normals[slot] = normals[i];
            self.colors[slot] = colors[i];
            self.materials[slot] = materials[i];
        }
    }
}
