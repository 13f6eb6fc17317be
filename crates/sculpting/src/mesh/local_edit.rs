//! Partial display uploads.
//!
//! While a stroke is active only a small part of a large mesh changes. The
//! touched-face history is collapsed into a compact sub-mesh (its own index
//! buffer and gathered vertex attributes) which is uploaded instead of the
//! full buffers. When too much of the mesh was touched, or the mesh is small,
//! a full refresh is cheaper and the caller is told so.

use std::borrow::Cow;

use glam::Vec3;
use sculpt_config::LocalEditConfig;
use tracing::{debug, trace};

use super::SurfaceMesh;
use crate::display::{upload, BufferKind, DisplayLayer, RefreshScope, RenderBuffers};
use crate::scratch::{ScratchKind, ScratchPool};
use crate::types::{FaceId, Material, VertexId};

/// Compact sub-mesh built from the touched-face history.
#[derive(Debug, Clone, Default)]
pub struct LocalEditBuffers {
    /// Unique touched faces, in first-touch order
    pub faces: Vec<FaceId>,
    /// Compact vertex index -> mesh vertex
    pub vertex_ids: Vec<VertexId>,
    /// Display triangles over compact vertex indices
    pub indices: Vec<u32>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub materials: Vec<Material>,
}

impl LocalEditBuffers {
    fn clear(&mut self) {
        self.faces.clear();
        self.vertex_ids.clear();
        self.indices.clear();
        self.positions.clear();
        self.normals.clear();
        self.colors.clear();
        self.materials.clear();
    }
}

/// Why an extraction fell back to a full refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Disabled,
    NothingTouched,
    MeshTooSmall { triangles: usize, min: usize },
    TooManyFaces { touched: usize, limit: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalEditOutcome {
    Compact { faces: usize, vertices: usize },
    FullRefresh(FallbackReason),
}

#[derive(Debug, Default)]
pub(crate) struct LocalEditState {
    active: bool,
    buffers: LocalEditBuffers,
}

impl SurfaceMesh {
    /// Collapse the touched-face history into compact buffers.
    ///
    /// On success the buffers are kept on the mesh (see
    /// [`Self::local_edit_buffers`]); the history is left untouched.
    pub fn extract_local_edit(
        &mut self,
        config: &LocalEditConfig,
        pool: &mut ScratchPool,
    ) -> LocalEditOutcome {
        if !config.enabled {
            return LocalEditOutcome::FullRefresh(FallbackReason::Disabled);
        }
        if self.touched_history.is_empty() {
            return LocalEditOutcome::FullRefresh(FallbackReason::NothingTouched);
        }
        if self.triangle_count < config.min_triangles {
            return LocalEditOutcome::FullRefresh(FallbackReason::MeshTooSmall {
                triangles: self.triangle_count,
                min: config.min_triangles,
            });
        }

        let total = self.faces.len();
        let limit = config.max_local_faces(total);
        let mut unique = pool.checkout(ScratchKind::UniqueFaces, total);
        let generation = self.tags.next_generation();
        let mut count = 0usize;
        for batch in &self.touched_history {
            for &face in batch {
                if self.tags.tag_face(face, generation) {
                    unique[count] = face.0;
                    count += 1;
                }
            }
        }

        if count > limit {
            pool.checkin(unique);
            debug!("Local edit: {} of {} faces touched, refreshing in full", count, total);
            return LocalEditOutcome::FullRefresh(FallbackReason::TooManyFaces {
                touched: count,
                limit,
                total,
            });
        }

        let mut remap = pool.checkout(ScratchKind::VertexRemap, self.positions.len());
        let generation = self.tags.next_generation();
        let local = &mut self.local_edit.buffers;
        local.clear();
        for &face_index in &unique[..count] {
            let face = &self.faces[face_index as usize];
            local.faces.push(FaceId(face_index));
            for triangle in face.triangles() {
                for vertex in triangle {
                    if self.tags.tag_vertex(vertex, generation) {
                        remap[vertex.index()] = local.vertex_ids.len() as u32;
                        local.vertex_ids.push(vertex);
                    }
                    local.indices.push(remap[vertex.index()]);
                }
            }
        }
        pool.checkin(remap);
        pool.checkin(unique);

        for vertex in &local.vertex_ids {
            let i = vertex.index();
            local.positions.push(self.positions[i]);
            local.normals.push(self.normals[i]);
            local.colors.push(self.colors[i]);
            local.materials.push(self.materials[i]);
        }

        trace!(
            "Local edit: {} faces, {} vertices, {} triangles",
            local.faces.len(),
            local.vertex_ids.len(),
            local.indices.len() / 3
        );
        LocalEditOutcome::Compact {
            faces: local.faces.len(),
            vertices: local.vertex_ids.len(),
        }
    }

    pub fn local_edit_buffers(&self) -> &LocalEditBuffers {
        &self.local_edit.buffers
    }

    pub fn is_local_edit(&self) -> bool {
        self.local_edit.active
    }

    /// Switch local-edit drawing on or off. Turning it off clears the
    /// touched-face history.
    pub fn set_local_edit(&mut self, active: bool) {
        self.local_edit.active = active;
        if !active {
            self.touched_history.clear();
        }
    }

    /// Push the current state to `display`, compactly when possible.
    ///
    /// Returns true when the compact path was used. `scope` is what a full
    /// refresh uploads; the compact path always uploads every buffer.
    pub fn render_local_edit(
        &mut self,
        display: &mut dyn DisplayLayer,
        scope: RefreshScope,
        config: &LocalEditConfig,
        pool: &mut ScratchPool,
    ) -> bool {
        match self.extract_local_edit(config, pool) {
            LocalEditOutcome::Compact { .. } => {
                self.set_local_edit(true);
                upload(display, &self.render_buffers(), RefreshScope::All);
                self.set_local_edit(false);
                true
            }
            LocalEditOutcome::FullRefresh(reason) => {
                trace!("Local edit skipped: {:?}", reason);
                upload(display, &self.render_buffers(), scope);
                self.touched_history.clear();
                false
            }
        }
    }

    /// End of an editing session: full upload and a clean history.
    pub fn finish_local_edit(&mut self, display: &mut dyn DisplayLayer) {
        self.set_local_edit(false);
        upload(display, &self.render_buffers(), RefreshScope::All);
    }

    /// The buffers to draw right now.
    pub fn render_buffers(&self) -> RenderBuffers<'_> {
        if self.local_edit.active {
            let local = &self.local_edit.buffers;
            return RenderBuffers {
                kind: BufferKind::Local,
                indices: Cow::Borrowed(&local.indices),
                positions: Cow::Borrowed(&local.positions),
                normals: Cow::Borrowed(&local.normals),
                colors: Cow::Borrowed(&local.colors),
                materials: Cow::Borrowed(&local.materials),
            };
        }

        if let Some(flat) = &self.flat {
            return RenderBuffers {
                kind: BufferKind::Flat,
                indices: Cow::Borrowed(&flat.indices),
                positions: Cow::Borrowed(&flat.positions),
                normals: Cow::Borrowed(&flat.normals),
                colors: Cow::Borrowed(&flat.colors),
                materials: Cow::Borrowed(&flat.materials),
            };
        }

        if self.seams.is_empty() {
            return RenderBuffers {
                kind: BufferKind::Full,
                indices: Cow::Borrowed(&self.indices),
                positions: Cow::Borrowed(&self.positions),
                normals: Cow::Borrowed(&self.normals),
                colors: Cow::Borrowed(&self.colors),
                materials: Cow::Borrowed(&self.materials),
            };
        }

        RenderBuffers {
            kind: BufferKind::Full,
            indices: Cow::Borrowed(&self.indices),
            positions: Cow::Owned([&self.positions[..], &self.seams.positions[..]].concat()),
            normals: Cow::Owned([&self.normals[..], &self.seams.normals[..]].concat()),
            colors: Cow::Owned([&self.colors[..], &self.seams.colors[..]].concat()),
            materials: Cow::Owned([&self.materials[..], &self.seams.materials[..]].concat()),
        }
    }
}
