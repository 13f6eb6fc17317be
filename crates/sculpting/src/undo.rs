//! Undo support for strokes.
//!
//! Tools push the ids they are about to modify before touching them. The
//! default [`MeshUndoLog`] keeps the first captured state of each vertex per
//! stroke, so repeated pushes during a stroke cost nothing and undo restores
//! the pre-stroke surface.

use std::collections::HashMap;

use tracing::debug;

use crate::error::SculptError;
use crate::mesh::{SurfaceMesh, VertexState};
use crate::types::VertexId;

/// Snapshot-before-mutate contract used by the stroke tools.
pub trait UndoLog {
    /// Record the current state of `ids`.
    fn push_vertices(&mut self, mesh: &SurfaceMesh, ids: &[VertexId]);

    /// Record the colors and materials of every vertex.
    fn push_colors_and_materials(&mut self, mesh: &SurfaceMesh);
}

/// An undo entry holding the pre-stroke state of every touched vertex
#[derive(Debug, Clone, Default)]
pub struct UndoEntry {
    pub stroke_id: u64,
    pub vertices: HashMap<VertexId, VertexState>,
}

/// Bounded stack of per-stroke entries.
#[derive(Debug)]
pub struct MeshUndoLog {
    stack: Vec<UndoEntry>,
    pending: Option<UndoEntry>,
    next_stroke_id: u64,
    max_levels: usize,
}

impl Default for MeshUndoLog {
    fn default() -> Self {
        Self::new(32)
    }
}

impl MeshUndoLog {
    pub fn new(max_levels: usize) -> Self {
        Self {
            stack: Vec::new(),
            pending: None,
            next_stroke_id: 0,
            max_levels: max_levels.max(1),
        }
    }

    /// Open an entry for a new stroke. An entry still open is committed first.
    pub fn begin_stroke(&mut self) {
        self.end_stroke();
        self.pending = Some(UndoEntry {
            stroke_id: self.next_stroke_id,
            vertices: HashMap::new(),
        });
        self.next_stroke_id += 1;
    }

    /// Commit the open entry; empty entries are dropped.
    pub fn end_stroke(&mut self) {
        let Some(entry) = self.pending.take() else {
            return;
        };
        if entry.vertices.is_empty() {
            return;
        }
        debug!(
            "Undo: committed stroke {} ({} vertices)",
            entry.stroke_id,
            entry.vertices.len()
        );
        self.stack.push(entry);
        if self.stack.len() > self.max_levels {
            self.stack.remove(0);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.stack.len()
    }

    /// Vertices captured by the open entry.
    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, |e| e.vertices.len())
    }

    /// Undo the last committed stroke.
    ///
    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self, mesh: &mut SurfaceMesh) -> Result<bool, SculptError> {
        self.end_stroke();
        let Some(entry) = self.stack.pop() else {
            debug!("Undo: no entries available");
            return Ok(false);
        };

        debug!(
            "Undoing stroke {} ({} vertices)",
            entry.stroke_id,
            entry.vertices.len()
        );
        let mut states: Vec<(VertexId, VertexState)> = entry.vertices.into_iter().collect();
        states.sort_unstable_by_key(|(v, _)| *v);
        mesh.restore_vertex_states(&states)?;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.pending = None;
    }

    fn pending_entry(&mut self) -> &mut UndoEntry {
        let next_id = &mut self.next_stroke_id;
        self.pending.get_or_insert_with(|| {
            let entry = UndoEntry {
                stroke_id: *next_id,
                vertices: HashMap::new(),
            };
            *next_id += 1;
            entry
        })
    }
}

impl UndoLog for MeshUndoLog {
    fn push_vertices(&mut self, mesh: &SurfaceMesh, ids: &[VertexId]) {
        let entry = self.pending_entry();
        for &vertex in ids {
            entry
                .vertices
                .entry(vertex)
                .or_insert_with(|| mesh.vertex_state(vertex));
        }
    }

    fn push_colors_and_materials(&mut self, mesh: &SurfaceMesh) {
        let entry = self.pending_entry();
        for index in 0..mesh.vertex_count() {
            let vertex = VertexId(index as u32);
            entry
                .vertices
                .entry(vertex)
                .or_insert_with(|| mesh.vertex_state(vertex));
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::mesh::test_support::grid_mesh;

    #[test]
    fn test_first_capture_wins() {
        let mut mesh = grid_mesh(1);
        let mut log = MeshUndoLog::default();
        log.begin_stroke();
        log.push_vertices(&mesh, &[VertexId(0)]);
        mesh.attributes_mut().positions[0] = Vec3::splat(1.0);
        log.push_vertices(&mesh, &[VertexId(0), VertexId(1)]);
        assert_eq!(log.pending_len(), 2);
        log.end_stroke();

        assert!(log.undo(&mut mesh).unwrap());
        assert_eq!(mesh.positions()[0], Vec3::ZERO);
        assert!(!log.can_undo());
        assert!(!log.undo(&mut mesh).unwrap());
    }

    #[test]
    fn test_empty_strokes_are_dropped_and_stack_is_bounded() {
        let mesh = grid_mesh(1);
        let mut log = MeshUndoLog::new(2);
        log.begin_stroke();
        log.end_stroke();
        assert_eq!(log.undo_count(), 0);

        for _ in 0..3 {
            log.begin_stroke();
            log.push_vertices(&mesh, &[VertexId(2)]);
            log.end_stroke();
        }
        assert_eq!(log.undo_count(), 2);
        assert_eq!(log.stack[0].stroke_id, 2);
    }

    #[test]
    fn test_push_colors_captures_every_vertex() {
        let mut mesh = grid_mesh(1);
        let mut log = MeshUndoLog::default();
        log.push_colors_and_materials(&mesh);
        assert_eq!(log.pending_len(), 4);
        mesh.attributes_mut().colors[3] = Vec3::ZERO;
        assert!(log.undo(&mut mesh).unwrap());
        assert_eq!(mesh.colors()[3], Vec3::ONE);
    }
}
