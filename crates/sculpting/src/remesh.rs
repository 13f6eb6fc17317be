//! Dynamic-topology hook.
//!
//! Remeshing itself lives outside this crate; the stroke driver only calls
//! [`Remesher::refine`] once per non-lock tick and edits whatever vertex set
//! comes back.

use std::fmt;

use crate::mesh::SurfaceMesh;
use crate::picking::PickingResult;
use crate::types::VertexId;

pub trait Remesher: fmt::Debug {
    /// Refine the surface under the brush and return the vertices to edit.
    ///
    /// Every returned id must be a valid vertex of `mesh` after the call.
    fn refine(&mut self, mesh: &mut SurfaceMesh, picking: &PickingResult) -> Vec<VertexId>;
}

/// Fixed topology: the picked set passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTopology;

impl Remesher for StaticTopology {
    fn refine(&mut self, _mesh: &mut SurfaceMesh, picking: &PickingResult) -> Vec<VertexId> {
        picking.picked_vertices.clone()
    }
}
