//! Stroke tools.
//!
//! A tool is a [`StrokeKernel`] (the per-vertex math: what is read, what is
//! written, how the result is committed and rolled back) driven by the shared
//! [`StrokeTool`] state machine, which owns picking, spacing, symmetry,
//! lock-replay and undo pushes.

mod brush;
mod paint;
mod stroke;

pub use brush::{brush_falloff, Brush};
pub use paint::{paint_falloff, Paint, PickedColor};
pub use stroke::{StrokeContext, StrokeInput, StrokeTool};

use sculpt_config::StrokeSettings;

use crate::display::RefreshScope;
use crate::mesh::SurfaceMesh;
use crate::picking::PickingResult;
use crate::types::{FaceId, VertexId};
use crate::undo::UndoLog;

/// Vertices a kernel is asked to edit on one side of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSet {
    /// Vertices to edit (already culled when culling is on)
    pub vertices: Vec<VertexId>,
    /// Picked vertices facing the eye
    pub front: Vec<VertexId>,
    /// Tool intensity times pressure
    pub intensity: f32,
    pub lock: bool,
}

/// What one side of one tick modified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchedRegion {
    pub vertices: Vec<VertexId>,
    pub faces: Vec<FaceId>,
}

/// Why a tick did not modify the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No stroke is active
    Inactive,
    /// The ray missed the mesh
    Missed,
    /// Nothing inside the brush
    EmptyPick,
    /// Pointer moved less than the dab spacing
    Spacing,
    /// Zero brush radius
    ZeroRadius,
    /// Lock-position stroke started; edits begin once the pointer drags away
    LockAwaitingDrag,
    /// Clay plane had no usable normal
    DegeneratePlane,
}

/// Result of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeOutcome {
    Applied { vertices: usize, faces: usize },
    Skipped(SkipReason),
}

impl StrokeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, StrokeOutcome::Applied { .. })
    }
}

/// Per-vertex edit of a stroke tool.
pub trait StrokeKernel {
    fn stroke_settings(&self) -> &StrokeSettings;

    /// Whether the picked vertices are captured into the proxy before editing.
    fn refreshes_proxy(&self, lock: bool) -> bool;

    /// Called once when a stroke starts.
    fn on_stroke_start(&self, _mesh: &SurfaceMesh, _undo: &mut dyn UndoLog) {}

    /// Mutate the live attributes of `edit.vertices`.
    fn apply(
        &self,
        mesh: &mut SurfaceMesh,
        edit: &EditSet,
        picking: &PickingResult,
    ) -> Result<(), SkipReason>;

    /// Propagate an applied edit to the derived buffers.
    fn commit(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion);

    /// Undo the previous tick of a lock-replay from the proxy.
    fn rollback(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion);

    /// Display buffers an edit invalidates.
    fn refresh_scope(&self) -> RefreshScope;
}

/// The closed set of stroke tools.
#[derive(Debug, Clone)]
pub enum ToolKernel {
    Brush(Brush),
    Paint(Paint),
}

impl ToolKernel {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKernel::Brush(_) => "brush",
            ToolKernel::Paint(_) => "paint",
        }
    }
}

impl StrokeKernel for ToolKernel {
    fn stroke_settings(&self) -> &StrokeSettings {
        match self {
            ToolKernel::Brush(brush) => brush.stroke_settings(),
            ToolKernel::Paint(paint) => paint.stroke_settings(),
        }
    }

    fn refreshes_proxy(&self, lock: bool) -> bool {
        match self {
            ToolKernel::Brush(brush) => brush.refreshes_proxy(lock),
            ToolKernel::Paint(paint) => paint.refreshes_proxy(lock),
        }
    }

    fn on_stroke_start(&self, mesh: &SurfaceMesh, undo: &mut dyn UndoLog) {
        match self {
            ToolKernel::Brush(brush) => brush.on_stroke_start(mesh, undo),
            ToolKernel::Paint(paint) => paint.on_stroke_start(mesh, undo),
        }
    }

    fn apply(
        &self,
        mesh: &mut SurfaceMesh,
        edit: &EditSet,
        picking: &PickingResult,
    ) -> Result<(), SkipReason> {
        match self {
            ToolKernel::Brush(brush) => brush.apply(mesh, edit, picking),
            ToolKernel::Paint(paint) => paint.apply(mesh, edit, picking),
        }
    }

    fn commit(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion) {
        match self {
            ToolKernel::Brush(brush) => brush.commit(mesh, region),
            ToolKernel::Paint(paint) => paint.commit(mesh, region),
        }
    }

    fn rollback(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion) {
        match self {
            ToolKernel::Brush(brush) => brush.rollback(mesh, region),
            ToolKernel::Paint(paint) => paint.rollback(mesh, region),
        }
    }

    fn refresh_scope(&self) -> RefreshScope {
        match self {
            ToolKernel::Brush(brush) => brush.refresh_scope(),
            ToolKernel::Paint(paint) => paint.refresh_scope(),
        }
    }
}
