//! Interactive mesh sculpting and vertex painting.
//!
//! This crate provides the stroke pipeline of a sculpting application:
//! - Brush deformation (direct displacement or clay flattening)
//! - Vertex painting of color, roughness and metallic
//! - Lock-position strokes replayed from a per-stroke proxy snapshot
//! - Mirrored strokes through a symmetry plane
//! - Partial display uploads built from the touched-face history
//!
//! # Architecture
//!
//! A [`SurfaceMesh`] owns the editable attributes and everything derived from
//! them. Stroke tools pair a per-vertex [`StrokeKernel`] (brush or paint) with
//! the shared [`StrokeTool`] driver. External systems plug in through traits:
//!
//! - **[`SpatialIndex`]**: radius queries (default [`VertexOctree`])
//! - **[`Remesher`]**: dynamic topology under the brush
//! - **[`UndoLog`]**: snapshot-before-mutate (default [`MeshUndoLog`])
//! - **[`DisplayLayer`]**: buffer uploads
//! - **[`SymmetryMirror`]** / **[`AlphaMask`]**: pick mirroring and brush alpha
//!
//! [`SculptPipeline`] wires them together for a host application.

pub mod display;
pub mod error;
pub mod mesh;
pub mod picking;
pub mod pipeline;
pub mod remesh;
pub mod scratch;
pub mod spatial;
pub mod tool;
pub mod types;
pub mod undo;

pub use sculpt_config as config;

pub use display::{upload, BufferKind, DisplayLayer, RecordingDisplay, RefreshScope, RenderBuffers};
pub use error::SculptError;
pub use mesh::{
    AreaPlane, FalloffReference, FallbackReason, LocalEditOutcome, SurfaceMesh, VertexState,
};
pub use picking::{pick, AlphaMask, PickRequest, PickingResult, PlaneMirror, SymmetryMirror};
pub use pipeline::SculptPipeline;
pub use remesh::{Remesher, StaticTopology};
pub use spatial::{SpatialIndex, VertexOctree};
pub use tool::{
    Brush, Paint, PickedColor, SkipReason, StrokeContext, StrokeInput, StrokeKernel,
    StrokeOutcome, StrokeTool, ToolKernel,
};
pub use types::{Face, FaceId, Material, Side, VertexId};
pub use undo::{MeshUndoLog, UndoLog};
