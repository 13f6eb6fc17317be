//! Sculpting session orchestration.
//!
//! [`SculptPipeline`] owns the mesh and everything a stroke needs around it:
//! 1. Pointer input -> stroke tool (pick, spacing, symmetry, lock-replay)
//! 2. Tool kernel -> mesh attributes and derived buffers
//! 3. Touched-face history -> compact or full display upload
//! 4. Stroke end -> undo entry and a full upload
//!
//! The collaborators (remesher, symmetry mirror, alpha mask, display) are
//! trait objects so a host can swap them without touching the tools.

use std::sync::Arc;

use sculpt_config::{BrushSettings, PaintSettings, SculptConfig};
use tracing::debug;

use crate::display::{upload, DisplayLayer, RefreshScope};
use crate::error::SculptError;
use crate::mesh::SurfaceMesh;
use crate::picking::{pick, AlphaMask, PickRequest, SymmetryMirror};
use crate::remesh::{Remesher, StaticTopology};
use crate::scratch::ScratchPool;
use crate::spatial::VertexOctree;
use crate::tool::{
    Brush, Paint, PickedColor, StrokeContext, StrokeInput, StrokeKernel, StrokeOutcome,
    StrokeTool, ToolKernel,
};
use crate::types::VertexId;
use crate::undo::MeshUndoLog;

/// A sculpting session over one mesh.
#[derive(Debug)]
pub struct SculptPipeline {
    mesh: SurfaceMesh,
    undo: MeshUndoLog,
    scratch: ScratchPool,
    tool: StrokeTool,
    config: SculptConfig,
    mirror: Option<Box<dyn SymmetryMirror>>,
    remesher: Box<dyn Remesher>,
    alpha: Option<Arc<dyn AlphaMask>>,
}

impl SculptPipeline {
    /// Start a session with the brush selected.
    pub fn new(mesh: SurfaceMesh, config: SculptConfig) -> Self {
        let spatial = VertexOctree::with_config(config.octree.clone());
        let mesh = mesh.with_spatial_index(Box::new(spatial));
        Self {
            mesh,
            undo: MeshUndoLog::default(),
            scratch: ScratchPool::new(),
            tool: StrokeTool::new(ToolKernel::Brush(Brush::new(config.brush.clone()))),
            config,
            mirror: None,
            remesher: Box::new(StaticTopology),
            alpha: None,
        }
    }

    pub fn mesh(&self) -> &SurfaceMesh {
        &self.mesh
    }

    pub fn config(&self) -> &SculptConfig {
        &self.config
    }

    pub fn tool(&self) -> &StrokeTool {
        &self.tool
    }

    pub fn undo_log(&self) -> &MeshUndoLog {
        &self.undo
    }

    pub fn is_stroke_active(&self) -> bool {
        self.tool.is_active()
    }

    // --- Tool selection ---

    pub fn select_brush(&mut self) {
        self.tool = StrokeTool::new(ToolKernel::Brush(Brush::new(self.config.brush.clone())));
        debug!("Selected brush");
    }

    pub fn select_paint(&mut self) {
        self.tool = StrokeTool::new(ToolKernel::Paint(Paint::new(self.config.paint.clone())));
        debug!("Selected paint");
    }

    /// Replace the brush settings. Applies to the active tool immediately.
    pub fn set_brush_settings(&mut self, settings: BrushSettings) {
        if let ToolKernel::Brush(brush) = self.tool.kernel_mut() {
            brush.settings = settings.clone();
        }
        self.config.brush = settings;
    }

    /// Replace the paint settings. Applies to the active tool immediately.
    pub fn set_paint_settings(&mut self, settings: PaintSettings) {
        if let ToolKernel::Paint(paint) = self.tool.kernel_mut() {
            paint.settings = settings.clone();
        }
        self.config.paint = settings;
    }

    pub fn set_symmetry(&mut self, mirror: Option<Box<dyn SymmetryMirror>>) {
        self.mirror = mirror;
    }

    pub fn set_remesher(&mut self, remesher: Box<dyn Remesher>) {
        self.remesher = remesher;
    }

    pub fn set_alpha(&mut self, alpha: Option<Arc<dyn AlphaMask>>) {
        self.alpha = alpha;
    }

    // --- Strokes ---

    /// Pointer down.
    pub fn begin_stroke(
        &mut self,
        input: StrokeInput,
        display: &mut dyn DisplayLayer,
    ) -> Result<StrokeOutcome, SculptError> {
        if self.tool.is_active() {
            self.end_stroke(display);
        }
        self.undo.begin_stroke();

        let mut ctx = StrokeContext {
            mesh: &mut self.mesh,
            undo: &mut self.undo,
            remesher: self.remesher.as_mut(),
            mirror: self.mirror.as_deref(),
            alpha: self.alpha.clone(),
        };
        let outcome = self.tool.start(&mut ctx, input)?;
        self.render(display);
        Ok(outcome)
    }

    /// Pointer move while the stroke is held.
    pub fn update_stroke(
        &mut self,
        input: StrokeInput,
        display: &mut dyn DisplayLayer,
    ) -> Result<StrokeOutcome, SculptError> {
        let mut ctx = StrokeContext {
            mesh: &mut self.mesh,
            undo: &mut self.undo,
            remesher: self.remesher.as_mut(),
            mirror: self.mirror.as_deref(),
            alpha: self.alpha.clone(),
        };
        let outcome = self.tool.update(&mut ctx, input)?;
        self.render(display);
        Ok(outcome)
    }

    /// Pointer up: commit the undo entry and upload everything once.
    pub fn end_stroke(&mut self, display: &mut dyn DisplayLayer) {
        self.tool.end();
        self.undo.end_stroke();
        self.mesh.finish_local_edit(display);
    }

    /// Upload whatever was touched since the last upload.
    ///
    /// Rollback-only ticks (lock-replay collapsing to zero radius) still
    /// touch faces, so the history decides rather than the outcome.
    pub fn render(&mut self, display: &mut dyn DisplayLayer) {
        if self.mesh.touched_history().is_empty() {
            return;
        }
        let scope = self.tool.kernel().refresh_scope();
        self.mesh
            .render_local_edit(display, scope, &self.config.local_edit, &mut self.scratch);
    }

    // --- Paint helpers ---

    /// Paint every unmasked vertex with the current paint settings.
    pub fn paint_all(&mut self, display: &mut dyn DisplayLayer) -> Vec<VertexId> {
        if self.tool.is_active() {
            self.end_stroke(display);
        }
        let paint = Paint::new(self.config.paint.clone());
        self.undo.begin_stroke();
        let painted = paint.paint_all(&mut self.mesh, &mut self.undo);
        self.undo.end_stroke();
        upload(display, &self.mesh.render_buffers(), RefreshScope::Appearance);
        painted
    }

    /// Sample the surface under `request` and adopt it as the paint target.
    ///
    /// `Ok(None)` when the ray misses.
    pub fn pick_color(&mut self, request: &PickRequest) -> Result<Option<PickedColor>, SculptError> {
        let Some(picking) = pick(&self.mesh, request)? else {
            return Ok(None);
        };
        let picked = Paint::pick_color(&self.mesh, &picking);

        let mut paint = Paint::new(self.config.paint.clone());
        paint.set_target(picked);
        self.set_paint_settings(paint.settings);
        debug!("Picked color {:?}", picked.color);
        Ok(Some(picked))
    }

    // --- History ---

    /// Undo the last stroke. Returns false when there is nothing to undo.
    pub fn undo(&mut self, display: &mut dyn DisplayLayer) -> Result<bool, SculptError> {
        if self.tool.is_active() {
            self.end_stroke(display);
        }
        let undone = self.undo.undo(&mut self.mesh)?;
        if undone {
            self.mesh.finish_local_edit(display);
        }
        Ok(undone)
    }
}
