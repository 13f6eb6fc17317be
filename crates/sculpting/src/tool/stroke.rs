//! Shared stroke driver.
//!
//! `Idle -> Active -> Idle`. Normal ticks pick under the pointer, spaced
//! along the pointer path. Lock-position ticks roll back the previous tick
//! from the proxy and replay the stroke at the anchor with a radius taken
//! from the pointer's distance to the anchor.

use std::sync::Arc;

use glam::Vec2;
use tracing::{debug, trace};

use super::{EditSet, SkipReason, StrokeKernel, StrokeOutcome, ToolKernel, TouchedRegion};
use crate::error::{check_vertex_ids, SculptError};
use crate::mesh::SurfaceMesh;
use crate::picking::{pick, AlphaMask, PickRequest, PickingResult, SymmetryMirror};
use crate::remesh::Remesher;
use crate::types::Side;
use crate::undo::UndoLog;

/// One pointer sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeInput {
    /// Pointer position in screen pixels
    pub cursor: Vec2,
    pub request: PickRequest,
    /// Tablet pressure in [0, 1]
    pub pressure: f32,
}

impl StrokeInput {
    pub fn new(cursor: Vec2, request: PickRequest) -> Self {
        Self {
            cursor,
            request,
            pressure: 1.0,
        }
    }

    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = pressure.clamp(0.0, 1.0);
        self
    }
}

/// Everything a tool call borrows besides the tool itself.
pub struct StrokeContext<'a> {
    pub mesh: &'a mut SurfaceMesh,
    pub undo: &'a mut dyn UndoLog,
    pub remesher: &'a mut dyn Remesher,
    pub mirror: Option<&'a dyn SymmetryMirror>,
    pub alpha: Option<Arc<dyn AlphaMask>>,
}

#[derive(Debug, Clone)]
struct ActiveStroke {
    anchor: StrokeInput,
    last: StrokeInput,
    /// Indexed by [`Side::slot`]
    last_touched: [Option<TouchedRegion>; 2],
}

#[derive(Debug, Clone)]
enum StrokeState {
    Idle,
    Active(ActiveStroke),
}

#[derive(Debug, Clone)]
pub struct StrokeTool {
    kernel: ToolKernel,
    state: StrokeState,
}

impl StrokeTool {
    pub fn new(kernel: ToolKernel) -> Self {
        Self {
            kernel,
            state: StrokeState::Idle,
        }
    }

    pub fn kernel(&self) -> &ToolKernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut ToolKernel {
        &mut self.kernel
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, StrokeState::Active(_))
    }

    /// What the previous tick touched on `side`, if anything.
    pub fn last_touched(&self, side: Side) -> Option<&TouchedRegion> {
        match &self.state {
            StrokeState::Active(active) => active.last_touched[side.slot()].as_ref(),
            StrokeState::Idle => None,
        }
    }

    /// Begin a stroke at `input`.
    ///
    /// Snapshots the proxy generation and, outside lock mode, applies the
    /// first dab.
    pub fn start(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        input: StrokeInput,
    ) -> Result<StrokeOutcome, SculptError> {
        ctx.mesh.begin_proxy_stroke();
        self.kernel.on_stroke_start(ctx.mesh, ctx.undo);
        self.state = StrokeState::Active(ActiveStroke {
            anchor: input,
            last: input,
            last_touched: [None, None],
        });
        debug!("{} stroke started", self.kernel.name());

        if self.kernel.stroke_settings().lock_position {
            return Ok(StrokeOutcome::Skipped(SkipReason::LockAwaitingDrag));
        }
        self.make_stroke(ctx, &input.request, input.pressure, None)
    }

    /// Feed a pointer sample.
    pub fn update(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        input: StrokeInput,
    ) -> Result<StrokeOutcome, SculptError> {
        let last = match &self.state {
            StrokeState::Active(active) => active.last,
            StrokeState::Idle => return Ok(StrokeOutcome::Skipped(SkipReason::Inactive)),
        };

        if self.kernel.stroke_settings().lock_position {
            return self.update_lock(ctx, input);
        }

        let spacing = self.kernel.stroke_settings().spacing;
        if spacing <= 0.0 {
            self.set_last(input);
            return self.make_stroke(ctx, &input.request, input.pressure, None);
        }

        let min_spacing = spacing * last.request.screen_radius;
        let dist = input.cursor.distance(last.cursor);
        if dist <= min_spacing {
            return Ok(StrokeOutcome::Skipped(SkipReason::Spacing));
        }

        let dabs = if min_spacing > 0.0 {
            (dist / min_spacing).floor().max(1.0) as usize
        } else {
            1
        };
        trace!("stroke: {} dabs over {:.1} px", dabs, dist);

        let mut outcome = StrokeOutcome::Skipped(SkipReason::Missed);
        for dab in 1..=dabs {
            let t = dab as f32 / dabs as f32;
            let request = last.request.lerp(&input.request, t);
            let pressure = last.pressure + (input.pressure - last.pressure) * t;
            let result = self.make_stroke(ctx, &request, pressure, None)?;
            if result == StrokeOutcome::Skipped(SkipReason::Missed) {
                break;
            }
            if result.is_applied() || !outcome.is_applied() {
                outcome = result;
            }
        }
        self.set_last(input);
        Ok(outcome)
    }

    /// End the stroke. The mesh is consistent after every tick, so this only
    /// resets the state.
    pub fn end(&mut self) {
        if self.is_active() {
            debug!("{} stroke ended", self.kernel.name());
        }
        self.state = StrokeState::Idle;
    }

    fn set_last(&mut self, input: StrokeInput) {
        if let StrokeState::Active(active) = &mut self.state {
            active.last = input;
        }
    }

    fn update_lock(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        input: StrokeInput,
    ) -> Result<StrokeOutcome, SculptError> {
        let StrokeState::Active(active) = &mut self.state else {
            return Ok(StrokeOutcome::Skipped(SkipReason::Inactive));
        };

        // Rollback always precedes the replay
        for slot in &mut active.last_touched {
            if let Some(region) = slot.take() {
                self.kernel.rollback(ctx.mesh, &region);
            }
        }

        let anchor = active.anchor;
        active.last = input;
        let max_radius = self.kernel.stroke_settings().max_lock_radius;
        let radius = input.cursor.distance(anchor.cursor).min(max_radius);
        if radius <= 0.0 {
            return Ok(StrokeOutcome::Skipped(SkipReason::ZeroRadius));
        }

        trace!("lock replay at {:?} with radius {:.1}", anchor.cursor, radius);
        let request = anchor.request.with_screen_radius(radius);
        self.make_stroke(ctx, &request, input.pressure, Some(radius))
    }

    /// Pick and stroke the primary side, then the mirrored side.
    fn make_stroke(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        request: &PickRequest,
        pressure: f32,
        display_radius: Option<f32>,
    ) -> Result<StrokeOutcome, SculptError> {
        let Some(picking) = self.pick(ctx, request, display_radius)? else {
            return Ok(StrokeOutcome::Skipped(SkipReason::Missed));
        };
        let outcome = self.stroke(ctx, &picking, Side::Primary, pressure)?;

        if let Some(mirror) = ctx.mirror {
            let mirrored = mirror.mirror(request);
            if let Some(picking) = self.pick(ctx, &mirrored, display_radius)? {
                self.stroke(ctx, &picking, Side::Mirrored, pressure)?;
            }
        }
        Ok(outcome)
    }

    fn pick(
        &self,
        ctx: &StrokeContext<'_>,
        request: &PickRequest,
        display_radius: Option<f32>,
    ) -> Result<Option<PickingResult>, SculptError> {
        let Some(picking) = pick(&*ctx.mesh, request)? else {
            return Ok(None);
        };
        let mut picking = picking.with_alpha(ctx.alpha.clone());
        if let Some(radius) = display_radius {
            picking.set_display_radius(radius);
        }
        Ok(Some(picking))
    }

    /// Apply one side of one tick.
    pub fn stroke(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        picking: &PickingResult,
        side: Side,
        pressure: f32,
    ) -> Result<StrokeOutcome, SculptError> {
        let settings = self.kernel.stroke_settings();
        let lock = settings.lock_position;
        let culling = settings.culling;
        let intensity = settings.intensity * pressure;

        let mut vertices = picking.picked_vertices.clone();
        if vertices.is_empty() {
            return Ok(StrokeOutcome::Skipped(SkipReason::EmptyPick));
        }

        let refresh_proxy = self.kernel.refreshes_proxy(lock);
        if refresh_proxy {
            ctx.mesh.refresh_proxy(&vertices);
        }
        ctx.undo.push_vertices(ctx.mesh, &vertices);

        if !lock {
            let refined = ctx.remesher.refine(ctx.mesh, picking);
            check_vertex_ids("remesher", &refined, ctx.mesh.vertex_count())?;
            if refined != vertices {
                // New or different ids still need their pre-edit state
                if refresh_proxy {
                    ctx.mesh.refresh_proxy(&refined);
                }
                ctx.undo.push_vertices(ctx.mesh, &refined);
                vertices = refined;
            }
        }

        let front = ctx.mesh.front_vertices(&vertices, picking.eye_direction);
        if culling {
            vertices = front.clone();
        }

        let edit = EditSet {
            vertices,
            front,
            intensity,
            lock,
        };
        if let Err(reason) = self.kernel.apply(ctx.mesh, &edit, picking) {
            return Ok(StrokeOutcome::Skipped(reason));
        }

        let faces = ctx.mesh.faces_from_vertices(&edit.vertices);
        let region = TouchedRegion {
            vertices: edit.vertices,
            faces,
        };
        self.kernel.commit(ctx.mesh, &region);
        let outcome = StrokeOutcome::Applied {
            vertices: region.vertices.len(),
            faces: region.faces.len(),
        };
        trace!("{:?} side: {:?}", side, outcome);

        if let StrokeState::Active(active) = &mut self.state {
            active.last_touched[side.slot()] = Some(region);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use sculpt_config::{BrushSettings, PaintSettings, StrokeSettings};

    use super::*;
    use crate::mesh::test_support::grid_mesh;
    use crate::picking::PlaneMirror;
    use crate::remesh::StaticTopology;
    use crate::tool::{Brush, Paint};
    use crate::types::VertexId;
    use crate::undo::MeshUndoLog;

    /// Pixels map to world units 1:100; the cursor is the world xy in pixels.
    fn input_at(x: f32, y: f32, screen_radius: f32) -> StrokeInput {
        let request = PickRequest::new(Vec3::new(x, y, 10.0), Vec3::NEG_Z, screen_radius, 0.01);
        StrokeInput::new(Vec2::new(x, y) * 100.0, request)
    }

    struct Harness {
        mesh: SurfaceMesh,
        undo: MeshUndoLog,
        remesher: StaticTopology,
    }

    impl Harness {
        fn new(n: u32) -> Self {
            Self {
                mesh: grid_mesh(n),
                undo: MeshUndoLog::default(),
                remesher: StaticTopology,
            }
        }

        fn ctx(&mut self) -> StrokeContext<'_> {
            StrokeContext {
                mesh: &mut self.mesh,
                undo: &mut self.undo,
                remesher: &mut self.remesher,
                mirror: None,
                alpha: None,
            }
        }
    }

    fn brush_tool(settings: BrushSettings) -> StrokeTool {
        StrokeTool::new(ToolKernel::Brush(Brush::new(settings)))
    }

    fn lock_settings() -> StrokeSettings {
        StrokeSettings {
            lock_position: true,
            ..StrokeSettings::with_intensity(0.5)
        }
    }

    #[test]
    fn test_accumulate_off_ticks_are_deterministic() {
        let settings = BrushSettings {
            accumulate: false,
            clay: false,
            stroke: StrokeSettings {
                spacing: 0.0,
                ..StrokeSettings::with_intensity(0.5)
            },
            ..Default::default()
        };
        let input = input_at(3.05, 3.05, 150.0);

        let mut h = Harness::new(6);
        let picking = pick(&h.mesh, &input.request).unwrap().unwrap();
        let mut tool = brush_tool(settings);
        let mut ctx = h.ctx();
        tool.start(&mut ctx, input).unwrap();
        let once = ctx.mesh.positions().to_vec();
        assert!(once[24].z > 0.0);

        // the same dab repeated over the stroke-start surface
        tool.stroke(&mut ctx, &picking, Side::Primary, 1.0).unwrap();
        tool.stroke(&mut ctx, &picking, Side::Primary, 1.0).unwrap();
        assert_eq!(ctx.mesh.positions(), &once[..]);
    }

    #[test]
    fn test_lock_replay_is_idempotent() {
        let settings = BrushSettings {
            clay: false,
            stroke: lock_settings(),
            ..Default::default()
        };
        let anchor = input_at(3.05, 3.05, 50.0);
        let moved = StrokeInput {
            cursor: anchor.cursor + Vec2::new(120.0, 50.0),
            ..anchor
        };

        let mut once = Harness::new(6);
        let mut tool = brush_tool(settings.clone());
        tool.start(&mut once.ctx(), anchor).unwrap();
        let outcome = tool.update(&mut once.ctx(), moved).unwrap();
        assert!(outcome.is_applied());

        let mut twice = Harness::new(6);
        let mut tool2 = brush_tool(settings);
        tool2.start(&mut twice.ctx(), anchor).unwrap();
        tool2.update(&mut twice.ctx(), moved).unwrap();
        tool2.update(&mut twice.ctx(), moved).unwrap();

        assert_eq!(once.mesh.positions(), twice.mesh.positions());
        // radius sqrt(120² + 50²) = 130 px
        let touched = tool2.last_touched(Side::Primary).unwrap();
        let expected = grid_mesh(6)
            .query_radius(Vec3::new(3.05, 3.05, 0.0), 1.3)
            .unwrap();
        assert_eq!(touched.vertices.len(), expected.len());
    }

    #[test]
    fn test_lock_replay_back_to_anchor_restores_surface() {
        let settings = BrushSettings {
            clay: false,
            stroke: lock_settings(),
            ..Default::default()
        };
        let anchor = input_at(3.05, 3.05, 50.0);
        let moved = StrokeInput {
            cursor: anchor.cursor + Vec2::new(100.0, 0.0),
            ..anchor
        };

        let mut h = Harness::new(6);
        let original = h.mesh.positions().to_vec();
        let mut tool = brush_tool(settings);
        let started = tool.start(&mut h.ctx(), anchor).unwrap();
        assert_eq!(started, StrokeOutcome::Skipped(SkipReason::LockAwaitingDrag));
        assert_eq!(h.mesh.positions(), &original[..]);
        tool.update(&mut h.ctx(), moved).unwrap();
        assert_ne!(h.mesh.positions(), &original[..]);

        let outcome = tool.update(&mut h.ctx(), anchor).unwrap();
        assert_eq!(outcome, StrokeOutcome::Skipped(SkipReason::ZeroRadius));
        assert_eq!(h.mesh.positions(), &original[..]);
    }

    #[test]
    fn test_lock_radius_is_capped() {
        let settings = BrushSettings {
            clay: false,
            stroke: StrokeSettings {
                max_lock_radius: 100.0,
                ..lock_settings()
            },
            ..Default::default()
        };
        let anchor = input_at(3.05, 3.05, 50.0);
        let far = StrokeInput {
            cursor: anchor.cursor + Vec2::new(5000.0, 0.0),
            ..anchor
        };

        let mut h = Harness::new(6);
        let mut tool = brush_tool(settings);
        tool.start(&mut h.ctx(), anchor).unwrap();
        tool.update(&mut h.ctx(), far).unwrap();
        let touched = tool.last_touched(Side::Primary).unwrap();
        // 100 px -> 1.0 world unit around (3.05, 3.05)
        assert_eq!(touched.vertices.len(), 3);
    }

    #[test]
    fn test_spacing_skips_short_moves_and_interpolates() {
        let settings = BrushSettings {
            clay: false,
            ..Default::default()
        };
        let mut h = Harness::new(8);
        let mut tool = brush_tool(settings);
        let start = input_at(2.05, 4.05, 100.0);
        tool.start(&mut h.ctx(), start).unwrap();

        // 0.15 * 100 px = 15 px minimum
        let short = input_at(2.1, 4.05, 100.0);
        assert_eq!(
            tool.update(&mut h.ctx(), short).unwrap(),
            StrokeOutcome::Skipped(SkipReason::Spacing)
        );

        let long = input_at(6.05, 4.05, 100.0);
        assert!(tool.update(&mut h.ctx(), long).unwrap().is_applied());
        // dabs were laid along the path
        let row = 9;
        for x in [3, 4, 5, 6] {
            assert!(h.mesh.positions()[(4 * row + x) as usize].z > 0.0, "x = {}", x);
        }
    }

    #[test]
    fn test_symmetry_records_both_sides() {
        let settings = BrushSettings {
            clay: false,
            ..Default::default()
        };
        let mirror = PlaneMirror::new(Vec3::new(3.0, 0.0, 0.0), Vec3::X);
        let mut h = Harness::new(6);
        let mut tool = brush_tool(settings);
        let mut ctx = h.ctx();
        ctx.mirror = Some(&mirror);
        tool.start(&mut ctx, input_at(1.05, 3.05, 60.0)).unwrap();

        let primary = tool.last_touched(Side::Primary).unwrap();
        let mirrored = tool.last_touched(Side::Mirrored).unwrap();
        // x = 1 on the primary side, x = 5 on the mirrored one
        assert!(primary.vertices.contains(&VertexId(3 * 7 + 1)));
        assert!(mirrored.vertices.contains(&VertexId(3 * 7 + 5)));
        drop(ctx);
        let z1 = h.mesh.positions()[3 * 7 + 1].z;
        let z5 = h.mesh.positions()[3 * 7 + 5].z;
        assert!(z1 > 0.0 && (z1 - z5).abs() < 1e-4);
    }

    #[test]
    fn test_paint_lock_replay_restores_colors() {
        let paint = Paint::new(PaintSettings {
            stroke: lock_settings(),
            hardness: 1.0,
            color: [0.0, 0.0, 0.0],
            ..Default::default()
        });
        let anchor = input_at(3.05, 3.05, 50.0);
        let wide = StrokeInput {
            cursor: anchor.cursor + Vec2::new(200.0, 0.0),
            ..anchor
        };
        let narrow = StrokeInput {
            cursor: anchor.cursor + Vec2::new(60.0, 0.0),
            ..anchor
        };

        let mut h = Harness::new(6);
        let mut tool = StrokeTool::new(ToolKernel::Paint(paint));
        tool.start(&mut h.ctx(), anchor).unwrap();
        tool.update(&mut h.ctx(), wide).unwrap();
        // (5, 3) is 1.95 away: inside the 2.0 radius
        assert!(h.mesh.colors()[3 * 7 + 5].x < 1.0);

        tool.update(&mut h.ctx(), narrow).unwrap();
        assert_eq!(h.mesh.colors()[3 * 7 + 5], Vec3::ONE);
        assert!(h.mesh.colors()[3 * 7 + 3].x < 1.0);
    }

    #[test]
    fn test_undo_restores_stroke() {
        let mut h = Harness::new(4);
        let mut tool = brush_tool(BrushSettings {
            clay: false,
            ..Default::default()
        });
        h.undo.begin_stroke();
        tool.start(&mut h.ctx(), input_at(2.05, 2.05, 100.0)).unwrap();
        tool.end();
        h.undo.end_stroke();
        assert!(h.mesh.positions()[12].z > 0.0);

        assert!(h.undo.undo(&mut h.mesh).unwrap());
        assert_eq!(h.mesh.positions()[12], Vec3::new(2.0, 2.0, 0.0));
    }

    #[derive(Debug)]
    struct BrokenRemesher;

    impl Remesher for BrokenRemesher {
        fn refine(&mut self, _mesh: &mut SurfaceMesh, _picking: &PickingResult) -> Vec<VertexId> {
            vec![VertexId(10_000)]
        }
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "out of range"))]
    fn test_remesher_ids_out_of_range_are_fatal() {
        let mut mesh = grid_mesh(2);
        let mut undo = MeshUndoLog::default();
        let mut remesher = BrokenRemesher;
        let mut ctx = StrokeContext {
            mesh: &mut mesh,
            undo: &mut undo,
            remesher: &mut remesher,
            mirror: None,
            alpha: None,
        };
        let mut tool = brush_tool(BrushSettings::default());
        let result = tool.start(&mut ctx, input_at(1.05, 1.05, 50.0));
        assert!(matches!(result, Err(SculptError::IdOutOfRange { .. })));
    }

    #[test]
    fn test_update_without_start_is_inactive() {
        let mut h = Harness::new(2);
        let mut tool = brush_tool(BrushSettings::default());
        let outcome = tool.update(&mut h.ctx(), input_at(1.0, 1.0, 10.0)).unwrap();
        assert_eq!(outcome, StrokeOutcome::Skipped(SkipReason::Inactive));
    }
}
