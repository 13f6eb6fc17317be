//! Brush: displaces positions along the picked normal, or flattens them
//! toward an offset area plane in clay mode.

use glam::Vec3;
use sculpt_config::{BrushSettings, StrokeSettings};
use tracing::{trace, warn};

use super::{EditSet, SkipReason, StrokeKernel, TouchedRegion};
use crate::display::RefreshScope;
use crate::mesh::{FalloffReference, SurfaceMesh};
use crate::picking::PickingResult;

/// Smooth brush falloff over normalized distance: `3d⁴ - 4d³ + 1`.
///
/// 1 at the center, 0 with zero slope at the rim.
#[inline]
pub fn brush_falloff(dist: f32) -> f32 {
    let d2 = dist * dist;
    3.0 * d2 * d2 - 4.0 * d2 * dist + 1.0
}

#[derive(Debug, Clone, Default)]
pub struct Brush {
    pub settings: BrushSettings,
}

impl Brush {
    pub fn new(settings: BrushSettings) -> Self {
        Self { settings }
    }

    /// Falloff reference for a tick.
    ///
    /// Accumulating strokes and lock-replay read the live surface (in lock
    /// mode it was just restored from the proxy); otherwise every tick of the
    /// stroke is measured against the stroke-start snapshot.
    pub fn reference(&self, lock: bool) -> FalloffReference {
        if self.settings.accumulate || lock {
            FalloffReference::Live
        } else {
            FalloffReference::Proxy
        }
    }

    fn direct(
        &self,
        mesh: &mut SurfaceMesh,
        edit: &EditSet,
        picking: &PickingResult,
        reference: FalloffReference,
    ) {
        let radius = picking.radius();
        let mut deform_intensity = edit.intensity * radius * 0.1;
        if self.settings.negative {
            deform_intensity = -deform_intensity;
        }
        let center = picking.intersection_point;
        let normal = picking.picked_normal;

        let attrs = mesh.attributes_mut();
        for vertex in &edit.vertices {
            let i = vertex.index();
            let base = attrs.reference_position(*vertex, reference);
            let dist = base.distance(center) / radius;
            if dist >= 1.0 {
                continue;
            }
            let fall_off = brush_falloff(dist)
                * attrs.materials[i].mask
                * deform_intensity
                * picking.alpha(base);
            attrs.positions[i] = base + normal * fall_off;
        }
    }

    fn flatten(
        &self,
        mesh: &mut SurfaceMesh,
        edit: &EditSet,
        picking: &PickingResult,
        reference: FalloffReference,
        plane_point: Vec3,
        plane_normal: Vec3,
    ) {
        let radius = picking.radius();
        let center = picking.intersection_point;

        let attrs = mesh.attributes_mut();
        for vertex in &edit.vertices {
            let i = vertex.index();
            let base = attrs.reference_position(*vertex, reference);
            let dist = base.distance(center) / radius;
            if dist >= 1.0 {
                continue;
            }
            let to_plane = (base - plane_point).dot(plane_normal);
            let fall_off = brush_falloff(dist)
                * to_plane
                * edit.intensity
                * attrs.materials[i].mask
                * picking.alpha(base);
            attrs.positions[i] = base - plane_normal * fall_off;
        }
    }
}

impl StrokeKernel for Brush {
    fn stroke_settings(&self) -> &StrokeSettings {
        &self.settings.stroke
    }

    fn refreshes_proxy(&self, lock: bool) -> bool {
        !self.settings.accumulate || lock
    }

    fn apply(
        &self,
        mesh: &mut SurfaceMesh,
        edit: &EditSet,
        picking: &PickingResult,
    ) -> Result<(), SkipReason> {
        if picking.radius() <= f32::EPSILON {
            return Err(SkipReason::ZeroRadius);
        }
        let reference = self.reference(edit.lock);

        if !self.settings.clay {
            self.direct(mesh, edit, picking, reference);
            return Ok(());
        }

        let Some(plane) = mesh.area_plane(&edit.front, reference) else {
            warn!(
                "Clay brush: degenerate area plane over {} front vertices, skipping tick",
                edit.front.len()
            );
            return Err(SkipReason::DegeneratePlane);
        };
        let mut offset = picking.radius() * 0.1;
        if self.settings.negative {
            offset = -offset;
        }
        let plane_point = plane.center + plane.normal * offset;
        trace!("Clay plane through {:?} along {:?}", plane_point, plane.normal);
        self.flatten(mesh, edit, picking, reference, plane_point, plane.normal);
        Ok(())
    }

    fn commit(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion) {
        mesh.update_geometry(&region.faces, &region.vertices);
    }

    fn rollback(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion) {
        mesh.restore_positions_from_proxy(&region.vertices);
        mesh.update_geometry(&region.faces, &region.vertices);
    }

    fn refresh_scope(&self) -> RefreshScope {
        RefreshScope::Geometry
    }
}
