//! Paint: blends vertex colors, roughness and metallic toward the tool's
//! target values.

use glam::Vec3;
use sculpt_config::{PaintSettings, StrokeSettings};
use tracing::debug;

use super::{EditSet, SkipReason, StrokeKernel, TouchedRegion};
use crate::display::RefreshScope;
use crate::mesh::SurfaceMesh;
use crate::picking::PickingResult;
use crate::types::{blend, blend_vec3, VertexId};
use crate::undo::UndoLog;

/// Paint falloff `(1 - d)^(2 (1 - hardness))`, with `d` and the result
/// clamped to [0, 1].
#[inline]
pub fn paint_falloff(dist: f32, hardness: f32) -> f32 {
    let softness = 2.0 * (1.0 - hardness);
    (1.0 - dist.clamp(0.0, 1.0)).powf(softness).clamp(0.0, 1.0)
}

/// Color and material sampled from the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickedColor {
    pub color: Vec3,
    pub roughness: f32,
    pub metallic: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Paint {
    pub settings: PaintSettings,
}

impl Paint {
    pub fn new(settings: PaintSettings) -> Self {
        Self { settings }
    }

    fn target_color(&self) -> Vec3 {
        Vec3::from_array(self.settings.color)
    }

    /// Blend every unmasked vertex toward the target, weighted by its mask.
    ///
    /// Pushes a full color/material snapshot first and resyncs every derived
    /// buffer. Returns the painted vertices.
    pub fn paint_all(&self, mesh: &mut SurfaceMesh, undo: &mut dyn UndoLog) -> Vec<VertexId> {
        let vertices = mesh.unmasked_vertices();
        if vertices.is_empty() {
            return vertices;
        }
        undo.push_colors_and_materials(mesh);

        let color = self.target_color();
        let attrs = mesh.attributes_mut();
        for vertex in &vertices {
            let i = vertex.index();
            let fall_off = attrs.materials[i].mask;
            attrs.colors[i] = blend_vec3(attrs.colors[i], color, fall_off);
            let material = &mut attrs.materials[i];
            material.roughness = blend(material.roughness, self.settings.roughness, fall_off);
            material.metallic = blend(material.metallic, self.settings.metallic, fall_off);
        }

        mesh.update_duplicate_colors_and_materials(None);
        mesh.update_flat_shading(None);
        debug!("Paint all: {} vertices", vertices.len());
        vertices
    }

    /// Color and material of the picked face at the intersection point.
    ///
    /// Corners are weighted by inverse distance; a corner hit exactly wins.
    pub fn pick_color(mesh: &SurfaceMesh, picking: &PickingResult) -> PickedColor {
        let face = &mesh.faces()[picking.picked_face.index()];
        let positions = mesh.positions();
        let colors = mesh.colors();
        let materials = mesh.materials();

        let mut weight_sum = 0.0f32;
        let mut color = Vec3::ZERO;
        let mut roughness = 0.0f32;
        let mut metallic = 0.0f32;
        for vertex in face.vertices() {
            let i = vertex.index();
            let dist = positions[i].distance(picking.intersection_point);
            if dist <= 1e-6 {
                return PickedColor {
                    color: colors[i],
                    roughness: materials[i].roughness,
                    metallic: materials[i].metallic,
                };
            }
            let weight = 1.0 / dist;
            weight_sum += weight;
            color += colors[i] * weight;
            roughness += materials[i].roughness * weight;
            metallic += materials[i].metallic * weight;
        }

        PickedColor {
            color: color / weight_sum,
            roughness: roughness / weight_sum,
            metallic: metallic / weight_sum,
        }
    }

    /// Adopt a picked color as the paint target.
    pub fn set_target(&mut self, picked: PickedColor) {
        self.settings.color = picked.color.to_array();
        self.settings.roughness = picked.roughness;
        self.settings.metallic = picked.metallic;
    }
}

impl StrokeKernel for Paint {
    fn stroke_settings(&self) -> &StrokeSettings {
        &self.settings.stroke
    }

    fn refreshes_proxy(&self, lock: bool) -> bool {
        lock
    }

    fn on_stroke_start(&self, mesh: &SurfaceMesh, undo: &mut dyn UndoLog) {
        undo.push_colors_and_materials(mesh);
    }

    fn apply(
        &self,
        mesh: &mut SurfaceMesh,
        edit: &EditSet,
        picking: &PickingResult,
    ) -> Result<(), SkipReason> {
        let radius = picking.radius();
        if radius <= f32::EPSILON {
            return Err(SkipReason::ZeroRadius);
        }
        let center = picking.intersection_point;
        let color = self.target_color();
        let hardness = self.settings.hardness;

        let attrs = mesh.attributes_mut();
        for vertex in &edit.vertices {
            let i = vertex.index();
            let position = attrs.positions[i];
            let dist = position.distance(center) / radius;
            let fall_off = (paint_falloff(dist, hardness)
                * edit.intensity
                * attrs.materials[i].mask
                * picking.alpha(position))
            .clamp(0.0, 1.0);

            attrs.colors[i] = blend_vec3(attrs.colors[i], color, fall_off);
            let material = &mut attrs.materials[i];
            material.roughness = blend(material.roughness, self.settings.roughness, fall_off);
            material.metallic = blend(material.metallic, self.settings.metallic, fall_off);
        }
        Ok(())
    }

    fn commit(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion) {
        mesh.update_duplicate_colors_and_materials(Some(&region.vertices));
        mesh.update_flat_shading(Some(&region.faces));
        mesh.mark_faces_touched(&region.faces);
    }

    fn rollback(&self, mesh: &mut SurfaceMesh, region: &TouchedRegion) {
        mesh.restore_appearance_from_proxy(&region.vertices);
        self.commit(mesh, region);
    }

    fn refresh_scope(&self) -> RefreshScope {
        RefreshScope::Appearance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_support::grid_mesh;
    use crate::picking::{pick, PickRequest};
    use crate::types::Material;
    use crate::undo::MeshUndoLog;

    fn black_grid() -> SurfaceMesh {
        grid_mesh(4).with_colors(vec![Vec3::ZERO; 25]).unwrap()
    }

    fn white_paint(intensity: f32) -> Paint {
        Paint::new(PaintSettings {
            stroke: StrokeSettings::with_intensity(intensity),
            hardness: 1.0,
            color: [1.0, 1.0, 1.0],
            ..Default::default()
        })
    }

    fn paint_center(paint: &Paint, mesh: &mut SurfaceMesh) {
        let request = PickRequest::new(Vec3::new(2.05, 2.05, 10.0), Vec3::NEG_Z, 100.0, 0.01);
        let picking = pick(mesh, &request).unwrap().unwrap();
        let edit = EditSet {
            vertices: picking.picked_vertices.clone(),
            front: Vec::new(),
            intensity: paint.settings.stroke.intensity,
            lock: false,
        };
        paint.apply(mesh, &edit, &picking).unwrap();
    }

    #[test]
    fn test_paint_falloff_shape() {
        assert_eq!(paint_falloff(0.0, 0.5), 1.0);
        assert_eq!(paint_falloff(1.0, 0.5), 0.0);
        // hardness 1 is a hard disc
        assert_eq!(paint_falloff(0.9, 1.0), 1.0);
        // out-of-range distances are clamped
        assert_eq!(paint_falloff(1.5, 0.5), 0.0);
        assert_eq!(paint_falloff(-0.5, 0.5), 1.0);
    }

    #[test]
    fn test_paint_blend_end_to_end() {
        let mut half = black_grid();
        paint_center(&white_paint(0.5), &mut half);
        assert!((half.colors()[12] - Vec3::splat(0.5)).length() < 1e-6);

        let mut none = black_grid();
        paint_center(&white_paint(0.0), &mut none);
        assert_eq!(none.colors()[12], Vec3::ZERO);

        let mut full = black_grid();
        paint_center(&white_paint(1.0), &mut full);
        assert_eq!(full.colors()[12], Vec3::ONE);
        assert_eq!(full.materials()[12].roughness, 0.3);
        assert_eq!(full.materials()[12].metallic, 0.95);
    }

    #[test]
    fn test_mask_protects_color() {
        let mut materials = vec![Material::default(); 25];
        materials[12].mask = 0.0;
        let mut mesh = black_grid().with_materials(materials).unwrap();
        paint_center(&white_paint(1.0), &mut mesh);
        assert_eq!(mesh.colors()[12], Vec3::ZERO);
        assert_eq!(mesh.colors()[13], Vec3::ONE);
    }

    #[test]
    fn test_paint_all_weights_by_mask() {
        let mut materials = vec![Material::default(); 25];
        materials[0].mask = 0.0;
        materials[1].mask = 0.5;
        let mut mesh = black_grid().with_materials(materials).unwrap().with_flat_shading();
        let mut undo = MeshUndoLog::default();

        let painted = white_paint(1.0).paint_all(&mut mesh, &mut undo);
        assert_eq!(painted.len(), 24);
        assert_eq!(mesh.colors()[0], Vec3::ZERO);
        assert!((mesh.colors()[1] - Vec3::splat(0.5)).length() < 1e-6);
        assert_eq!(mesh.colors()[2], Vec3::ONE);
        assert_eq!(undo.pending_len(), 25);
        let flat = mesh.flat_shading().unwrap();
        assert!(flat.colors.iter().any(|c| *c == Vec3::ONE));
    }

    #[test]
    fn test_pick_color_interpolates_face() {
        let mut colors = vec![Vec3::ZERO; 25];
        colors[12] = Vec3::ONE;
        let mesh = grid_mesh(4).with_colors(colors).unwrap();

        let exact = PickRequest::new(Vec3::new(2.0, 2.0, 10.0), Vec3::NEG_Z, 10.0, 0.01);
        let picking = pick(&mesh, &exact).unwrap().unwrap();
        let picked = Paint::pick_color(&mesh, &picking);
        assert!((picked.color - Vec3::ONE).length() < 1e-5);

        let between = PickRequest::new(Vec3::new(2.5, 2.5, 10.0), Vec3::NEG_Z, 10.0, 0.01);
        let picking = pick(&mesh, &between).unwrap().unwrap();
        let picked = Paint::pick_color(&mesh, &picking);
        // four equidistant corners, one white
        assert!((picked.color - Vec3::splat(0.25)).length() < 1e-5);
        assert!((picked.roughness - Material::default().roughness).abs() < 1e-6);
    }
}
