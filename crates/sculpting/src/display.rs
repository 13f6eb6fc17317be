//! Display-layer contract.
//!
//! The engine never talks to a graphics API. After an edit it hands a
//! [`RenderBuffers`] view to a [`DisplayLayer`], which uploads whichever
//! buffers the edit invalidated.

use std::borrow::Cow;

use glam::Vec3;

use crate::types::Material;

/// Which buffer set a [`RenderBuffers`] view was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Every vertex, seam duplicates appended
    Full,
    /// One render vertex per triangle corner
    Flat,
    /// Compact sub-mesh of the recently touched faces
    Local,
}

/// Buffers invalidated by an edit, for full (non-local) uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    /// Positions and normals
    Geometry,
    /// Colors and materials
    Appearance,
    /// Everything including the index buffer
    All,
}

/// A borrowed or assembled view of the buffers to draw.
#[derive(Debug, Clone)]
pub struct RenderBuffers<'a> {
    pub kind: BufferKind,
    pub indices: Cow<'a, [u32]>,
    pub positions: Cow<'a, [Vec3]>,
    pub normals: Cow<'a, [Vec3]>,
    pub colors: Cow<'a, [Vec3]>,
    pub materials: Cow<'a, [Material]>,
}

impl RenderBuffers<'_> {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&*self.indices)
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&*self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&*self.normals)
    }

    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&*self.colors)
    }

    pub fn material_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&*self.materials)
    }
}

/// Receiver of buffer uploads (typically a GPU renderer).
pub trait DisplayLayer {
    fn update_index_buffer(&mut self, buffers: &RenderBuffers<'_>);
    fn update_geometry_buffers(&mut self, buffers: &RenderBuffers<'_>);
    fn update_color_buffer(&mut self, buffers: &RenderBuffers<'_>);
    fn update_material_buffer(&mut self, buffers: &RenderBuffers<'_>);
}

/// Upload everything `scope` covers.
pub fn upload(display: &mut dyn DisplayLayer, buffers: &RenderBuffers<'_>, scope: RefreshScope) {
    match scope {
        RefreshScope::Geometry => display.update_geometry_buffers(buffers),
        RefreshScope::Appearance => {
            display.update_color_buffer(buffers);
            display.update_material_buffer(buffers);
        }
        RefreshScope::All => {
            display.update_index_buffer(buffers);
            display.update_geometry_buffers(buffers);
            display.update_color_buffer(buffers);
            display.update_material_buffer(buffers);
        }
    }
}

/// Which buffer an upload targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSlot {
    Index,
    Geometry,
    Color,
    Material,
}

/// One recorded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub slot: BufferSlot,
    pub kind: BufferKind,
    pub bytes: usize,
    pub vertices: usize,
}

/// Headless display that records what it was sent.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub uploads: Vec<Upload>,
    /// Positions of the last geometry upload
    pub last_positions: Vec<Vec3>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.uploads.clear();
    }

    pub fn bytes_uploaded(&self) -> usize {
        self.uploads.iter().map(|u| u.bytes).sum()
    }

    fn record(&mut self, slot: BufferSlot, buffers: &RenderBuffers<'_>, bytes: usize) {
        self.uploads.push(Upload {
            slot,
            kind: buffers.kind,
            bytes,
            vertices: buffers.vertex_count(),
        });
    }
}

impl DisplayLayer for RecordingDisplay {
    fn update_index_buffer(&mut self, buffers: &RenderBuffers<'_>) {
        self.record(BufferSlot::Index, buffers, buffers.index_bytes().len());
    }

    fn update_geometry_buffers(&mut self, buffers: &RenderBuffers<'_>) {
        let bytes = buffers.position_bytes().len() + buffers.normal_bytes().len();
        self.record(BufferSlot::Geometry, buffers, bytes);
        self.last_positions = buffers.positions.to_vec();
    }

    fn update_color_buffer(&mut self, buffers: &RenderBuffers<'_>) {
        self.record(BufferSlot::Color, buffers, buffers.color_bytes().len());
    }

    fn update_material_buffer(&mut self, buffers: &RenderBuffers<'_>) {
        self.record(BufferSlot::Material, buffers, buffers.material_bytes().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_buffers() -> RenderBuffers<'static> {
        RenderBuffers {
            kind: BufferKind::Full,
            indices: Cow::Owned(vec![0, 1, 2]),
            positions: Cow::Owned(vec![Vec3::ZERO, Vec3::X, Vec3::Y]),
            normals: Cow::Owned(vec![Vec3::Z; 3]),
            colors: Cow::Owned(vec![Vec3::ONE; 3]),
            materials: Cow::Owned(vec![Material::default(); 3]),
        }
    }

    #[test]
    fn test_upload_scopes() {
        let buffers = triangle_buffers();
        let mut display = RecordingDisplay::new();

        upload(&mut display, &buffers, RefreshScope::Geometry);
        assert_eq!(display.uploads.len(), 1);
        assert_eq!(display.uploads[0].slot, BufferSlot::Geometry);
        assert_eq!(display.uploads[0].bytes, 3 * 12 * 2);

        display.clear();
        upload(&mut display, &buffers, RefreshScope::Appearance);
        let slots: Vec<_> = display.uploads.iter().map(|u| u.slot).collect();
        assert_eq!(slots, vec![BufferSlot::Color, BufferSlot::Material]);

        display.clear();
        upload(&mut display, &buffers, RefreshScope::All);
        assert_eq!(display.uploads.len(), 4);
        assert_eq!(display.uploads[0].bytes, 12);
        assert_eq!(display.last_positions.len(), 3);
    }
}
