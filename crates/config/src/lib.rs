//! Shared configuration for the sculpting engine
//!
//! This crate provides the single source of truth for tool settings and
//! display-update tuning. Every struct deserializes from partial documents
//! (missing fields fall back to their defaults), so a front-end can persist
//! only what the user changed.

use serde::{Deserialize, Serialize};

/// Default brush intensity
pub const DEFAULT_BRUSH_INTENSITY: f32 = 0.5;

/// Default paint intensity
pub const DEFAULT_PAINT_INTENSITY: f32 = 0.75;

/// Default paint hardness (0.0 = soft gradient, 1.0 = hard disc)
pub const DEFAULT_PAINT_HARDNESS: f32 = 0.75;

/// Default albedo used by the paint tool
pub const DEFAULT_PAINT_COLOR: [f32; 3] = [1.0, 0.766, 0.336];

/// Fraction of the mesh faces above which local-edit extraction is abandoned
pub const DEFAULT_MAX_TOUCHED_RATIO: f64 = 0.3;

/// Meshes with fewer triangles than this are always refreshed in full
pub const DEFAULT_LOCAL_EDIT_MIN_TRIANGLES: usize = 20_000;

/// Upper bound on the lock-replay radius, in screen pixels
pub const DEFAULT_MAX_LOCK_RADIUS: f32 = 500.0;

/// Settings shared by every stroke tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeSettings {
    /// Tool strength before pressure (0.0 to 1.0)
    pub intensity: f32,
    /// Restrict edits to vertices facing the eye
    pub culling: bool,
    /// Replay the stroke at the anchor with a pointer-driven radius
    pub lock_position: bool,
    /// Dab spacing as a fraction of the screen radius (0.0 = every tick)
    pub spacing: f32,
    /// Cap applied to the lock-replay radius, in screen pixels
    pub max_lock_radius: f32,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            intensity: DEFAULT_BRUSH_INTENSITY,
            culling: false,
            lock_position: false,
            spacing: 0.15,
            max_lock_radius: DEFAULT_MAX_LOCK_RADIUS,
        }
    }
}

impl StrokeSettings {
    /// Stroke settings with a given intensity and defaults elsewhere
    pub fn with_intensity(intensity: f32) -> Self {
        Self {
            intensity,
            ..Default::default()
        }
    }
}

/// Brush (position displacement) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    pub stroke: StrokeSettings,
    /// Invert the displacement direction
    pub negative: bool,
    /// Flatten toward an offset area plane instead of pushing along the picked normal
    pub clay: bool,
    /// Measure falloff from the live surface instead of the stroke-start proxy
    pub accumulate: bool,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            stroke: StrokeSettings::with_intensity(DEFAULT_BRUSH_INTENSITY),
            negative: false,
            clay: true,
            accumulate: true,
        }
    }
}

/// Paint (color and material blend) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintSettings {
    pub stroke: StrokeSettings,
    pub hardness: f32,
    /// Target albedo
    pub color: [f32; 3],
    pub roughness: f32,
    pub metallic: f32,
}

impl Default for PaintSettings {
    fn default() -> Self {
        Self {
            stroke: StrokeSettings::with_intensity(DEFAULT_PAINT_INTENSITY),
            hardness: DEFAULT_PAINT_HARDNESS,
            color: DEFAULT_PAINT_COLOR,
            roughness: 0.3,
            metallic: 0.95,
        }
    }
}

/// Local-edit (partial display upload) tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEditConfig {
    /// Whether partial uploads are attempted at all
    pub enabled: bool,
    /// Touched-face fraction above which a full refresh is cheaper
    pub max_touched_ratio: f64,
    /// Meshes below this triangle count always refresh in full
    pub min_triangles: usize,
}

impl Default for LocalEditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_touched_ratio: DEFAULT_MAX_TOUCHED_RATIO,
            min_triangles: DEFAULT_LOCAL_EDIT_MIN_TRIANGLES,
        }
    }
}

impl LocalEditConfig {
    /// Defaults with the `enabled` flag taken from `SCULPT_LOCAL_EDIT`
    pub fn from_env() -> Self {
        Self {
            enabled: local_edit_flag(std::env::var("SCULPT_LOCAL_EDIT").ok().as_deref()),
            ..Default::default()
        }
    }

    /// Largest number of unique touched faces still served by the compact path.
    pub fn max_local_faces(&self, total_faces: usize) -> usize {
        let exact = self.max_touched_ratio * total_faces as f64;
        // 0.3 * N can land a few ulps above an integer; snap before taking the ceiling
        let nearest = exact.round();
        let limit = if (exact - nearest).abs() <= nearest.abs() * 1e-9 {
            nearest
        } else {
            exact.ceil()
        };
        limit.max(0.0) as usize
    }
}

fn local_edit_flag(value: Option<&str>) -> bool {
    !matches!(value, Some("off" | "0" | "false"))
}

/// Octree tuning for the default spatial index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Maximum depth of the octree.
    pub max_depth: u32,
    /// Maximum items per leaf node before splitting.
    pub max_items_per_leaf: usize,
    /// Minimum node size (prevents infinite subdivision).
    pub min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_items_per_leaf: 16,
            min_node_size: 0.01,
        }
    }
}

/// Aggregate configuration for a sculpt session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SculptConfig {
    pub brush: BrushSettings,
    pub paint: PaintSettings,
    pub local_edit: LocalEditConfig,
    pub octree: OctreeConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tool_settings() {
        let brush = BrushSettings::default();
        assert_eq!(brush.stroke.intensity, DEFAULT_BRUSH_INTENSITY);
        assert!(brush.clay);
        assert!(brush.accumulate);
        assert!(!brush.negative);

        let paint = PaintSettings::default();
        assert_eq!(paint.stroke.intensity, DEFAULT_PAINT_INTENSITY);
        assert_eq!(paint.hardness, DEFAULT_PAINT_HARDNESS);
        assert_eq!(paint.color, DEFAULT_PAINT_COLOR);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SculptConfig =
            serde_json::from_str(r#"{ "brush": { "negative": true }, "local_edit": { "min_triangles": 0 } }"#)
                .unwrap();
        assert!(config.brush.negative);
        assert!(config.brush.clay);
        assert_eq!(config.local_edit.min_triangles, 0);
        assert_eq!(config.local_edit.max_touched_ratio, DEFAULT_MAX_TOUCHED_RATIO);
        assert_eq!(config.paint, PaintSettings::default());
    }

    #[test]
    fn test_max_local_faces() {
        let config = LocalEditConfig::default();
        assert_eq!(config.max_local_faces(10), 3);
        assert_eq!(config.max_local_faces(7), 3);
        assert_eq!(config.max_local_faces(100), 30);
        assert_eq!(config.max_local_faces(0), 0);
    }

    #[test]
    fn test_max_local_faces_on_large_meshes() {
        let config = LocalEditConfig::default();
        assert_eq!(config.max_local_faces(10_000), 3_000);
        assert_eq!(config.max_local_faces(20_000), 6_000);
        assert_eq!(config.max_local_faces(100_000), 30_000);
        assert_eq!(config.max_local_faces(1_000_000), 300_000);
        assert_eq!(config.max_local_faces(1_000_001), 300_001);

        let loaded: LocalEditConfig = serde_json::from_str(r#"{ "max_touched_ratio": 0.3 }"#).unwrap();
        assert_eq!(loaded.max_local_faces(20_000), 6_000);
    }

    #[test]
    fn test_local_edit_flag() {
        assert!(local_edit_flag(None));
        assert!(local_edit_flag(Some("on")));
        assert!(!local_edit_flag(Some("off")));
        assert!(!local_edit_flag(Some("0")));
    }
}
