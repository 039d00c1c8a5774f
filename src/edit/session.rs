//! Interactive brush settings.

use glam::UVec3;

use crate::dag::VbrColor;
use crate::edit::editor::EditMode;
use crate::edit::sphere::SphereBrush;

/// Largest radius the sphere predicates accept without risking
/// wide-arithmetic overflow in their distance bounds.
pub const MAX_BRUSH_RADIUS: f32 = 2048.0;

/// Current brush parameters of an interactive session.
///
/// Holds what the UI adjusts between strokes; each cursor hit turns the
/// settings into a concrete sphere predicate.
#[derive(Clone, Copy, Debug)]
pub struct BrushSettings {
    /// Brush radius in voxels.
    pub radius: f32,
    /// Color applied by fill and paint strokes.
    pub color: VbrColor,
    /// When set, apply strokes recolor existing voxels instead of adding.
    pub paint: bool,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 8.0,
            color: VbrColor::rgb8(0xffffff),
            paint: false,
        }
    }
}

impl BrushSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the radius, clamped to the supported range.
    pub fn set_radius(&mut self, radius: f32) -> &mut Self {
        self.radius = radius.clamp(0.5, MAX_BRUSH_RADIUS);
        self
    }

    pub fn set_color(&mut self, color: VbrColor) -> &mut Self {
        self.color = color;
        self
    }

    pub fn set_paint(&mut self, paint: bool) -> &mut Self {
        self.paint = paint;
        self
    }

    /// Brush for the primary action at a cursor hit: fill, or paint when
    /// paint mode is on.
    pub fn apply_brush(&self, hit: UVec3) -> SphereBrush {
        let mode = if self.paint {
            EditMode::Paint
        } else {
            EditMode::Fill
        };
        SphereBrush::new(mode, hit, self.radius, self.color)
    }

    /// Brush for the secondary action: carve a sphere out.
    pub fn dig_brush(&self, hit: UVec3) -> SphereBrush {
        SphereBrush::new(EditMode::Dig, hit, self.radius, VbrColor::UNSET)
    }
}
