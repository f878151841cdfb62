use eframe::egui::emath::TSTransform;
use eframe::egui::{Pos2, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: 0.5,
            max: 2.0,
            step: 0.1,
        }
    }
}

/// Zoom and pan of the presented content.
///
/// `offset` is in unscaled content coordinates: the CSS equivalent is
/// `scale(s) translate(x, y)` with `transform-origin: center top`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    pub scale: f32,
    pub offset: Vec2,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

/// Snap to the step grid through 1.0 so repeated steps never drift.
fn snap(value: f32, step: f32) -> f32 {
    let on_grid = 1.0 + ((value - 1.0) / step).round() * step;
    (on_grid * 10_000.0).round() / 10_000.0
}

impl TransformState {
    pub fn can_zoom_in(&self, limits: &ZoomLimits) -> bool {
        self.scale < limits.max
    }

    pub fn can_zoom_out(&self, limits: &ZoomLimits) -> bool {
        self.scale > limits.min
    }

    pub fn zoom_in(&mut self, limits: &ZoomLimits) -> bool {
        if !self.can_zoom_in(limits) {
            return false;
        }
        let next = snap(self.scale + limits.step, limits.step).min(limits.max);
        let changed = next > self.scale;
        if changed {
            self.scale = next;
        }
        changed
    }

    pub fn zoom_out(&mut self, limits: &ZoomLimits) -> bool {
        if !self.can_zoom_out(limits) {
            return false;
        }
        let next = snap(self.scale - limits.step, limits.step).max(limits.min);
        let changed = next < self.scale;
        if changed {
            self.scale = next;
        }
        changed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Move the content so that it sits `delta` screen pixels away from where it
    /// was when the gesture started. Dividing by the scale keeps the content
    /// under the pointer at every zoom level.
    pub fn pan(&mut self, start_offset: Vec2, delta: Vec2) {
        self.offset = start_offset + delta / self.scale;
    }

    pub fn zoom_label(&self) -> String {
        format!("{}%", (self.scale * 100.0).round() as i32)
    }

    pub fn css(&self) -> String {
        format!(
            "scale({}) translate({}px, {}px)",
            self.scale, self.offset.x, self.offset.y
        )
    }

    /// Maps a content-local point `p` to `origin + (p - origin + offset) * scale`.
    pub fn affine(&self, origin: Pos2) -> TSTransform {
        let translation = origin.to_vec2() * (1.0 - self.scale) + self.offset * self.scale;
        TSTransform::new(translation, self.scale)
    }
}
