use eframe::egui::{Pos2, Vec2};

use super::brush::BrushSettings;
use super::mode::Mode;
use super::transform::TransformState;

/// A pan in progress, measured from where it started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragGesture {
    pub start: Pos2,
    pub start_offset: Vec2,
}

/// State of the one live presentation. Everything here goes back to its
/// default when the presentation ends.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySession {
    pub active: bool,
    pub mode: Mode,
    pub transform: TransformState,
    pub events_bound: bool,
    pub brush: BrushSettings,
    pub drag: Option<DragGesture>,
    /// Vertical scroll of the viewport, in scaled pixels.
    pub scroll_top: f32,
}

impl OverlaySession {
    pub fn new(brush: BrushSettings) -> Self {
        Self {
            active: false,
            mode: Mode::default(),
            transform: TransformState::default(),
            events_bound: false,
            brush,
            drag: None,
            scroll_top: 0.0,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
}
