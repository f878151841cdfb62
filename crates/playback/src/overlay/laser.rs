use eframe::egui::{Color32, Pos2};

use super::events::{EventKind, EventRegistry, Scope, Subscription, Target};

/// The glowing dot that follows the pointer in laser mode.
#[derive(Debug, Clone, PartialEq)]
pub struct LaserVisual {
    pub position: Option<Pos2>,
    pub visible: bool,
    pub color: Color32,
    pub size: f32,
    pub opacity: f32,
}

impl LaserVisual {
    /// Blur radii of the two glow rings, innermost first.
    pub const GLOW_RADII: [f32; 2] = [12.0, 24.0];

    pub fn fill(&self) -> Color32 {
        self.color.gamma_multiply(self.opacity)
    }
}

#[derive(Debug)]
pub struct LaserPointer {
    visual: Option<LaserVisual>,
    subscription: Option<Subscription>,
    size: f32,
    opacity: f32,
}

impl LaserPointer {
    pub fn new(size: f32, opacity: f32) -> Self {
        Self {
            visual: None,
            subscription: None,
            size,
            opacity,
        }
    }

    /// Show the laser. The visual is created on first use and kept afterwards;
    /// it stays hidden until the pointer moves.
    pub fn activate(&mut self, registry: &EventRegistry, color: Color32) {
        let visual = self.visual.get_or_insert_with(|| LaserVisual {
            position: None,
            visible: false,
            color,
            size: self.size,
            opacity: self.opacity,
        });
        visual.color = color;

        if self.subscription.is_none() {
            self.subscription = Some(registry.bind(
                Scope::Laser,
                [
                    (Target::Document, EventKind::PointerMove),
                    (Target::Document, EventKind::PointerLeave),
                    (Target::Document, EventKind::PointerCancel),
                ],
            ));
        }
    }

    pub fn deactivate(&mut self) {
        if let Some(visual) = self.visual.as_mut() {
            visual.visible = false;
        }
        self.subscription = None;
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn follow(&mut self, pos: Pos2) {
        if !self.is_active() {
            return;
        }
        if let Some(visual) = self.visual.as_mut() {
            visual.position = Some(pos);
            visual.visible = true;
        }
    }

    /// The pointer left the window: hide until it comes back.
    pub fn lose_pointer(&mut self) {
        if let Some(visual) = self.visual.as_mut() {
            visual.visible = false;
        }
    }

    pub fn sync_color(&mut self, color: Color32) {
        if let Some(visual) = self.visual.as_mut() {
            visual.color = color;
        }
    }

    pub fn visual(&self) -> Option<&LaserVisual> {
        self.visual.as_ref()
    }
}
