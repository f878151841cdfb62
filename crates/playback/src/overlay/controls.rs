use std::collections::HashSet;

use super::mode::Cursor;

/// The named toolbar and panel controls of the overlay skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Drag,
    Draw,
    Eraser,
    Laser,
    ColorPicker,
    SizeDown,
    SizeUp,
    ZoomOut,
    ZoomIn,
    ZoomReset,
    Clear,
    OutlineToggle,
    OutlineClose,
    Fullscreen,
    Exit,
}

impl Control {
    pub const ALL: [Control; 15] = [
        Control::Drag,
        Control::Draw,
        Control::Eraser,
        Control::Laser,
        Control::ColorPicker,
        Control::SizeDown,
        Control::SizeUp,
        Control::ZoomOut,
        Control::ZoomIn,
        Control::ZoomReset,
        Control::Clear,
        Control::OutlineToggle,
        Control::OutlineClose,
        Control::Fullscreen,
        Control::Exit,
    ];

    pub fn tooltip(&self) -> &'static str {
        match self {
            Self::Drag => "Drag",
            Self::Draw => "Pen",
            Self::Eraser => "Eraser",
            Self::Laser => "Laser pointer",
            Self::ColorPicker => "Brush color",
            Self::SizeDown => "Thinner brush",
            Self::SizeUp => "Thicker brush",
            Self::ZoomOut => "Zoom out",
            Self::ZoomIn => "Zoom in",
            Self::ZoomReset => "Reset zoom",
            Self::Clear => "Clear drawings",
            Self::OutlineToggle => "Outline",
            Self::OutlineClose => "Close outline",
            Self::Fullscreen => "Toggle fullscreen",
            Self::Exit => "Leave presentation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenIcon {
    Expand,
    Compress,
}

/// Everything the host renders about the overlay chrome.
#[derive(Debug, Clone, PartialEq)]
pub struct Affordances {
    pub overlay_visible: bool,
    pub toolbar_visible: bool,
    pub background_scroll_locked: bool,
    /// The one mode control drawn as active.
    pub active_mode: Control,
    pub outline_active: bool,
    pub disabled: HashSet<Control>,
    pub zoom_label: String,
    pub size_label: String,
    pub transform_css: String,
    pub fullscreen_icon: FullscreenIcon,
    pub viewport_cursor: Cursor,
    pub document_cursor_hidden: bool,
}

impl Default for Affordances {
    fn default() -> Self {
        Self {
            overlay_visible: false,
            toolbar_visible: false,
            background_scroll_locked: false,
            active_mode: Control::Drag,
            outline_active: false,
            disabled: HashSet::new(),
            zoom_label: "100%".to_string(),
            size_label: String::new(),
            transform_css: "none".to_string(),
            fullscreen_icon: FullscreenIcon::Expand,
            viewport_cursor: Cursor::Default,
            document_cursor_hidden: false,
        }
    }
}

impl Affordances {
    pub fn is_active(&self, control: Control) -> bool {
        control == self.active_mode || (control == Control::OutlineToggle && self.outline_active)
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        !self.disabled.contains(&control)
    }

    pub fn set_enabled(&mut self, control: Control, enabled: bool) {
        if enabled {
            self.disabled.remove(&control);
        } else {
            self.disabled.insert(control);
        }
    }
}
