use super::controls::Control;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Pan,
    Draw,
    Erase,
    Laser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Grab,
    Grabbing,
    Crosshair,
    Hidden,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pan => "pan",
            Self::Draw => "draw",
            Self::Erase => "erase",
            Self::Laser => "laser",
        }
    }

    /// The toolbar control shown as active in this mode.
    pub fn control(&self) -> Control {
        match self {
            Self::Pan => Control::Drag,
            Self::Draw => Control::Draw,
            Self::Erase => Control::Eraser,
            Self::Laser => Control::Laser,
        }
    }

    pub fn cursor(&self) -> Cursor {
        match self {
            Self::Pan => Cursor::Grab,
            Self::Draw | Self::Erase => Cursor::Crosshair,
            Self::Laser => Cursor::Hidden,
        }
    }

    pub fn accepts_strokes(&self) -> bool {
        matches!(self, Self::Draw | Self::Erase)
    }
}

/// Side effects of moving from one mode to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
    pub bind_draw_input: bool,
    pub unbind_draw_input: bool,
    pub clear_canvas: bool,
    pub activate_laser: bool,
    pub deactivate_laser: bool,
}

impl ModeChange {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Work out what a transition has to tear down and set up.
///
/// Re-entering the current mode changes nothing. Leaving the drawing modes for
/// pan or laser drops the drawing input and wipes the canvas; moving between
/// draw and erase keeps both.
pub fn plan(from: Mode, to: Mode) -> ModeChange {
    let changed = from != to;
    ModeChange {
        from,
        to,
        bind_draw_input: changed && to.accepts_strokes() && !from.accepts_strokes(),
        unbind_draw_input: changed && from.accepts_strokes() && !to.accepts_strokes(),
        clear_canvas: changed && !to.accepts_strokes(),
        activate_laser: changed && to == Mode::Laser,
        deactivate_laser: changed && from == Mode::Laser,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [Mode; 4] = [Mode::Pan, Mode::Draw, Mode::Erase, Mode::Laser];

    #[test]
    fn test_same_mode_is_noop() {
        for mode in MODES {
            let change = plan(mode, mode);
            assert!(change.is_noop());
            assert!(!change.bind_draw_input && !change.unbind_draw_input);
            assert!(!change.clear_canvas && !change.activate_laser && !change.deactivate_laser);
        }
    }

    #[test]
    fn test_draw_to_erase_keeps_canvas_and_input() {
        let change = plan(Mode::Draw, Mode::Erase);
        assert!(!change.clear_canvas);
        assert!(!change.bind_draw_input);
        assert!(!change.unbind_draw_input);
    }

    #[test]
    fn test_to_pan_drops_drawing() {
        let change = plan(Mode::Erase, Mode::Pan);
        assert!(change.unbind_draw_input);
        assert!(change.clear_canvas);
        assert!(!change.deactivate_laser);
    }

    #[test]
    fn test_laser_exchanges() {
        let to_laser = plan(Mode::Draw, Mode::Laser);
        assert!(to_laser.activate_laser && to_laser.unbind_draw_input && to_laser.clear_canvas);

        let from_laser = plan(Mode::Laser, Mode::Draw);
        assert!(from_laser.deactivate_laser && from_laser.bind_draw_input);
        assert!(!from_laser.clear_canvas);
    }

    #[test]
    fn test_every_mode_has_own_control() {
        let mut controls: Vec<Control> = MODES.iter().map(Mode::control).collect();
        controls.dedup();
        assert_eq!(controls.len(), 4);
        assert_eq!(Mode::default(), Mode::Pan);
        assert_eq!(Mode::Laser.cursor(), Cursor::Hidden);
    }
}
