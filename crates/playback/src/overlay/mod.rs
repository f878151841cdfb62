//! The presentation overlay.
//!
//! [`Overlay`] owns one [`OverlaySession`] and every resource the presentation
//! uses while it is open: the annotation canvas, the laser pointer, the outline
//! and the listener subscriptions. The host feeds it [`OverlayEvent`]s and calls
//! [`Overlay::tick`] once per frame; everything else happens synchronously.

pub mod brush;
pub mod canvas;
pub mod controls;
pub mod error;
pub mod events;
pub mod host;
pub mod laser;
pub mod mode;
pub mod session;
pub mod timer;
pub mod toc;
pub mod transform;

use std::time::{Duration, Instant};

use eframe::egui::{Color32, Key, Pos2};

use crate::config::Settings;
use crate::content::Element;

use canvas::{AnnotationCanvas, StrokeStyle};
use controls::{Affordances, Control, FullscreenIcon};
use events::{EventKind, EventRegistry, Scope, Subscription, Target};
use host::Host;
use laser::LaserPointer;
use mode::{Cursor, Mode};
use session::{DragGesture, OverlaySession};
use timer::DeferredTask;
use toc::Outline;

/// Input delivered by the host. Pointer positions are in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayEvent {
    Click(Control),
    ColorChanged(Color32),
    OutlineLink(usize),
    PointerDown(Pos2),
    PointerMove(Pos2),
    PointerUp,
    PointerLeave,
    PointerCancel,
    Wheel(f32),
    KeyDown(Key),
    Resize,
    FullscreenChange,
}

pub struct Overlay<H: Host> {
    host: H,
    settings: Settings,
    session: OverlaySession,
    registry: EventRegistry,
    bindings: Vec<Subscription>,
    draw_input: Option<Subscription>,
    stroke_moves: Option<Subscription>,
    canvas: AnnotationCanvas,
    laser: LaserPointer,
    outline: Outline,
    content: Option<Element>,
    affordances: Affordances,
    reinit: DeferredTask,
    fullscreen_timer: DeferredTask,
}

impl<H: Host> Overlay<H> {
    pub fn new(host: H, settings: Settings) -> Self {
        let canvas = AnnotationCanvas::new(host.skeleton().canvas);
        Self {
            session: OverlaySession::new(settings.brush()),
            registry: EventRegistry::new(),
            bindings: Vec::new(),
            draw_input: None,
            stroke_moves: None,
            canvas,
            laser: LaserPointer::new(settings.laser_size, settings.laser_opacity),
            outline: Outline::new(),
            content: None,
            affordances: Affordances::default(),
            reinit: DeferredTask::new(settings.reinit_throttle),
            fullscreen_timer: DeferredTask::new(settings.fullscreen_delay),
            host,
            settings,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &OverlaySession {
        &self.session
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn mode(&self) -> Mode {
        self.session.mode
    }

    pub fn affordances(&self) -> &Affordances {
        &self.affordances
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn canvas(&self) -> &AnnotationCanvas {
        &self.canvas
    }

    pub fn laser(&self) -> &LaserPointer {
        &self.laser
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    /// The cloned, cleaned up content being presented.
    pub fn content(&self) -> Option<&Element> {
        self.content.as_ref()
    }

    // -- Lifecycle --

    /// Open the presentation over `page`.
    ///
    /// Returns false without touching anything when the page has no content
    /// element or a presentation is already open.
    pub fn activate(&mut self, page: &Element, now: Instant) -> bool {
        let Some(source) = page.find_by_class(&self.settings.marker_class) else {
            tracing::debug!(
                class = %self.settings.marker_class,
                "no content element, nothing to present"
            );
            return false;
        };
        if self.session.active {
            tracing::debug!("presentation already open");
            return false;
        }

        let mut content = source.clone();
        let stripped = content.remove_by_class(&self.settings.summary_class);
        let resolved = content.resolve_lazy_images(&self.settings.lazy_class);
        tracing::debug!(stripped, resolved, "content cloned");
        self.content = Some(content);
        self.outline.reset();

        self.session.active = true;
        self.affordances.overlay_visible = true;
        self.affordances.toolbar_visible = true;
        self.affordances.background_scroll_locked = true;

        self.init_canvas();
        self.set_mode(Mode::Pan);
        self.refresh_mode_affordances();
        self.reset_zoom();
        self.refresh_brush_affordances();

        self.fullscreen_timer.restart(now);
        self.bind_all_events();

        tracing::info!("presentation started");
        true
    }

    /// Close the presentation and release everything it held. Safe to call
    /// when nothing is open.
    pub fn deactivate(&mut self) -> bool {
        if !self.session.active {
            return false;
        }

        if self.host.is_fullscreen() {
            if let Err(e) = self.host.exit_fullscreen() {
                tracing::warn!("could not leave fullscreen: {e}");
            }
        }

        self.affordances.overlay_visible = false;
        self.affordances.toolbar_visible = false;
        self.affordances.background_scroll_locked = false;

        self.set_mode(Mode::Pan);
        self.laser.deactivate();
        self.session.transform.reset();
        self.outline.reset();
        self.content = None;

        self.fullscreen_timer.cancel();
        self.reinit.cancel();

        self.canvas.end_stroke();
        self.stroke_moves = None;
        self.draw_input = None;
        self.bindings.clear();
        self.canvas.release();

        self.session = OverlaySession::new(self.settings.brush());
        self.affordances = Affordances::default();

        tracing::info!("presentation closed");
        true
    }

    fn bind_all_events(&mut self) {
        if self.session.events_bound {
            return;
        }

        let mut session = vec![
            (Target::Control(Control::ColorPicker), EventKind::Change),
            (Target::Outline, EventKind::Click),
            (Target::Viewport, EventKind::Wheel),
            (Target::Document, EventKind::KeyDown),
            (Target::Document, EventKind::FullscreenChange),
            (Target::Window, EventKind::Resize),
        ];
        session.extend(
            Control::ALL
                .into_iter()
                .map(|c| (Target::Control(c), EventKind::Click)),
        );
        self.bindings.push(self.registry.bind(Scope::Session, session));

        self.bindings.push(self.registry.bind(
            Scope::Drag,
            [
                (Target::Viewport, EventKind::PointerDown),
                (Target::Document, EventKind::PointerMove),
                (Target::Document, EventKind::PointerUp),
                (Target::Document, EventKind::PointerLeave),
                (Target::Document, EventKind::PointerCancel),
            ],
        ));

        self.session.events_bound = true;
    }

    fn init_canvas(&mut self) {
        self.stroke_moves = None;
        let viewport = self.host.viewport_size();
        let ratio = self.host.pixel_ratio();
        match self.canvas.initialize(viewport, ratio) {
            Ok(()) => tracing::debug!(?viewport, ratio, "canvas ready"),
            Err(e) => tracing::debug!("annotation unavailable: {e}"),
        }
    }

    // -- Frame loop --

    /// Run any deferred work that has come due.
    pub fn tick(&mut self, now: Instant) {
        if self.fullscreen_timer.poll(now) && self.session.active {
            self.request_fullscreen(now);
        }
        if self.reinit.poll(now) && self.session.active {
            self.init_canvas();
        }
    }

    /// Time until the next deferred task is due, if any.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        [
            self.fullscreen_timer.remaining(now),
            self.reinit.remaining(now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // -- Events --

    /// Where a pointer press lands: on the canvas while annotating, on the
    /// viewport otherwise.
    pub fn pointer_target(&self) -> Target {
        if self.session.mode.accepts_strokes() && self.canvas.is_ready() {
            Target::Canvas
        } else {
            Target::Viewport
        }
    }

    pub fn route(&self, event: &OverlayEvent) -> (Target, EventKind) {
        match event {
            OverlayEvent::Click(control) => (Target::Control(*control), EventKind::Click),
            OverlayEvent::ColorChanged(_) => {
                (Target::Control(Control::ColorPicker), EventKind::Change)
            }
            OverlayEvent::OutlineLink(_) => (Target::Outline, EventKind::Click),
            OverlayEvent::PointerDown(_) => (self.pointer_target(), EventKind::PointerDown),
            OverlayEvent::PointerMove(_) => (Target::Document, EventKind::PointerMove),
            OverlayEvent::PointerUp => (Target::Document, EventKind::PointerUp),
            OverlayEvent::PointerLeave => (Target::Document, EventKind::PointerLeave),
            OverlayEvent::PointerCancel => (Target::Document, EventKind::PointerCancel),
            OverlayEvent::Wheel(_) => (Target::Viewport, EventKind::Wheel),
            OverlayEvent::KeyDown(_) => (Target::Document, EventKind::KeyDown),
            OverlayEvent::Resize => (Target::Window, EventKind::Resize),
            OverlayEvent::FullscreenChange => (Target::Document, EventKind::FullscreenChange),
        }
    }

    /// Deliver `event` to every scope listening for it. Events nobody listens
    /// for are dropped.
    pub fn dispatch(&mut self, event: OverlayEvent, now: Instant) {
        let (target, kind) = self.route(&event);
        for scope in self.registry.scopes_for(target, kind) {
            // An earlier handler may have torn this scope down
            if !self.registry.is_bound(scope, target, kind) {
                continue;
            }
            match scope {
                Scope::Session => self.on_session_event(event, now),
                Scope::Drag => self.on_drag_event(event),
                Scope::DrawInput => self.on_draw_input(event),
                Scope::Stroke => self.on_stroke_event(event),
                Scope::Laser => self.on_laser_event(event),
            }
        }
    }

    fn on_session_event(&mut self, event: OverlayEvent, now: Instant) {
        match event {
            OverlayEvent::Click(control) => self.on_control(control, now),
            OverlayEvent::ColorChanged(color) => {
                self.session.brush.color = color;
                self.laser.sync_color(color);
            }
            OverlayEvent::OutlineLink(index) => {
                self.navigate_to(index);
            }
            OverlayEvent::Wheel(delta) => self.scroll_by(delta),
            OverlayEvent::KeyDown(Key::Escape) => self.on_escape(now),
            OverlayEvent::Resize => {
                if self.affordances.overlay_visible {
                    self.reinit.schedule(now);
                }
            }
            OverlayEvent::FullscreenChange => {
                self.affordances.fullscreen_icon = if self.host.is_fullscreen() {
                    FullscreenIcon::Compress
                } else {
                    FullscreenIcon::Expand
                };
                self.reinit.schedule(now);
            }
            _ => {}
        }
    }

    fn on_control(&mut self, control: Control, now: Instant) {
        if !self.affordances.is_enabled(control) {
            return;
        }
        match control {
            Control::Drag => self.set_mode(Mode::Pan),
            Control::Draw => self.set_mode(Mode::Draw),
            Control::Eraser => self.set_mode(Mode::Erase),
            Control::Laser => {
                let next = if self.session.mode == Mode::Laser {
                    Mode::Pan
                } else {
                    Mode::Laser
                };
                self.set_mode(next);
            }
            // The host opens the picker; the choice arrives as ColorChanged
            Control::ColorPicker => {}
            Control::SizeDown => {
                self.session.brush.shrink();
                self.refresh_brush_affordances();
            }
            Control::SizeUp => {
                self.session.brush.grow();
                self.refresh_brush_affordances();
            }
            Control::ZoomOut => self.zoom_out(),
            Control::ZoomIn => self.zoom_in(),
            Control::ZoomReset => self.reset_zoom(),
            Control::Clear => self.canvas.clear(),
            Control::OutlineToggle => {
                if self.outline.is_open() {
                    self.close_outline();
                } else {
                    self.open_outline();
                }
            }
            Control::OutlineClose => self.close_outline(),
            Control::Fullscreen => self.toggle_fullscreen(now),
            Control::Exit => {
                self.deactivate();
            }
        }
    }

    /// Undo the topmost open layer only.
    fn on_escape(&mut self, now: Instant) {
        if self.outline.is_open() {
            self.close_outline();
        } else if self.host.is_fullscreen() {
            self.exit_fullscreen(now);
        } else if self.session.mode == Mode::Laser {
            self.set_mode(Mode::Pan);
        } else {
            self.deactivate();
        }
    }

    fn on_drag_event(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::PointerDown(pos) => {
                if self.session.mode != Mode::Pan {
                    return;
                }
                self.session.drag = Some(DragGesture {
                    start: pos,
                    start_offset: self.session.transform.offset,
                });
                self.affordances.viewport_cursor = Cursor::Grabbing;
            }
            OverlayEvent::PointerMove(pos) => {
                let Some(drag) = self.session.drag else {
                    return;
                };
                self.session.transform.pan(drag.start_offset, pos - drag.start);
                self.apply_transform();
            }
            OverlayEvent::PointerUp | OverlayEvent::PointerLeave | OverlayEvent::PointerCancel => {
                if self.session.drag.take().is_some() {
                    self.affordances.viewport_cursor = self.session.mode.cursor();
                }
            }
            _ => {}
        }
    }

    fn on_draw_input(&mut self, event: OverlayEvent) {
        let OverlayEvent::PointerDown(pos) = event else {
            return;
        };
        let brush = &self.session.brush;
        let style = match self.session.mode {
            Mode::Draw => StrokeStyle::pen(brush.color, brush.width()),
            Mode::Erase => StrokeStyle::eraser(brush.eraser_width()),
            Mode::Pan | Mode::Laser => return,
        };
        if !self.canvas.begin_stroke(pos, style) {
            return;
        }
        self.stroke_moves = Some(self.registry.bind(
            Scope::Stroke,
            [
                (Target::Document, EventKind::PointerMove),
                (Target::Document, EventKind::PointerUp),
                (Target::Document, EventKind::PointerLeave),
                (Target::Document, EventKind::PointerCancel),
            ],
        ));
    }

    fn on_stroke_event(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::PointerMove(pos) => {
                self.canvas.extend_stroke(pos);
            }
            OverlayEvent::PointerUp | OverlayEvent::PointerLeave | OverlayEvent::PointerCancel => {
                self.end_stroke();
            }
            _ => {}
        }
    }

    fn end_stroke(&mut self) {
        self.canvas.end_stroke();
        self.stroke_moves = None;
    }

    fn on_laser_event(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::PointerMove(pos) => self.laser.follow(pos),
            OverlayEvent::PointerLeave | OverlayEvent::PointerCancel => self.laser.lose_pointer(),
            _ => {}
        }
    }

    // -- Modes --

    /// Switch interaction mode. Re-selecting the current mode does nothing.
    pub fn set_mode(&mut self, to: Mode) {
        let change = mode::plan(self.session.mode, to);
        if change.is_noop() {
            return;
        }

        if change.deactivate_laser {
            self.laser.deactivate();
        }
        if change.unbind_draw_input {
            self.end_stroke();
            self.draw_input = None;
        }
        if change.clear_canvas {
            self.canvas.clear();
        }
        if change.bind_draw_input && self.draw_input.is_none() {
            self.draw_input = Some(
                self.registry
                    .bind(Scope::DrawInput, [(Target::Canvas, EventKind::PointerDown)]),
            );
        }
        if change.activate_laser {
            self.laser.activate(&self.registry, self.session.brush.color);
        }

        self.session.mode = to;
        self.session.drag = None;
        self.refresh_mode_affordances();
        tracing::debug!(from = change.from.name(), to = to.name(), "mode changed");
    }

    fn refresh_mode_affordances(&mut self) {
        let mode = self.session.mode;
        self.affordances.active_mode = mode.control();
        self.affordances.viewport_cursor = mode.cursor();
        self.affordances.document_cursor_hidden = mode == Mode::Laser;
    }

    fn refresh_brush_affordances(&mut self) {
        let brush = &self.session.brush;
        let (shrink, grow, label) = (brush.can_shrink(), brush.can_grow(), brush.size_label());
        self.affordances.size_label = label;
        self.affordances.set_enabled(Control::SizeDown, shrink);
        self.affordances.set_enabled(Control::SizeUp, grow);
    }

    // -- Transform --

    pub fn zoom_in(&mut self) {
        if self.session.transform.zoom_in(&self.settings.zoom) {
            self.apply_transform();
        }
    }

    pub fn zoom_out(&mut self) {
        if self.session.transform.zoom_out(&self.settings.zoom) {
            self.apply_transform();
        }
    }

    /// Back to 100%, no pan, scrolled to the top.
    pub fn reset_zoom(&mut self) {
        self.session.transform.reset();
        self.session.scroll_top = 0.0;
        self.apply_transform();
    }

    fn apply_transform(&mut self) {
        let t = &self.session.transform;
        let limits = &self.settings.zoom;
        let (can_in, can_out) = (t.can_zoom_in(limits), t.can_zoom_out(limits));
        self.affordances.transform_css = t.css();
        self.affordances.zoom_label = t.zoom_label();
        self.affordances.set_enabled(Control::ZoomIn, can_in);
        self.affordances.set_enabled(Control::ZoomOut, can_out);
        self.set_scroll_top(self.session.scroll_top);
    }

    pub fn max_scroll(&self) -> f32 {
        let scaled = self.host.content_height() * self.session.transform.scale;
        (scaled - self.host.viewport_size().y).max(0.0)
    }

    pub fn scroll_top(&self) -> f32 {
        self.session.scroll_top
    }

    pub fn set_scroll_top(&mut self, value: f32) {
        self.session.scroll_top = value.clamp(0.0, self.max_scroll());
    }

    pub fn scroll_by(&mut self, delta: f32) {
        self.set_scroll_top(self.session.scroll_top + delta);
    }

    // -- Outline --

    pub fn open_outline(&mut self) {
        if !self.host.skeleton().outline_panel {
            return;
        }
        self.outline
            .open(self.content.as_mut(), &self.settings.outline_levels);
        self.affordances.outline_active = true;
    }

    pub fn close_outline(&mut self) {
        self.outline.close();
        self.affordances.outline_active = false;
    }

    /// Jump to the `index`-th outline heading. Returns false when there is no
    /// such heading or it has not been laid out yet.
    pub fn navigate_to(&mut self, index: usize) -> bool {
        let Some(content) = self.content.as_ref() else {
            return false;
        };
        if index >= toc::heading_count(content, &self.settings.outline_levels) {
            tracing::debug!(index, "no heading for outline entry");
            return false;
        }
        let Some(offset) = self.host.heading_offset(index) else {
            tracing::debug!(index, "heading not laid out");
            return false;
        };
        let target = toc::scroll_target(
            offset,
            self.session.transform.scale,
            self.settings.outline_clearance,
        );
        self.set_scroll_top(target);
        true
    }

    // -- Fullscreen --

    pub fn request_fullscreen(&mut self, now: Instant) {
        match self.host.request_fullscreen() {
            Ok(backend) => {
                tracing::debug!(backend, "fullscreen on");
                self.affordances.fullscreen_icon = FullscreenIcon::Compress;
            }
            Err(e) => tracing::warn!("fullscreen unavailable, staying windowed: {e}"),
        }
        self.reinit.schedule(now);
    }

    pub fn exit_fullscreen(&mut self, now: Instant) {
        if self.host.is_fullscreen() {
            if let Err(e) = self.host.exit_fullscreen() {
                tracing::warn!("could not leave fullscreen: {e}");
            }
        }
        self.affordances.fullscreen_icon = FullscreenIcon::Expand;
        self.reinit.schedule(now);
    }

    pub fn toggle_fullscreen(&mut self, now: Instant) {
        if self.host.is_fullscreen() {
            self.exit_fullscreen(now);
        } else {
            self.request_fullscreen(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use eframe::egui::{pos2, vec2, Vec2};

    use super::host::fake::{FakeBackend, FakeHost};
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn page() -> Element {
        Element::new("body").with_child(
            Element::new("article")
                .with_class("post-content")
                .with_child(
                    Element::new("div")
                        .with_class("aisummary")
                        .with_child(Element::new("h2").with_text("Summary")),
                )
                .with_child(Element::new("h2").with_text("Intro"))
                .with_child(
                    Element::new("img")
                        .with_class("lazyload")
                        .with_attr("src", "placeholder.gif")
                        .with_attr("data-src", "real.png"),
                )
                .with_child(Element::new("h3").with_text("Details")),
        )
    }

    fn overlay() -> (Overlay<FakeHost>, Rc<Cell<bool>>) {
        let (mut host, fullscreen) = FakeHost::with_fullscreen();
        host.heading_offsets = vec![100.0, 500.0];
        (Overlay::new(host, Settings::default()), fullscreen)
    }

    fn active() -> (Overlay<FakeHost>, Instant) {
        let (mut o, _) = overlay();
        let t0 = Instant::now();
        assert!(o.activate(&page(), t0));
        (o, t0)
    }

    fn click(o: &mut Overlay<FakeHost>, control: Control, now: Instant) {
        o.dispatch(OverlayEvent::Click(control), now);
    }

    fn stroke(o: &mut Overlay<FakeHost>, points: &[Pos2], now: Instant) {
        o.dispatch(OverlayEvent::PointerDown(points[0]), now);
        for p in &points[1..] {
            o.dispatch(OverlayEvent::PointerMove(*p), now);
        }
        o.dispatch(OverlayEvent::PointerUp, now);
    }

    #[test]
    fn test_activate_without_content_is_noop() {
        let (mut o, _) = overlay();
        let page = Element::new("body").with_child(Element::new("p").with_text("hi"));
        assert!(!o.activate(&page, Instant::now()));
        assert!(!o.is_active());
        assert_eq!(o.registry().total(), 0);
        assert!(!o.affordances().overlay_visible);
    }

    #[test]
    fn test_activate_prepares_content() {
        let (o, _) = active();
        let content = o.content().unwrap();
        assert!(content.find_by_class("aisummary").is_none());
        let mut img = None;
        content.walk(&mut |el| {
            if el.tag == "img" {
                img = Some(el.clone());
            }
        });
        let img = img.unwrap();
        assert_eq!(img.attr("src"), Some("real.png"));
        assert!(!img.has_class("lazyload"));
        // The page itself is left alone
        assert!(page().find_by_class("aisummary").is_some());

        let a = o.affordances();
        assert!(a.overlay_visible && a.toolbar_visible && a.background_scroll_locked);
        assert_eq!(a.active_mode, Control::Drag);
        assert_eq!(a.viewport_cursor, Cursor::Grab);
        assert_eq!(a.zoom_label, "100%");
        assert_eq!(a.size_label, "5");
        assert!(o.canvas().is_ready());
        assert!(!o.outline().is_built());
    }

    #[test]
    fn test_activate_twice_binds_once() {
        let (mut o, t0) = active();
        let total = o.registry().total();
        assert!(!o.activate(&page(), t0));
        assert_eq!(o.registry().total(), total);
        assert_eq!(o.registry().max_multiplicity(), 1);

        click(&mut o, Control::ZoomIn, t0);
        assert_eq!(o.session().transform.scale, 1.1);
    }

    #[test]
    fn test_deactivate_releases_everything() {
        let (mut o, t0) = active();
        click(&mut o, Control::Draw, t0);
        o.dispatch(OverlayEvent::PointerDown(pos2(10.0, 10.0)), t0);
        click(&mut o, Control::OutlineToggle, t0);
        assert!(o.canvas().is_stroking());

        assert!(o.deactivate());
        assert_eq!(o.registry().total(), 0);
        assert!(!o.canvas().is_ready());
        assert!(o.content().is_none());
        assert!(o.outline().entries().is_empty());
        assert_eq!(o.next_deadline(t0), None);
        assert_eq!(*o.affordances(), Affordances::default());
        assert_eq!(
            *o.session(),
            OverlaySession::new(Settings::default().brush())
        );

        assert!(!o.deactivate());
    }

    #[test]
    fn test_reactivate_restores_defaults() {
        let (mut o, t0) = active();
        click(&mut o, Control::ZoomIn, t0);
        click(&mut o, Control::SizeUp, t0);
        click(&mut o, Control::Laser, t0);
        o.dispatch(OverlayEvent::PointerDown(pos2(0.0, 0.0)), t0);
        o.deactivate();

        assert!(o.activate(&page(), t0));
        let s = o.session();
        assert_eq!(s.mode, Mode::Pan);
        assert_eq!(s.transform.scale, 1.0);
        assert_eq!(s.transform.offset, Vec2::ZERO);
        assert!(s.events_bound);
        assert_eq!(s.brush.width(), 5.0);
        assert!(!o.laser().is_active());
        assert_eq!(o.registry().max_multiplicity(), 1);
    }

    #[test]
    fn test_fullscreen_requested_after_delay() {
        let (mut o, fullscreen) = overlay();
        let t0 = Instant::now();
        o.activate(&page(), t0);
        assert_eq!(o.next_deadline(t0), Some(50 * MS));

        o.tick(t0 + 49 * MS);
        assert!(!fullscreen.get());
        o.tick(t0 + 50 * MS);
        assert!(fullscreen.get());
        assert_eq!(o.affordances().fullscreen_icon, FullscreenIcon::Compress);
        // Going fullscreen resizes the surface
        assert_eq!(o.next_deadline(t0 + 50 * MS), Some(200 * MS));
    }

    #[test]
    fn test_deactivate_before_fullscreen_fires() {
        let (mut o, fullscreen) = overlay();
        let t0 = Instant::now();
        o.activate(&page(), t0);
        o.deactivate();
        o.tick(t0 + 100 * MS);
        assert!(!fullscreen.get());
    }

    #[test]
    fn test_fullscreen_fallback_and_failure() {
        let mut host = FakeHost::new();
        host.backends.push(Box::new(FakeBackend::new("exclusive", false)));
        let mut o = Overlay::new(host, Settings::default());
        let t0 = Instant::now();
        o.activate(&page(), t0);
        o.tick(t0 + 50 * MS);
        assert!(o.is_active());
        assert_eq!(o.affordances().fullscreen_icon, FullscreenIcon::Expand);

        let borderless = FakeBackend::new("borderless", true);
        let state = borderless.state.clone();
        o.host_mut().backends.push(Box::new(borderless));
        click(&mut o, Control::Fullscreen, t0 + 60 * MS);
        assert!(state.get());
        click(&mut o, Control::Fullscreen, t0 + 70 * MS);
        assert!(!state.get());
        assert_eq!(o.affordances().fullscreen_icon, FullscreenIcon::Expand);
    }

    #[test]
    fn test_fullscreen_change_updates_icon() {
        let (mut o, fullscreen) = overlay();
        let t0 = Instant::now();
        o.activate(&page(), t0);
        fullscreen.set(true);
        o.dispatch(OverlayEvent::FullscreenChange, t0);
        assert_eq!(o.affordances().fullscreen_icon, FullscreenIcon::Compress);
        fullscreen.set(false);
        o.dispatch(OverlayEvent::FullscreenChange, t0);
        assert_eq!(o.affordances().fullscreen_icon, FullscreenIcon::Expand);
    }

    #[test]
    fn test_resize_reinit_is_throttled() {
        let (mut o, t0) = active();
        o.tick(t0 + 50 * MS);
        o.tick(t0 + 250 * MS);
        let rev = o.canvas().revision();

        let t1 = t0 + 1000 * MS;
        o.host_mut().viewport = vec2(1024.0, 768.0);
        o.dispatch(OverlayEvent::Resize, t1);
        o.dispatch(OverlayEvent::Resize, t1 + 100 * MS);
        o.tick(t1 + 199 * MS);
        assert_eq!(o.canvas().revision(), rev);
        o.tick(t1 + 200 * MS);
        assert_eq!(o.canvas().pixels().unwrap().dimensions(), (1024, 768));
        let after = o.canvas().revision();
        o.tick(t1 + 400 * MS);
        assert_eq!(o.canvas().revision(), after);
    }

    #[test]
    fn test_reinit_clears_annotations() {
        let (mut o, t0) = active();
        click(&mut o, Control::Draw, t0);
        stroke(&mut o, &[pos2(10.0, 10.0), pos2(50.0, 10.0)], t0);
        assert!(!o.canvas().is_blank());
        o.dispatch(OverlayEvent::Resize, t0);
        o.tick(t0 + 200 * MS);
        assert!(o.canvas().is_blank());
    }

    #[test]
    fn test_pan_divides_by_scale() {
        let (mut o, t0) = active();
        for _ in 0..10 {
            click(&mut o, Control::ZoomIn, t0);
        }
        assert_eq!(o.session().transform.scale, 2.0);
        o.dispatch(OverlayEvent::PointerDown(pos2(100.0, 100.0)), t0);
        assert_eq!(o.affordances().viewport_cursor, Cursor::Grabbing);
        o.dispatch(OverlayEvent::PointerMove(pos2(160.0, 130.0)), t0);
        o.dispatch(OverlayEvent::PointerMove(pos2(120.0, 140.0)), t0);
        o.dispatch(OverlayEvent::PointerUp, t0);
        assert_eq!(o.session().transform.offset, vec2(10.0, 20.0));
        assert_eq!(o.affordances().viewport_cursor, Cursor::Grab);

        // Moves after release do nothing
        o.dispatch(OverlayEvent::PointerMove(pos2(500.0, 500.0)), t0);
        assert_eq!(o.session().transform.offset, vec2(10.0, 20.0));
    }

    #[test]
    fn test_pointer_leave_ends_drag() {
        let (mut o, t0) = active();
        o.dispatch(OverlayEvent::PointerDown(pos2(0.0, 0.0)), t0);
        o.dispatch(OverlayEvent::PointerLeave, t0);
        assert!(!o.session().is_dragging());
    }

    #[test]
    fn test_no_drag_outside_pan() {
        let (mut o, t0) = active();
        click(&mut o, Control::Laser, t0);
        o.dispatch(OverlayEvent::PointerDown(pos2(0.0, 0.0)), t0);
        o.dispatch(OverlayEvent::PointerMove(pos2(40.0, 40.0)), t0);
        assert_eq!(o.session().transform.offset, Vec2::ZERO);
    }

    #[test]
    fn test_zoom_bounds_disable_controls() {
        let (mut o, t0) = active();
        for _ in 0..20 {
            click(&mut o, Control::ZoomIn, t0);
        }
        assert_eq!(o.session().transform.scale, 2.0);
        assert!(!o.affordances().is_enabled(Control::ZoomIn));
        assert_eq!(o.affordances().zoom_label, "200%");

        for _ in 0..30 {
            click(&mut o, Control::ZoomOut, t0);
        }
        assert_eq!(o.session().transform.scale, 0.5);
        assert!(!o.affordances().is_enabled(Control::ZoomOut));
        assert!(o.affordances().is_enabled(Control::ZoomIn));
    }

    #[test]
    fn test_zoom_reset_scrolls_to_top() {
        let (mut o, t0) = active();
        click(&mut o, Control::ZoomIn, t0);
        o.dispatch(OverlayEvent::Wheel(300.0), t0);
        assert_eq!(o.scroll_top(), 300.0);
        click(&mut o, Control::ZoomReset, t0);
        assert_eq!(o.scroll_top(), 0.0);
        assert_eq!(o.session().transform, Default::default());
        assert_eq!(o.affordances().transform_css, "scale(1) translate(0px, 0px)");
    }

    #[test]
    fn test_scroll_is_clamped() {
        let (mut o, t0) = active();
        o.dispatch(OverlayEvent::Wheel(-50.0), t0);
        assert_eq!(o.scroll_top(), 0.0);
        o.dispatch(OverlayEvent::Wheel(1e6), t0);
        assert_eq!(o.scroll_top(), 5000.0 - 600.0);
    }

    #[test]
    fn test_mode_affordances_are_exclusive() {
        let (mut o, t0) = active();
        for (control, mode, cursor) in [
            (Control::Draw, Mode::Draw, Cursor::Crosshair),
            (Control::Eraser, Mode::Erase, Cursor::Crosshair),
            (Control::Laser, Mode::Laser, Cursor::Hidden),
            (Control::Drag, Mode::Pan, Cursor::Grab),
        ] {
            click(&mut o, control, t0);
            assert_eq!(o.mode(), mode);
            let a = o.affordances();
            let active: Vec<Control> = [
                Control::Drag,
                Control::Draw,
                Control::Eraser,
                Control::Laser,
            ]
            .into_iter()
            .filter(|c| a.is_active(*c))
            .collect();
            assert_eq!(active, vec![control]);
            assert_eq!(a.viewport_cursor, cursor);
            assert_eq!(a.document_cursor_hidden, mode == Mode::Laser);
        }
    }

    #[test]
    fn test_same_mode_twice_is_idempotent() {
        let (mut o, t0) = active();
        click(&mut o, Control::Draw, t0);
        click(&mut o, Control::Draw, t0);
        assert_eq!(
            o.registry()
                .count(Scope::DrawInput, Target::Canvas, EventKind::PointerDown),
            1
        );
    }

    #[test]
    fn test_laser_button_toggles() {
        let (mut o, t0) = active();
        click(&mut o, Control::Laser, t0);
        assert!(o.laser().is_active());
        click(&mut o, Control::Laser, t0);
        assert_eq!(o.mode(), Mode::Pan);
        assert!(!o.laser().is_active());
    }

    #[test]
    fn test_laser_follows_pointer_and_color() {
        let (mut o, t0) = active();
        click(&mut o, Control::Laser, t0);
        o.dispatch(OverlayEvent::PointerMove(pos2(30.0, 40.0)), t0);
        let visual = o.laser().visual().unwrap();
        assert!(visual.visible);
        assert_eq!(visual.position, Some(pos2(30.0, 40.0)));

        o.dispatch(OverlayEvent::ColorChanged(Color32::BLUE), t0);
        assert_eq!(o.laser().visual().unwrap().color, Color32::BLUE);

        o.dispatch(OverlayEvent::PointerLeave, t0);
        assert!(!o.laser().visual().unwrap().visible);

        click(&mut o, Control::Draw, t0);
        assert!(!o.laser().visual().unwrap().visible);
        assert!(!o.affordances().document_cursor_hidden);
    }

    #[test]
    fn test_draw_then_clear_matches_fresh_canvas() {
        let (mut o, t0) = active();
        click(&mut o, Control::Draw, t0);
        stroke(
            &mut o,
            &[pos2(10.0, 10.0), pos2(200.0, 150.0), pos2(300.0, 20.0)],
            t0,
        );
        assert!(!o.canvas().is_blank());
        click(&mut o, Control::Clear, t0);

        let mut fresh = AnnotationCanvas::new(true);
        fresh.initialize(vec2(800.0, 600.0), 1.0).unwrap();
        assert_eq!(o.canvas().pixels(), fresh.pixels());
    }

    #[test]
    fn test_erase_over_same_path_empties_canvas() {
        let (mut o, t0) = active();
        let path = [pos2(20.0, 20.0), pos2(120.0, 80.0), pos2(220.0, 40.0)];
        click(&mut o, Control::Draw, t0);
        stroke(&mut o, &path, t0);
        click(&mut o, Control::Eraser, t0);
        // Switching to the eraser keeps what was drawn
        assert!(!o.canvas().is_blank());
        stroke(&mut o, &path, t0);
        assert!(o.canvas().is_blank());
        assert_eq!(o.canvas().compositing(), canvas::Compositing::SourceOver);
    }

    #[test]
    fn test_leaving_draw_mode_clears_and_unbinds() {
        let (mut o, t0) = active();
        click(&mut o, Control::Draw, t0);
        stroke(&mut o, &[pos2(10.0, 10.0), pos2(60.0, 60.0)], t0);
        click(&mut o, Control::Drag, t0);
        assert!(o.canvas().is_blank());
        assert!(!o.registry().is_bound(
            Scope::DrawInput,
            Target::Canvas,
            EventKind::PointerDown
        ));
        assert_eq!(o.pointer_target(), Target::Viewport);
    }

    #[test]
    fn test_stroke_listeners_live_only_during_stroke() {
        let (mut o, t0) = active();
        click(&mut o, Control::Draw, t0);
        let moving = |o: &Overlay<FakeHost>| {
            o.registry()
                .is_bound(Scope::Stroke, Target::Document, EventKind::PointerMove)
        };
        assert!(!moving(&o));
        o.dispatch(OverlayEvent::PointerDown(pos2(5.0, 5.0)), t0);
        assert!(moving(&o));
        o.dispatch(OverlayEvent::PointerCancel, t0);
        assert!(!moving(&o));
        assert!(!o.canvas().is_stroking());

        // A move after cancel paints nothing
        let before = o.canvas().revision();
        o.dispatch(OverlayEvent::PointerMove(pos2(90.0, 90.0)), t0);
        assert_eq!(o.canvas().revision(), before);
    }

    #[test]
    fn test_brush_size_controls() {
        let (mut o, t0) = active();
        click(&mut o, Control::SizeDown, t0);
        assert_eq!(o.affordances().size_label, "1");
        assert!(!o.affordances().is_enabled(Control::SizeDown));
        click(&mut o, Control::SizeDown, t0);
        assert_eq!(o.session().brush.width(), 1.0);
        for _ in 0..10 {
            click(&mut o, Control::SizeUp, t0);
        }
        assert_eq!(o.affordances().size_label, "30");
        assert!(!o.affordances().is_enabled(Control::SizeUp));
        assert!(o.affordances().is_enabled(Control::SizeDown));
    }

    #[test]
    fn test_outline_scenario() {
        let (mut o, t0) = active();
        click(&mut o, Control::OutlineToggle, t0);
        assert!(o.affordances().outline_active);
        let entries: Vec<(usize, u8, &str)> = o
            .outline()
            .entries()
            .iter()
            .map(|e| (e.source_index, e.level, e.label.as_str()))
            .collect();
        assert_eq!(entries, vec![(0, 2, "Intro"), (1, 3, "Details")]);

        click(&mut o, Control::ZoomIn, t0);
        click(&mut o, Control::ZoomIn, t0);
        o.dispatch(OverlayEvent::OutlineLink(1), t0);
        assert_eq!(o.scroll_top(), 500.0 * 1.2 - 60.0);
    }

    #[test]
    fn test_navigation_stable_across_reopen() {
        let (mut o, t0) = active();
        click(&mut o, Control::OutlineToggle, t0);
        click(&mut o, Control::OutlineClose, t0);
        click(&mut o, Control::OutlineToggle, t0);
        assert_eq!(o.outline().entries().len(), 2);
        assert!(o.navigate_to(0));
        assert_eq!(o.scroll_top(), 40.0);
        assert!(o.navigate_to(1));
        assert_eq!(o.scroll_top(), 440.0);
        assert!(!o.navigate_to(2));
        assert_eq!(o.scroll_top(), 440.0);
    }

    #[test]
    fn test_escape_undoes_one_layer_at_a_time() {
        let (mut o, fullscreen) = overlay();
        let t0 = Instant::now();
        o.activate(&page(), t0);
        o.tick(t0 + 50 * MS);
        click(&mut o, Control::Laser, t0);
        click(&mut o, Control::OutlineToggle, t0);
        let esc = OverlayEvent::KeyDown(Key::Escape);

        o.dispatch(esc, t0);
        assert!(!o.outline().is_open());
        assert!(fullscreen.get());

        o.dispatch(esc, t0);
        assert!(!fullscreen.get());
        assert_eq!(o.mode(), Mode::Laser);

        o.dispatch(esc, t0);
        assert_eq!(o.mode(), Mode::Pan);
        assert!(o.is_active());

        o.dispatch(esc, t0);
        assert!(!o.is_active());
        assert_eq!(o.registry().total(), 0);
    }

    #[test]
    fn test_other_keys_ignored() {
        let (mut o, t0) = active();
        o.dispatch(OverlayEvent::KeyDown(Key::Space), t0);
        assert!(o.is_active());
    }

    #[test]
    fn test_exit_control_leaves_fullscreen() {
        let (mut o, fullscreen) = overlay();
        let t0 = Instant::now();
        o.activate(&page(), t0);
        o.tick(t0 + 50 * MS);
        click(&mut o, Control::Exit, t0);
        assert!(!fullscreen.get());
        assert!(!o.is_active());
    }

    #[test]
    fn test_missing_canvas_degrades() {
        let mut host = FakeHost::new();
        host.skeleton.canvas = false;
        let mut o = Overlay::new(host, Settings::default());
        let t0 = Instant::now();
        assert!(o.activate(&page(), t0));
        click(&mut o, Control::Draw, t0);
        o.dispatch(OverlayEvent::PointerDown(pos2(1.0, 1.0)), t0);
        assert!(!o.canvas().is_stroking());
        assert!(o.canvas().is_blank());
        assert!(o.deactivate());
    }

    #[test]
    fn test_events_ignored_when_inactive() {
        let (mut o, _) = overlay();
        let t0 = Instant::now();
        o.dispatch(OverlayEvent::Click(Control::ZoomIn), t0);
        o.dispatch(OverlayEvent::KeyDown(Key::Escape), t0);
        assert_eq!(o.session().transform.scale, 1.0);
        assert!(!o.is_active());
    }
}
