use eframe::egui;
use eframe::egui::emath::TSTransform;
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, Debouncer, new_debouncer};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use crate::config::{Config, Settings};
use crate::content::{Element, markdown};
use crate::overlay::controls::{Affordances, Control, FullscreenIcon};
use crate::overlay::error::FullscreenError;
use crate::overlay::host::{FullscreenBackend, Host};
use crate::overlay::laser::LaserVisual;
use crate::overlay::mode::Cursor;
use crate::overlay::{Overlay, OverlayEvent};
use crate::render::{self, image_cache::ImageCache};
use crate::theme::Theme;

const PAGE_MAX_WIDTH: f32 = 860.0;
const PAGE_MARGIN: f32 = 40.0;

/// Fullscreen through the windowing system.
struct NativeFullscreen {
    ctx: egui::Context,
}

impl FullscreenBackend for NativeFullscreen {
    fn name(&self) -> &'static str {
        "native"
    }

    fn request(&mut self) -> Result<(), FullscreenError> {
        // The integration reports None when it cannot tell, which in practice
        // means it cannot switch either
        if self.ctx.input(|i| i.viewport().fullscreen).is_none() {
            return Err(FullscreenError::Unsupported("native"));
        }
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Fullscreen(true));
        Ok(())
    }

    fn exit(&mut self) -> Result<(), FullscreenError> {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Fullscreen(false));
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.ctx
            .input(|i| i.viewport().fullscreen.unwrap_or(false))
    }
}

/// Fallback: a maximized window without decorations.
struct BorderlessMaximized {
    ctx: egui::Context,
    active: bool,
}

impl FullscreenBackend for BorderlessMaximized {
    fn name(&self) -> &'static str {
        "borderless"
    }

    fn request(&mut self) -> Result<(), FullscreenError> {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Decorations(false));
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Maximized(true));
        self.active = true;
        Ok(())
    }

    fn exit(&mut self) -> Result<(), FullscreenError> {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Decorations(true));
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Maximized(false));
        self.active = false;
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.active
    }
}

/// The window as seen by the overlay. Layout values are those of the last
/// drawn frame.
struct EguiHost {
    viewport: egui::Vec2,
    pixel_ratio: f32,
    heading_offsets: Vec<f32>,
    content_height: f32,
    backends: Vec<Box<dyn FullscreenBackend>>,
}

impl EguiHost {
    fn new(ctx: &egui::Context) -> Self {
        Self {
            viewport: ctx.available_rect().size(),
            pixel_ratio: ctx.pixels_per_point(),
            heading_offsets: Vec::new(),
            content_height: 0.0,
            backends: vec![
                Box::new(NativeFullscreen { ctx: ctx.clone() }),
                Box::new(BorderlessMaximized {
                    ctx: ctx.clone(),
                    active: false,
                }),
            ],
        }
    }
}

impl Host for EguiHost {
    fn viewport_size(&self) -> egui::Vec2 {
        self.viewport
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn heading_offset(&self, index: usize) -> Option<f32> {
        self.heading_offsets.get(index).copied()
    }

    fn content_height(&self) -> f32 {
        self.content_height
    }

    fn fullscreen_backends(&self) -> &[Box<dyn FullscreenBackend>] {
        &self.backends
    }

    fn fullscreen_backends_mut(&mut self) -> &mut [Box<dyn FullscreenBackend>] {
        &mut self.backends
    }
}

struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    rx: Receiver<DebounceEventResult>,
    file_name: OsString,
}

impl FileWatcher {
    /// Watch the file's directory rather than the file itself so editors that
    /// save by renaming are still picked up.
    fn start(file: &Path, ctx: egui::Context) -> anyhow::Result<Self> {
        let file_name = file
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Not a file: {}", file.display()))?
            .to_os_string();
        let dir = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(
            Duration::from_millis(200),
            move |result: DebounceEventResult| {
                let _ = tx.send(result);
                ctx.request_repaint();
            },
        )?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!("watching {} for changes", file.display());

        Ok(Self {
            _debouncer: debouncer,
            rx,
            file_name,
        })
    }

    fn changed(&self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.rx.try_recv() {
            match result {
                Ok(events) => {
                    changed |= events.iter().any(|e| {
                        e.kind == DebouncedEventKind::Any
                            && e.path.file_name() == Some(self.file_name.as_os_str())
                    });
                }
                Err(e) => tracing::warn!("file watcher error: {e}"),
            }
        }
        changed
    }
}

struct PlaybackApp {
    file: PathBuf,
    page: Element,
    theme: Theme,
    images: ImageCache,
    overlay: Overlay<EguiHost>,
    canvas_texture: Option<(u64, egui::TextureHandle)>,
    picker_color: egui::Color32,
    watcher: Option<FileWatcher>,
    present_on_start: bool,
    last_viewport: Option<egui::Vec2>,
    last_fullscreen: Option<bool>,
    pointer_inside: bool,
}

impl PlaybackApp {
    fn new(
        ctx: &egui::Context,
        file: PathBuf,
        page: Element,
        settings: Settings,
        present: bool,
        watch: bool,
    ) -> Self {
        let theme = Theme::from_name(&settings.theme);
        let base_path = file
            .parent()
            .unwrap_or(std::path::Path::new("."))
            .to_path_buf();

        let watcher = if watch {
            match FileWatcher::start(&file, ctx.clone()) {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!("could not watch {}: {e}", file.display());
                    None
                }
            }
        } else {
            None
        };

        let picker_color = settings.brush_color;
        Self {
            file,
            page,
            theme,
            images: ImageCache::new(base_path),
            overlay: Overlay::new(EguiHost::new(ctx), settings),
            canvas_texture: None,
            picker_color,
            watcher,
            present_on_start: present,
            last_viewport: None,
            last_fullscreen: None,
            pointer_inside: false,
        }
    }

    fn reload(&mut self) {
        match std::fs::read_to_string(&self.file) {
            Ok(source) => {
                self.page = markdown::parse_page(&source, &self.overlay.settings().marker_class);
                self.images.clear();
                if self.overlay.is_active() {
                    tracing::info!("document changed, reloads on the next presentation");
                } else {
                    tracing::info!("document reloaded");
                }
            }
            Err(e) => tracing::warn!("could not reload {}: {e}", self.file.display()),
        }
    }

    fn present(&mut self, now: Instant) {
        if !self.overlay.activate(&self.page, now) {
            tracing::info!(
                "nothing to present: no .{} element",
                self.overlay.settings().marker_class
            );
            return;
        }
        self.picker_color = self.overlay.session().brush.color;
    }

    fn show_page(&mut self, ctx: &egui::Context, now: Instant) {
        let mut present = ctx.input(|i| i.key_pressed(egui::Key::F5));

        egui::TopBottomPanel::top("playback-page-bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let name = self.file.file_name().unwrap_or_default().to_string_lossy();
                ui.label(egui::RichText::new(name).strong());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .button("\u{25B6} Present")
                        .on_hover_text("Open the presentation (F5)")
                        .clicked()
                    {
                        present = true;
                    }
                    let theme_label = if self.theme.is_dark() { "Light" } else { "Dark" };
                    if ui.button(theme_label).clicked() {
                        self.theme = self.theme.toggled();
                    }
                });
            });
        });

        let bg = self.theme.background;
        let levels = self.overlay.settings().outline_levels.clone();
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(bg).inner_margin(0.0))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let full = ui.available_width();
                    let width = (full - PAGE_MARGIN * 2.0).min(PAGE_MAX_WIDTH).max(100.0);
                    let origin = ui.cursor().min
                        + egui::vec2((full - width) / 2.0, PAGE_MARGIN);
                    let layout = render::draw_page(
                        ui.painter(),
                        &self.page,
                        &self.theme,
                        &self.images,
                        &levels,
                        origin,
                        width,
                    );
                    ui.allocate_space(egui::vec2(full, layout.height + PAGE_MARGIN * 2.0));
                });
            });

        if present {
            self.present(now);
        }
    }

    fn show_overlay(&mut self, ctx: &egui::Context, viewport: egui::Rect, now: Instant) {
        let mut events: Vec<OverlayEvent> = Vec::new();

        let fullscreen = ctx.input(|i| i.viewport().fullscreen);
        if self.last_fullscreen.is_some() && self.last_fullscreen != fullscreen {
            events.push(OverlayEvent::FullscreenChange);
        }
        self.last_fullscreen = fullscreen;
        if self.last_viewport.is_some_and(|v| v != viewport.size()) {
            events.push(OverlayEvent::Resize);
        }
        self.last_viewport = Some(viewport.size());

        let mut chrome = vec![self.toolbar(ctx, &mut events)];
        if let Some(rect) = self.outline_panel(ctx, &mut events) {
            chrome.push(rect);
        }
        let over_chrome = |pos: egui::Pos2| chrome.iter().any(|r| r.contains(pos));
        let local = |pos: egui::Pos2| (pos - viewport.min).to_pos2();

        let pointer_inside = &mut self.pointer_inside;
        ctx.input(|i| {
            if i.key_pressed(egui::Key::Escape) {
                events.push(OverlayEvent::KeyDown(egui::Key::Escape));
            }

            let hover = i.pointer.hover_pos();
            if i.pointer.primary_pressed() {
                if let Some(pos) = i.pointer.press_origin() {
                    if viewport.contains(pos) && !over_chrome(pos) {
                        events.push(OverlayEvent::PointerDown(local(pos)));
                    }
                }
            }
            if let Some(pos) = hover {
                if i.pointer.delta() != egui::Vec2::ZERO {
                    events.push(OverlayEvent::PointerMove(local(pos)));
                }
                if !over_chrome(pos) && i.smooth_scroll_delta.y != 0.0 {
                    events.push(OverlayEvent::Wheel(-i.smooth_scroll_delta.y));
                }
            }
            if i.pointer.primary_released() {
                events.push(OverlayEvent::PointerUp);
            }

            for event in &i.events {
                match event {
                    egui::Event::PointerGone => events.push(OverlayEvent::PointerLeave),
                    egui::Event::Touch {
                        phase: egui::TouchPhase::Cancel,
                        ..
                    } => events.push(OverlayEvent::PointerCancel),
                    _ => {}
                }
            }
            *pointer_inside = hover.is_some_and(|p| viewport.contains(p) && !over_chrome(p));
        });

        for event in events {
            self.overlay.dispatch(event, now);
        }
        if !self.overlay.is_active() {
            self.canvas_texture = None;
            self.last_viewport = None;
            self.last_fullscreen = None;
            ctx.request_repaint();
            return;
        }

        self.draw_presentation(ctx, viewport);

        if self.pointer_inside {
            ctx.set_cursor_icon(match self.overlay.affordances().viewport_cursor {
                Cursor::Default => egui::CursorIcon::Default,
                Cursor::Grab => egui::CursorIcon::Grab,
                Cursor::Grabbing => egui::CursorIcon::Grabbing,
                Cursor::Crosshair => egui::CursorIcon::Crosshair,
                Cursor::Hidden => egui::CursorIcon::None,
            });
        }
    }

    fn draw_presentation(&mut self, ctx: &egui::Context, viewport: egui::Rect) {
        let backdrop = ctx.layer_painter(egui::LayerId::background());
        backdrop.rect_filled(viewport, 0.0, self.theme.overlay_background);

        // Content, laid out unscaled and moved by the layer transform
        let content_layer =
            egui::LayerId::new(egui::Order::Middle, egui::Id::new("playback-content"));
        let width = (viewport.width() - PAGE_MARGIN * 2.0).min(PAGE_MAX_WIDTH).max(100.0);
        let origin = egui::pos2(viewport.center().x - width / 2.0, viewport.top() + PAGE_MARGIN);
        let levels = self.overlay.settings().outline_levels.clone();
        if let Some(content) = self.overlay.content() {
            let painter = ctx.layer_painter(content_layer);
            let layout = render::draw_page(
                &painter,
                content,
                &self.theme,
                &self.images,
                &levels,
                origin,
                width,
            );
            let host = self.overlay.host_mut();
            host.heading_offsets = layout
                .heading_offsets
                .iter()
                .map(|offset| offset + PAGE_MARGIN)
                .collect();
            host.content_height = layout.height + PAGE_MARGIN * 2.0;
        }
        let transform_origin = egui::pos2(viewport.center().x, viewport.top());
        let transform = TSTransform::from_translation(egui::vec2(0.0, -self.overlay.scroll_top()))
            * self.overlay.session().transform.affine(transform_origin);
        ctx.set_transform_layer(content_layer, transform);

        // Annotations and laser sit above the content and do not move with it
        let annotations = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("playback-annotations"),
        ));
        self.upload_canvas(ctx);
        if let Some((_, texture)) = &self.canvas_texture {
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            let size = self.overlay.canvas().viewport().unwrap_or(viewport.size());
            annotations.image(
                texture.id(),
                egui::Rect::from_min_size(viewport.min, size),
                uv,
                egui::Color32::WHITE,
            );
        }

        if let Some(laser) = self.overlay.laser().visual() {
            if let (true, Some(pos)) = (laser.visible, laser.position) {
                let center = viewport.min + pos.to_vec2();
                let radius = laser.size / 2.0;
                let fill = laser.fill();
                // Outermost ring first, fading towards the edge
                let rings = LaserVisual::GLOW_RADII.iter().rev().zip([0.15, 0.35]);
                for (glow, alpha) in rings {
                    annotations.circle_filled(center, radius + glow, fill.gamma_multiply(alpha));
                }
                annotations.circle_filled(center, radius, fill);
            }
        }
    }

    fn upload_canvas(&mut self, ctx: &egui::Context) {
        let canvas = self.overlay.canvas();
        let Some(pixels) = canvas.pixels() else {
            self.canvas_texture = None;
            return;
        };
        let revision = canvas.revision();
        if self.canvas_texture.as_ref().map(|(r, _)| *r) == Some(revision) {
            return;
        }
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [pixels.width() as usize, pixels.height() as usize],
            pixels.as_raw(),
        );
        match &mut self.canvas_texture {
            Some((rev, texture)) => {
                texture.set(image, egui::TextureOptions::LINEAR);
                *rev = revision;
            }
            None => {
                let texture = ctx.load_texture("playback-canvas", image, egui::TextureOptions::LINEAR);
                self.canvas_texture = Some((revision, texture));
            }
        }
    }

    /// Draw the toolbar; returns its screen rect.
    fn toolbar(&mut self, ctx: &egui::Context, events: &mut Vec<OverlayEvent>) -> egui::Rect {
        let affordances = self.overlay.affordances().clone();
        let theme = &self.theme;
        let picker_color = &mut self.picker_color;

        egui::Area::new(egui::Id::new("playback-toolbar"))
            .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -16.0))
            .order(egui::Order::Tooltip)
            .show(ctx, |ui| {
                egui::Frame::new()
                    .fill(theme.toolbar_background)
                    .corner_radius(10.0)
                    .inner_margin(egui::Margin::symmetric(12, 8))
                    .show(ui, |ui| {
                        ui.visuals_mut().override_text_color = Some(theme.toolbar_foreground);
                        ui.horizontal(|ui| {
                            let a = &affordances;
                            tool_button(ui, a, events, Control::Drag, "Pan");
                            tool_button(ui, a, events, Control::Draw, "Pen");
                            tool_button(ui, a, events, Control::Eraser, "Eraser");
                            tool_button(ui, a, events, Control::Laser, "Laser");
                            ui.separator();

                            let response = egui::color_picker::color_edit_button_srgba(
                                ui,
                                picker_color,
                                egui::color_picker::Alpha::Opaque,
                            )
                            .on_hover_text(Control::ColorPicker.tooltip());
                            if response.changed() {
                                events.push(OverlayEvent::ColorChanged(*picker_color));
                            }
                            tool_button(ui, a, events, Control::SizeDown, "\u{2212}");
                            ui.label(&a.size_label);
                            tool_button(ui, a, events, Control::SizeUp, "+");
                            ui.separator();

                            tool_button(ui, a, events, Control::ZoomOut, "\u{2212}");
                            ui.label(&a.zoom_label);
                            tool_button(ui, a, events, Control::ZoomIn, "+");
                            tool_button(ui, a, events, Control::ZoomReset, "1:1");
                            ui.separator();

                            tool_button(ui, a, events, Control::Clear, "Clear");
                            tool_button(ui, a, events, Control::OutlineToggle, "Outline");
                            let fullscreen_label = match a.fullscreen_icon {
                                FullscreenIcon::Expand => "Fullscreen",
                                FullscreenIcon::Compress => "Windowed",
                            };
                            tool_button(ui, a, events, Control::Fullscreen, fullscreen_label);
                            tool_button(ui, a, events, Control::Exit, "Exit");
                        });
                    });
            })
            .response
            .rect
    }

    /// Draw the outline panel if it is open; returns its screen rect.
    fn outline_panel(
        &mut self,
        ctx: &egui::Context,
        events: &mut Vec<OverlayEvent>,
    ) -> Option<egui::Rect> {
        let outline = self.overlay.outline();
        if !outline.is_open() {
            return None;
        }
        let entries = outline.entries().to_vec();
        let theme = &self.theme;

        let response = egui::Area::new(egui::Id::new("playback-outline"))
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-16.0, 16.0))
            .order(egui::Order::Tooltip)
            .show(ctx, |ui| {
                egui::Frame::new()
                    .fill(theme.toolbar_background)
                    .corner_radius(10.0)
                    .inner_margin(egui::Margin::same(12))
                    .show(ui, |ui| {
                        ui.set_max_width(280.0);
                        ui.visuals_mut().override_text_color = Some(theme.toolbar_foreground);
                        ui.horizontal(|ui| {
                            ui.strong("Outline");
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    if ui
                                        .button("\u{2715}")
                                        .on_hover_text(Control::OutlineClose.tooltip())
                                        .clicked()
                                    {
                                        events.push(OverlayEvent::Click(Control::OutlineClose));
                                    }
                                },
                            );
                        });
                        ui.separator();
                        if entries.is_empty() {
                            ui.weak("No headings");
                        }
                        egui::ScrollArea::vertical()
                            .max_height(ctx.available_rect().height() * 0.7)
                            .show(ui, |ui| {
                                for entry in &entries {
                                    ui.horizontal(|ui| {
                                        ui.add_space(f32::from(entry.level.saturating_sub(1)) * 12.0);
                                        if ui.link(&entry.label).clicked() {
                                            events.push(OverlayEvent::OutlineLink(
                                                entry.source_index,
                                            ));
                                        }
                                    });
                                }
                            });
                    });
            });
        Some(response.response.rect)
    }
}

fn tool_button(
    ui: &mut egui::Ui,
    affordances: &Affordances,
    events: &mut Vec<OverlayEvent>,
    control: Control,
    label: &str,
) {
    let response = ui
        .add_enabled(
            affordances.is_enabled(control),
            egui::Button::new(label).selected(affordances.is_active(control)),
        )
        .on_hover_text(control.tooltip());
    if response.clicked() {
        events.push(OverlayEvent::Click(control));
    }
}

impl eframe::App for PlaybackApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        if self.watcher.as_ref().is_some_and(FileWatcher::changed) {
            self.reload();
        }

        let viewport = ctx.available_rect();
        {
            let host = self.overlay.host_mut();
            host.viewport = viewport.size();
            host.pixel_ratio = ctx.pixels_per_point();
        }

        if self.present_on_start {
            self.present_on_start = false;
            self.present(now);
        }

        if self.overlay.is_active() {
            self.show_overlay(ctx, viewport, now);
        } else {
            self.show_page(ctx, now);
        }

        self.overlay.tick(now);
        if let Some(wait) = self.overlay.next_deadline(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}

pub fn run(file: PathBuf, windowed: bool, present: bool, watch: bool) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&file)?;
    let settings = Config::load_or_default().settings();
    let page = markdown::parse_page(&source, &settings.marker_class);
    let windowed = windowed || settings.windowed;

    let title = format!(
        "playback - {}",
        file.file_name().unwrap_or_default().to_string_lossy()
    );

    let viewport = if windowed {
        egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_title(&title)
    } else {
        egui::ViewportBuilder::default()
            .with_maximized(true)
            .with_title(&title)
    };

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    tracing::debug!(file = %file.display(), windowed, present, watch, "starting viewer");
    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            Ok(Box::new(PlaybackApp::new(
                &cc.egui_ctx,
                file,
                page,
                settings,
                present,
                watch,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
