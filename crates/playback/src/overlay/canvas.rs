use eframe::egui::{Color32, Pos2, Vec2};
use image::{Rgba, RgbaImage};

use super::error::CanvasError;

/// Largest backing buffer edge, in device pixels.
pub const MAX_SURFACE_EDGE: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositing {
    /// Normal paint.
    SourceOver,
    /// Remove existing pixels where the stroke covers them.
    DestinationOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Color32,
    /// Line width in CSS pixels.
    pub width: f32,
    pub compositing: Compositing,
}

impl StrokeStyle {
    pub fn pen(color: Color32, width: f32) -> Self {
        Self {
            color,
            width,
            compositing: Compositing::SourceOver,
        }
    }

    pub fn eraser(width: f32) -> Self {
        Self {
            color: Color32::BLACK,
            width,
            compositing: Compositing::DestinationOut,
        }
    }
}

/// The drawable context: a device-pixel buffer plus the CSS → device scale.
#[derive(Debug)]
struct Context {
    pixels: RgbaImage,
    pixel_ratio: f32,
    viewport: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct ActiveStroke {
    style: StrokeStyle,
    last: Pos2,
}

/// Raster annotation layer laid over the presented content.
///
/// Coordinates passed in are CSS pixels (egui points); the buffer is sized
/// `viewport × pixel_ratio`. Nothing survives a reinitialization.
#[derive(Debug)]
pub struct AnnotationCanvas {
    has_element: bool,
    context: Option<Context>,
    stroke: Option<ActiveStroke>,
    compositing: Compositing,
    revision: u64,
}

impl AnnotationCanvas {
    /// `has_element` is false when the overlay skeleton has no canvas at all.
    pub fn new(has_element: bool) -> Self {
        Self {
            has_element,
            context: None,
            stroke: None,
            compositing: Compositing::SourceOver,
            revision: 0,
        }
    }

    /// Allocate a fresh, empty surface for the current viewport.
    ///
    /// The previous context is dropped before anything else so a failed
    /// initialization never leaves a stale surface to draw on.
    pub fn initialize(&mut self, viewport: Vec2, pixel_ratio: f32) -> Result<(), CanvasError> {
        self.context = None;
        self.stroke = None;
        self.compositing = Compositing::SourceOver;
        self.revision += 1;

        if !self.has_element {
            return Err(CanvasError::NoSurface);
        }

        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        let width = (viewport.x.max(0.0) * pixel_ratio).round() as u32;
        let height = (viewport.y.max(0.0) * pixel_ratio).round() as u32;
        if width == 0 || height == 0 || width > MAX_SURFACE_EDGE || height > MAX_SURFACE_EDGE {
            return Err(CanvasError::NoContext { width, height });
        }

        self.context = Some(Context {
            pixels: RgbaImage::new(width, height),
            pixel_ratio,
            viewport,
        });
        Ok(())
    }

    /// Drop the surface entirely.
    pub fn release(&mut self) {
        self.clear();
        self.context = None;
        self.stroke = None;
        self.compositing = Compositing::SourceOver;
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_some()
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn compositing(&self) -> Compositing {
        self.compositing
    }

    /// Bumped on every change to the pixels, so renderers can skip re-uploads.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.context.as_ref().map(|c| &c.pixels)
    }

    pub fn pixel_ratio(&self) -> Option<f32> {
        self.context.as_ref().map(|c| c.pixel_ratio)
    }

    pub fn viewport(&self) -> Option<Vec2> {
        self.context.as_ref().map(|c| c.viewport)
    }

    pub fn is_blank(&self) -> bool {
        self.pixels()
            .is_none_or(|p| p.pixels().all(|px| px.0[3] == 0))
    }

    pub fn clear(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.pixels.fill(0);
            self.revision += 1;
        }
    }

    /// Start a path at `point`. Returns false when there is nothing to draw on.
    pub fn begin_stroke(&mut self, point: Pos2, style: StrokeStyle) -> bool {
        if self.context.is_none() {
            return false;
        }
        self.compositing = style.compositing;
        self.stroke = Some(ActiveStroke { style, last: point });
        true
    }

    /// Paint the segment from the previous point to `point` right away.
    pub fn extend_stroke(&mut self, point: Pos2) -> bool {
        let (Some(stroke), Some(ctx)) = (self.stroke.as_mut(), self.context.as_mut()) else {
            return false;
        };
        paint_segment(ctx, stroke.last, point, &stroke.style);
        stroke.last = point;
        self.revision += 1;
        true
    }

    /// Finish the current path and go back to normal compositing.
    pub fn end_stroke(&mut self) -> bool {
        self.compositing = Compositing::SourceOver;
        self.stroke.take().is_some()
    }
}

fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    (p - (a + ab * t)).length()
}

/// Stamp a round-capped segment. A device pixel is covered when its center is
/// within half the line width of the segment.
fn paint_segment(ctx: &mut Context, from: Pos2, to: Pos2, style: &StrokeStyle) {
    let ratio = ctx.pixel_ratio;
    let a = Pos2::new(from.x * ratio, from.y * ratio);
    let b = Pos2::new(to.x * ratio, to.y * ratio);
    let half = (style.width * ratio / 2.0).max(0.5);

    let (w, h) = ctx.pixels.dimensions();
    let x0 = (a.x.min(b.x) - half).floor().max(0.0) as u32;
    let y0 = (a.y.min(b.y) - half).floor().max(0.0) as u32;
    let x1 = ((a.x.max(b.x) + half).ceil().max(0.0) as u32).min(w);
    let y1 = ((a.y.max(b.y) + half).ceil().max(0.0) as u32).min(h);

    for y in y0..y1 {
        for x in x0..x1 {
            let center = Pos2::new(x as f32 + 0.5, y as f32 + 0.5);
            if distance_to_segment(center, a, b) > half {
                continue;
            }
            let px = ctx.pixels.get_pixel_mut(x, y);
            *px = composite(*px, style);
        }
    }
}

fn composite(dst: Rgba<u8>, style: &StrokeStyle) -> Rgba<u8> {
    let src_a = style.color.a() as f32 / 255.0;
    let dst_a = dst.0[3] as f32 / 255.0;
    match style.compositing {
        Compositing::DestinationOut => {
            let out_a = dst_a * (1.0 - src_a);
            if out_a <= 0.0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([dst.0[0], dst.0[1], dst.0[2], (out_a * 255.0).round() as u8])
            }
        }
        Compositing::SourceOver => {
            let [r, g, b, _] = style.color.to_srgba_unmultiplied();
            let out_a = src_a + dst_a * (1.0 - src_a);
            if out_a <= 0.0 {
                return Rgba([0, 0, 0, 0]);
            }
            let mix = |s: u8, d: u8| {
                ((s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a).round() as u8
            };
            Rgba([
                mix(r, dst.0[0]),
                mix(g, dst.0[1]),
                mix(b, dst.0[2]),
                (out_a * 255.0).round() as u8,
            ])
        }
    }
}
