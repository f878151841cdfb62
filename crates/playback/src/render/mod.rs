pub mod image_cache;

use eframe::egui::{self, Color32, FontFamily, FontId, Pos2, Stroke};

use crate::content::{Element, Node};
use crate::overlay::toc;
use crate::theme::Theme;

use image_cache::ImageCache;

const MAX_IMAGE_HEIGHT: f32 = 480.0;

/// What drawing a page produced, in unscaled content coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub height: f32,
    /// Top of every outline heading, in document order, relative to the
    /// content origin.
    pub heading_offsets: Vec<f32>,
}

/// Draw `content` as a single column starting at `origin`.
pub fn draw_page(
    painter: &egui::Painter,
    content: &Element,
    theme: &Theme,
    images: &ImageCache,
    outline_levels: &[u8],
    origin: Pos2,
    width: f32,
) -> PageLayout {
    let mut page = PageRenderer {
        painter,
        theme,
        images,
        outline_levels,
        origin,
        heading_offsets: Vec::new(),
    };
    let height = page.block(content, origin, width);
    PageLayout {
        height,
        heading_offsets: page.heading_offsets,
    }
}

struct PageRenderer<'a> {
    painter: &'a egui::Painter,
    theme: &'a Theme,
    images: &'a ImageCache,
    outline_levels: &'a [u8],
    origin: Pos2,
    heading_offsets: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    code: bool,
    strike: bool,
    link: bool,
}

fn is_inline(tag: &str) -> bool {
    matches!(
        tag,
        "strong" | "b" | "em" | "i" | "code" | "del" | "s" | "a" | "br" | "span"
    )
}

impl PageRenderer<'_> {
    fn spacing(&self) -> f32 {
        self.theme.body_size * 0.7
    }

    /// Draw one block element. Returns height used.
    fn block(&mut self, el: &Element, pos: Pos2, width: f32) -> f32 {
        if let Some(level) = el.heading_level() {
            return self.heading(el, level, pos, width);
        }
        match el.tag.as_str() {
            "p" => self.paragraph(el, pos, width),
            "ul" | "ol" => self.list(el, pos, width),
            "blockquote" => self.blockquote(el, pos, width),
            "pre" => self.code_block(el, pos, width),
            "hr" => {
                let y = pos.y + self.spacing() / 2.0;
                self.painter.line_segment(
                    [Pos2::new(pos.x, y), Pos2::new(pos.x + width, y)],
                    Stroke::new(1.0, Theme::with_opacity(self.theme.accent, 0.5)),
                );
                self.spacing()
            }
            "img" => self.image(el, pos, width),
            "table" => self.table(el, pos, width),
            "br" => 0.0,
            _ => self.children(&el.children, pos, width),
        }
    }

    /// Draw a run of sibling nodes, grouping stray inline content into
    /// paragraphs.
    fn children(&mut self, children: &[Node], pos: Pos2, width: f32) -> f32 {
        let mut y = 0.0;
        let mut inline_run: Vec<&Node> = Vec::new();

        for child in children {
            match child {
                Node::Element(el) if !is_inline(&el.tag) => {
                    y += self.inline_run(&inline_run, Pos2::new(pos.x, pos.y + y), width);
                    inline_run.clear();
                    let h = self.block(el, Pos2::new(pos.x, pos.y + y), width);
                    if h > 0.0 {
                        y += h + self.spacing();
                    }
                }
                _ => inline_run.push(child),
            }
        }
        y += self.inline_run(&inline_run, Pos2::new(pos.x, pos.y + y), width);

        // No trailing gap after the last block
        if y > 0.0 {
            (y - self.spacing()).max(0.0)
        } else {
            0.0
        }
    }

    fn inline_run(&mut self, nodes: &[&Node], pos: Pos2, width: f32) -> f32 {
        if nodes.is_empty() {
            return 0.0;
        }
        let mut job = egui::text::LayoutJob::default();
        job.wrap.max_width = width;
        for node in nodes {
            self.append_inline(
                &mut job,
                node,
                self.theme.body_size,
                self.theme.foreground,
                InlineStyle::default(),
            );
        }
        if job.text.trim().is_empty() {
            return 0.0;
        }
        self.draw_job(job, pos) + self.spacing()
    }

    fn draw_job(&self, job: egui::text::LayoutJob, pos: Pos2) -> f32 {
        let galley = self.painter.layout_job(job);
        let height = galley.rect.height();
        self.painter.galley(pos, galley, self.theme.foreground);
        height
    }

    fn heading(&mut self, el: &Element, level: u8, pos: Pos2, width: f32) -> f32 {
        if toc::outline_level(el, self.outline_levels).is_some() {
            self.heading_offsets.push(pos.y - self.origin.y);
        }
        let mut job = egui::text::LayoutJob::default();
        job.wrap.max_width = width;
        let size = self.theme.heading_size(level);
        for child in &el.children {
            self.append_inline(
                &mut job,
                child,
                size,
                self.theme.heading_color,
                InlineStyle {
                    bold: true,
                    ..Default::default()
                },
            );
        }
        if job.text.trim().is_empty() {
            return 0.0;
        }
        self.draw_job(job, pos)
    }

    fn paragraph(&mut self, el: &Element, pos: Pos2, width: f32) -> f32 {
        let mut job = egui::text::LayoutJob::default();
        job.wrap.max_width = width;
        for child in &el.children {
            self.append_inline(
                &mut job,
                child,
                self.theme.body_size,
                self.theme.foreground,
                InlineStyle::default(),
            );
        }
        let mut y = 0.0;
        if !job.text.trim().is_empty() {
            y += self.draw_job(job, pos);
        }

        // Images inside the paragraph go below its text
        let mut images = Vec::new();
        el.walk(&mut |d| {
            if d.tag == "img" {
                images.push(d);
            }
        });
        for img in images {
            if y > 0.0 {
                y += self.spacing();
            }
            y += self.image(img, Pos2::new(pos.x, pos.y + y), width);
        }
        y
    }

    fn list(&mut self, el: &Element, pos: Pos2, width: f32) -> f32 {
        let ordered = el.tag == "ol";
        let mut number: usize = el.attr("start").and_then(|s| s.parse().ok()).unwrap_or(1);
        let indent = self.theme.body_size * 1.6;
        let item_spacing = self.theme.body_size * 0.3;
        let color = self.theme.foreground;
        let mut y = 0.0;

        for item in el.children.iter().filter_map(Node::as_element) {
            let marker = if ordered {
                format!("{number}.")
            } else {
                "\u{2022}".to_string()
            };
            number += 1;

            let item_pos = Pos2::new(pos.x, pos.y + y);
            let marker_galley = self.painter.layout_no_wrap(
                marker,
                FontId::new(self.theme.body_size, FontFamily::Proportional),
                color,
            );
            self.painter.galley(item_pos, marker_galley, color);

            let h = self.children(
                &item.children,
                Pos2::new(pos.x + indent, item_pos.y),
                width - indent,
            );
            y += h.max(self.theme.body_size) + item_spacing;
        }
        (y - item_spacing).max(0.0)
    }

    fn blockquote(&mut self, el: &Element, pos: Pos2, width: f32) -> f32 {
        let bar_width = 4.0;
        let bar_padding = 16.0;
        let height = self.children(
            &el.children,
            Pos2::new(pos.x + bar_width + bar_padding, pos.y),
            width - bar_width - bar_padding,
        );
        let bar = egui::Rect::from_min_size(pos, egui::vec2(bar_width, height));
        self.painter.rect_filled(bar, 2.0, self.theme.accent);
        height
    }

    fn code_block(&mut self, el: &Element, pos: Pos2, width: f32) -> f32 {
        let padding = 12.0;
        let mut code = String::new();
        collect_raw_text(el, &mut code);
        let code = code.trim_end_matches('\n');

        let mut job = egui::text::LayoutJob::default();
        job.wrap.max_width = width - padding * 2.0;
        job.append(
            code,
            0.0,
            egui::text::TextFormat {
                font_id: FontId::new(self.theme.code_size, FontFamily::Monospace),
                color: self.theme.code_foreground,
                ..Default::default()
            },
        );
        let galley = self.painter.layout_job(job);
        let total = galley.rect.height() + padding * 2.0;

        let bg = egui::Rect::from_min_size(pos, egui::vec2(width, total));
        self.painter.rect_filled(bg, 6.0, self.theme.code_background);
        self.painter.galley(
            Pos2::new(pos.x + padding, pos.y + padding),
            galley,
            self.theme.code_foreground,
        );
        total
    }

    fn table(&mut self, el: &Element, pos: Pos2, width: f32) -> f32 {
        let mut rows: Vec<&Element> = Vec::new();
        el.walk(&mut |d| {
            if d.tag == "tr" {
                rows.push(d);
            }
        });
        let row_height = self.theme.body_size * 1.6;
        let font = FontId::new(self.theme.body_size * 0.9, FontFamily::Proportional);

        for (i, row) in rows.iter().enumerate() {
            let cells: Vec<&Element> = row.children.iter().filter_map(Node::as_element).collect();
            if cells.is_empty() {
                continue;
            }
            let cell_width = width / cells.len() as f32;
            let y = pos.y + i as f32 * row_height;
            if i == 0 {
                let header = egui::Rect::from_min_size(
                    Pos2::new(pos.x, y),
                    egui::vec2(width, row_height),
                );
                self.painter
                    .rect_filled(header, 0.0, Theme::with_opacity(self.theme.accent, 0.12));
            }
            for (c, cell) in cells.iter().enumerate() {
                let text_pos = Pos2::new(pos.x + c as f32 * cell_width + 6.0, y + 4.0);
                let galley = self.painter.layout(
                    cell.text_content(),
                    font.clone(),
                    self.theme.foreground,
                    cell_width - 12.0,
                );
                self.painter.galley(text_pos, galley, self.theme.foreground);
            }
        }
        rows.len() as f32 * row_height
    }

    fn image(&mut self, el: &Element, pos: Pos2, width: f32) -> f32 {
        let src = el.attr("src").unwrap_or("");
        let Some(texture) = self.images.get_or_load(self.painter.ctx(), src) else {
            return self.image_placeholder(el.attr("alt").unwrap_or(src), pos, width);
        };
        let size = texture.size_vec2();
        if size.x <= 0.0 || size.y <= 0.0 {
            return 0.0;
        }
        let scale = (width / size.x).min(MAX_IMAGE_HEIGHT / size.y).min(1.0);
        let draw = egui::Rect::from_min_size(pos, size * scale);
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        self.painter.image(texture.id(), draw, uv, Color32::WHITE);
        draw.height()
    }

    fn image_placeholder(&self, label: &str, pos: Pos2, width: f32) -> f32 {
        let height = self.theme.body_size * 3.0;
        let rect = egui::Rect::from_min_size(pos, egui::vec2(width.min(320.0), height));
        self.painter
            .rect_filled(rect, 4.0, Theme::with_opacity(self.theme.code_background, 1.0));
        self.painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            label,
            FontId::new(self.theme.body_size * 0.8, FontFamily::Proportional),
            Theme::with_opacity(self.theme.foreground, 0.6),
        );
        height
    }

    fn append_inline(
        &self,
        job: &mut egui::text::LayoutJob,
        node: &Node,
        font_size: f32,
        color: Color32,
        style: InlineStyle,
    ) {
        match node {
            Node::Text(text) => {
                let family = if style.code {
                    FontFamily::Monospace
                } else {
                    FontFamily::Proportional
                };
                let size = match (style.code, style.bold) {
                    (true, _) => font_size * 0.85,
                    (false, true) => font_size + 1.0,
                    (false, false) => font_size,
                };
                let color = if style.link { self.theme.accent } else { color };
                let format = egui::text::TextFormat {
                    font_id: FontId::new(size, family),
                    color,
                    italics: style.italic,
                    background: if style.code {
                        Color32::from_rgba_unmultiplied(128, 128, 128, 30)
                    } else {
                        Color32::TRANSPARENT
                    },
                    strikethrough: if style.strike {
                        Stroke::new(1.0, color)
                    } else {
                        Stroke::NONE
                    },
                    underline: if style.link {
                        Stroke::new(1.0, color)
                    } else {
                        Stroke::NONE
                    },
                    ..Default::default()
                };
                job.append(text, 0.0, format);
            }
            Node::Element(el) => {
                let mut style = style;
                match el.tag.as_str() {
                    "br" => {
                        job.append("\n", 0.0, egui::text::TextFormat::default());
                        return;
                    }
                    // Drawn as blocks by the paragraph
                    "img" => return,
                    "strong" | "b" => style.bold = true,
                    "em" | "i" => style.italic = true,
                    "code" => style.code = true,
                    "del" | "s" => style.strike = true,
                    "a" => style.link = true,
                    _ => {}
                }
                for child in &el.children {
                    self.append_inline(job, child, font_size, color, style);
                }
            }
        }
    }
}

fn collect_raw_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) => collect_raw_text(inner, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::markdown;
    use std::path::PathBuf;

    fn layout(source: &str) -> PageLayout {
        let page = markdown::parse_page(source, "post-content");
        let theme = Theme::light();
        let images = ImageCache::new(PathBuf::from("."));
        let ctx = egui::Context::default();
        let mut result = PageLayout::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            let painter = ctx.layer_painter(egui::LayerId::background());
            result = draw_page(
                &painter,
                &page,
                &theme,
                &images,
                &[1, 2, 3, 4, 5],
                Pos2::new(10.0, 20.0),
                600.0,
            );
        });
        result
    }

    #[test]
    fn test_heading_offsets_follow_document_order() {
        let source = "# One\n\nSome text here.\n\n## Two\n\n- a\n- b\n\n### Three\n\n###### Six\n";
        let page = layout(source);
        assert_eq!(page.heading_offsets.len(), 3);
        assert_eq!(page.heading_offsets[0], 0.0);
        assert!(page.heading_offsets.windows(2).all(|w| w[0] < w[1]));
        assert!(page.height > page.heading_offsets[2]);
    }

    #[test]
    fn test_offsets_match_outline_indices() {
        let source = "## Intro\n\n<div class=\"aisummary\">summary</div>\n\n### Details\n\n> ## Quoted\n";
        let page = markdown::parse_page(source, "post-content");
        let levels = [1, 2, 3, 4, 5];
        assert_eq!(
            layout(source).heading_offsets.len(),
            toc::heading_count(&page, &levels)
        );
    }
}
