use crate::content::Element;

#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub anchor_id: String,
    pub level: u8,
    pub label: String,
    /// Position among all matched headings; the key used for navigation.
    pub source_index: usize,
}

pub fn anchor_id(index: usize) -> String {
    format!("toc-title-{index}")
}

/// Level of `el` if it is one of the outline heading levels.
pub fn outline_level(el: &Element, levels: &[u8]) -> Option<u8> {
    el.heading_level().filter(|level| levels.contains(level))
}

/// Number of headings matched by `levels`, empty ones included.
pub fn heading_count(content: &Element, levels: &[u8]) -> usize {
    let mut count = 0;
    content.walk(&mut |el| {
        if outline_level(el, levels).is_some() {
            count += 1;
        }
    });
    count
}

/// Scan `content` in document order and tag each matched heading with its
/// anchor id.
///
/// Headings with no text still take up an index, so indices always line up
/// with the n-th matched heading, but they get no entry.
pub fn build(content: &mut Element, levels: &[u8]) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    let mut index = 0;
    content.walk_mut(&mut |el| {
        let Some(level) = outline_level(el, levels) else {
            return;
        };
        let source_index = index;
        index += 1;

        let label = el.text_content();
        if label.is_empty() {
            return;
        }
        let anchor = anchor_id(source_index);
        el.set_attr("id", anchor.clone());
        entries.push(TocEntry {
            anchor_id: anchor,
            level,
            label,
            source_index,
        });
    });
    entries
}

/// Viewport scroll position that brings a heading into view.
pub fn scroll_target(offset_top: f32, scale: f32, clearance: f32) -> f32 {
    offset_top * scale - clearance
}

/// The outline panel: built lazily on first open, once per activation.
#[derive(Debug, Default)]
pub struct Outline {
    entries: Vec<TocEntry>,
    built: bool,
    open: bool,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the panel, building the entries from `content` the first time.
    pub fn open(&mut self, content: Option<&mut Element>, levels: &[u8]) {
        if !self.built {
            if let Some(content) = content {
                self.entries = build(content, levels);
                self.built = true;
                tracing::debug!(entries = self.entries.len(), "outline built");
            }
        }
        self.open = true;
    }

    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Empty the panel and forget it was ever built.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.built = false;
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Node;

    const LEVELS: [u8; 5] = [1, 2, 3, 4, 5];

    fn content() -> Element {
        Element::new("article")
            .with_child(Element::new("h2").with_text("Intro"))
            .with_child(Element::new("p").with_text("text"))
            .with_child(
                Element::new("section")
                    .with_child(Element::new("h3").with_text("Details"))
                    .with_child(Element::new("h6").with_text("Too deep")),
            )
    }

    #[test]
    fn test_entries_in_document_order() {
        let mut c = content();
        let entries = build(&mut c, &LEVELS);
        assert_eq!(
            entries,
            vec![
                TocEntry {
                    anchor_id: "toc-title-0".into(),
                    level: 2,
                    label: "Intro".into(),
                    source_index: 0,
                },
                TocEntry {
                    anchor_id: "toc-title-1".into(),
                    level: 3,
                    label: "Details".into(),
                    source_index: 1,
                },
            ]
        );
        let h2 = c.children[0].as_element().unwrap();
        assert_eq!(h2.attr("id"), Some("toc-title-0"));
    }

    #[test]
    fn test_empty_heading_keeps_its_index() {
        let mut c = Element::new("article")
            .with_child(Element::new("h1").with_text("   "))
            .with_child(Element::new("h2").with_text("Second"));
        let entries = build(&mut c, &LEVELS);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_index, 1);
        assert_eq!(entries[0].anchor_id, "toc-title-1");
        assert_eq!(heading_count(&c, &LEVELS), 2);
    }

    #[test]
    fn test_rebuild_is_stable() {
        let mut c = content();
        let first = build(&mut c, &LEVELS);
        let second = build(&mut c, &LEVELS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_outline_builds_once() {
        let mut c = content();
        let mut outline = Outline::new();
        outline.open(Some(&mut c), &LEVELS);
        assert_eq!(outline.entries().len(), 2);

        // Later edits to the content do not leak into an already built outline
        c.children.push(Node::from(Element::new("h2").with_text("Appendix")));
        outline.close();
        outline.open(Some(&mut c), &LEVELS);
        assert_eq!(outline.entries().len(), 2);

        outline.reset();
        assert!(!outline.is_built());
        outline.open(Some(&mut c), &LEVELS);
        assert_eq!(outline.entries().len(), 3);
    }

    #[test]
    fn test_scroll_target() {
        assert_eq!(scroll_target(500.0, 1.0, 60.0), 440.0);
        assert_eq!(scroll_target(500.0, 1.5, 60.0), 690.0);
    }
}
