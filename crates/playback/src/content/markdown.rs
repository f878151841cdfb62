use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;

use super::{Element, Node};

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\s*([a-zA-Z][a-zA-Z0-9]*)([^>]*?)/?\s*>").unwrap());
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Build the page tree for a markdown document.
///
/// The document body is wrapped as `body > article.<marker_class>`, which is the
/// element the overlay looks for when it is activated.
pub fn parse_page(source: &str, marker_class: &str) -> Element {
    let article = parse_blocks(source).with_class(marker_class);
    Element::new("body").with_child(article)
}

fn parse_blocks(source: &str) -> Element {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut stack: Vec<Element> = vec![Element::new("article")];
    let mut html_block: Option<String> = None;

    for event in Parser::new_ext(source, options) {
        match event {
            Event::Start(Tag::HtmlBlock) => html_block = Some(String::new()),
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(raw) = html_block.take() {
                    if let Some(el) = html_block_element(&raw) {
                        append(&mut stack, el.into());
                    }
                }
            }
            Event::Html(raw) => match html_block.as_mut() {
                Some(buf) => buf.push_str(&raw),
                None => {
                    if let Some(el) = html_block_element(&raw) {
                        append(&mut stack, el.into());
                    }
                }
            },
            Event::InlineHtml(raw) => {
                for img in img_tags(&raw) {
                    append(&mut stack, img.into());
                }
                if raw.trim_start().starts_with("<br") {
                    append(&mut stack, Element::new("br").into());
                }
            }
            Event::Start(tag) => stack.push(element_for(&tag)),
            Event::End(_) => {
                if stack.len() > 1 {
                    if let Some(el) = stack.pop() {
                        append(&mut stack, finish(el).into());
                    }
                }
            }
            Event::Text(text) => append(&mut stack, Node::text(text.to_string())),
            Event::Code(code) => {
                append(&mut stack, Element::new("code").with_text(&code).into());
            }
            Event::SoftBreak => append(&mut stack, Node::text(" ")),
            Event::HardBreak => append(&mut stack, Element::new("br").into()),
            Event::Rule => append(&mut stack, Element::new("hr").into()),
            _ => {}
        }
    }

    // Unbalanced input: fold whatever is still open into its parent
    while stack.len() > 1 {
        if let Some(el) = stack.pop() {
            append(&mut stack, finish(el).into());
        }
    }
    stack.pop().unwrap_or_else(|| Element::new("article"))
}

fn append(stack: &mut [Element], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn element_for(tag: &Tag<'_>) -> Element {
    match tag {
        Tag::Paragraph => Element::new("p"),
        Tag::Heading { level, .. } => Element::new(heading_tag(*level)),
        Tag::BlockQuote(_) => Element::new("blockquote"),
        Tag::CodeBlock(kind) => {
            let pre = Element::new("pre");
            match kind {
                CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                    pre.with_attr("data-lang", lang.to_string())
                }
                _ => pre,
            }
        }
        Tag::List(Some(start)) => Element::new("ol").with_attr("start", start.to_string()),
        Tag::List(None) => Element::new("ul"),
        Tag::Item => Element::new("li"),
        Tag::Emphasis => Element::new("em"),
        Tag::Strong => Element::new("strong"),
        Tag::Strikethrough => Element::new("del"),
        Tag::Link { dest_url, .. } => Element::new("a").with_attr("href", dest_url.to_string()),
        Tag::Image {
            dest_url, title, ..
        } => {
            let img = Element::new("img").with_attr("src", dest_url.to_string());
            if title.is_empty() {
                img
            } else {
                img.with_attr("title", title.to_string())
            }
        }
        Tag::Table(_) => Element::new("table"),
        Tag::TableHead => Element::new("thead"),
        Tag::TableRow => Element::new("tr"),
        Tag::TableCell => Element::new("td"),
        _ => Element::new("div"),
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

/// Images carry their alt text as an attribute rather than as children.
fn finish(mut el: Element) -> Element {
    if el.tag == "img" {
        let alt = el.text_content();
        el.children.clear();
        if !alt.is_empty() {
            el.set_attr("alt", alt);
        }
    }
    el
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            (caps[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

fn img_tags(raw: &str) -> Vec<Element> {
    TAG_RE
        .captures_iter(raw)
        .filter(|caps| caps[1].eq_ignore_ascii_case("img"))
        .map(|caps| Element {
            tag: "img".to_string(),
            attrs: parse_attrs(&caps[2]),
            children: Vec::new(),
        })
        .collect()
}

/// Fold a raw HTML block into a single element.
///
/// The block keeps the tag and attributes of its first tag, its images, and its
/// text with all markup stripped.
fn html_block_element(raw: &str) -> Option<Element> {
    let first = TAG_RE.captures(raw)?;
    let tag = first[1].to_ascii_lowercase();
    let images = img_tags(raw);

    if tag == "img" {
        return match images.len() {
            1 => images.into_iter().next(),
            _ => Some(Element {
                tag: "p".to_string(),
                attrs: Vec::new(),
                children: images.into_iter().map(Node::from).collect(),
            }),
        };
    }

    let text = ANY_TAG_RE.replace_all(raw, " ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut el = Element {
        tag,
        attrs: parse_attrs(&first[2]),
        children: Vec::new(),
    };
    if !text.is_empty() {
        el.children.push(Element::new("p").with_text(&text).into());
    }
    el.children.extend(images.into_iter().map(Node::from));
    Some(el)
}
