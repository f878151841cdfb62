pub mod markdown;

/// A node of the page tree handed to the overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_child(Node::text(text))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    pub fn remove_class(&mut self, class: &str) {
        if !self.has_class(class) {
            return;
        }
        let rest: Vec<&str> = self.classes().filter(|c| *c != class).collect();
        if rest.is_empty() {
            self.remove_attr("class");
        } else {
            let joined = rest.join(" ");
            self.set_attr("class", joined);
        }
    }

    /// `1..=6` for `h1`..`h6`.
    pub fn heading_level(&self) -> Option<u8> {
        let digits = self.tag.strip_prefix('h').or_else(|| self.tag.strip_prefix('H'))?;
        match digits.parse::<u8>() {
            Ok(level @ 1..=6) => Some(level),
            _ => None,
        }
    }

    /// Concatenated descendant text, trimmed at both ends.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out.trim().to_string()
    }

    /// First element (self included) carrying `class`, in document order.
    pub fn find_by_class(&self, class: &str) -> Option<&Element> {
        if self.has_class(class) {
            return Some(self);
        }
        self.children
            .iter()
            .filter_map(Node::as_element)
            .find_map(|child| child.find_by_class(class))
    }

    /// Drop every descendant element carrying `class`. Returns how many were removed.
    pub fn remove_by_class(&mut self, class: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|child| !matches!(child, Node::Element(el) if el.has_class(class)));
        let mut removed = before - self.children.len();
        for child in &mut self.children {
            if let Node::Element(el) = child {
                removed += el.remove_by_class(class);
            }
        }
        removed
    }

    /// Pre-order walk over self and every descendant element.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for child in &self.children {
            if let Node::Element(el) = child {
                el.walk(f);
            }
        }
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(el) = child {
                el.walk_mut(f);
            }
        }
    }

    /// Point lazily-loaded images at their real source.
    ///
    /// `data-original` wins over `data-src`, which wins over the current `src`.
    /// The lazy marker is removed only from images that ended up with a source.
    pub fn resolve_lazy_images(&mut self, lazy_class: &str) -> usize {
        let mut resolved = 0;
        self.walk_mut(&mut |el| {
            if el.tag != "img" || !el.has_class(lazy_class) {
                return;
            }
            // Empty attributes fall through to the next candidate
            let src = [el.attr("data-original"), el.attr("data-src"), el.attr("src")]
                .into_iter()
                .flatten()
                .find(|s| !s.is_empty())
                .map(str::to_string);
            if let Some(src) = src {
                el.set_attr("src", src);
                el.remove_class(lazy_class);
                resolved += 1;
            }
        });
        resolved
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if e.tag == "br" => out.push('\n'),
            Node::Element(e) => collect_text(e, out),
        }
    }
}
