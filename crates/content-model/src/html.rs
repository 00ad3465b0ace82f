//! Tolerant HTML fragment parsing and deterministic serialization for [`Dom`].
//!
//! Parsing never fails: stray closing tags are dropped, unclosed elements are closed at the
//! end of input, and unknown entities are kept literally.

use crate::dom::{Dom, DomError, NodeData, NodeId};

pub const ENTITY_PLACEHOLDER_PREFIX: &str = "_Entity:";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Parses `html` into detached top-level nodes.
pub fn parse_fragment(dom: &mut Dom, html: &str) -> Vec<NodeId> {
    let mut parser = Parser {
        dom,
        input: html,
        pos: 0,
        stack: Vec::new(),
        roots: Vec::new(),
    };
    parser.run();
    parser.roots
}

/// Replaces the children of `container` with the parsed fragment.
pub fn set_inner_html(dom: &mut Dom, container: NodeId, html: &str) -> Result<(), DomError> {
    dom.clear_children(container)?;
    for node in parse_fragment(dom, html) {
        dom.append_child(container, node)?;
    }
    Ok(())
}

pub fn inner_html(dom: &Dom, node: NodeId) -> String {
    inner_html_with_placeholders(dom, node, |_| None)
}

/// Serializes the children of `node`, writing `<!--_Entity:id-->` in place of every node for
/// which `placeholder` returns an entity id.
pub fn inner_html_with_placeholders(
    dom: &Dom,
    node: NodeId,
    placeholder: impl Fn(NodeId) -> Option<String>,
) -> String {
    let mut out = String::new();
    for child in dom.children(node) {
        write_node(dom, *child, &placeholder, &mut out);
    }
    out
}

pub fn outer_html(dom: &Dom, node: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, node, &|_| None, &mut out);
    out
}

fn write_placeholder(entity_id: &str, out: &mut String) {
    out.push_str("<!--");
    out.push_str(ENTITY_PLACEHOLDER_PREFIX);
    out.push_str(entity_id);
    out.push_str("-->");
}

fn write_node(dom: &Dom, node: NodeId, placeholder: &dyn Fn(NodeId) -> Option<String>, out: &mut String) {
    if let Some(entity_id) = placeholder(node) {
        write_placeholder(&entity_id, out);
        return;
    }
    match dom.data(node) {
        Some(NodeData::Element(el)) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if is_void_tag(&el.tag) {
                return;
            }
            for child in dom.children(node) {
                write_node(dom, *child, placeholder, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
        Some(NodeData::Text(text)) => escape_into(text, false, out),
        Some(NodeData::Comment(text)) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Some(NodeData::EntityPlaceholder { entity_id }) => write_placeholder(entity_id, out),
        None => {}
    }
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.bytes().take(12).position(|b| b == b';') else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let name = &rest[1..semi];
        let decoded = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ if name.starts_with("#x") || name.starts_with("#X") => {
                u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
            }
            _ if name.starts_with('#') => name[1..].parse::<u32>().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct Parser<'a> {
    dom: &'a mut Dom,
    input: &'a str,
    pos: usize,
    stack: Vec<NodeId>,
    roots: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn attach(&mut self, node: NodeId) {
        match self.stack.last() {
            Some(parent) => self.dom.adopt(*parent, node),
            None => self.roots.push(node),
        }
    }

    fn run(&mut self) {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if let Some(after) = rest.strip_prefix("<!--") {
                let (body, consumed) = match after.find("-->") {
                    Some(end) => (&after[..end], 4 + end + 3),
                    None => (after, rest.len()),
                };
                let node = match body.strip_prefix(ENTITY_PLACEHOLDER_PREFIX) {
                    Some(id) => self.dom.create_entity_placeholder(id),
                    None => self.dom.create_comment(body),
                };
                self.attach(node);
                self.pos += consumed;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos += rest.find('>').map(|ix| ix + 1).unwrap_or(rest.len());
            } else if rest.starts_with("</") {
                self.close_tag();
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.open_tag();
            } else {
                self.text();
            }
        }
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A '<' that does not start markup is literal text.
        let skip = usize::from(rest.starts_with('<'));
        let end = rest[skip..].find('<').map(|ix| ix + skip).unwrap_or(rest.len());
        let raw = &rest[..end];
        let decoded = decode_entities(raw);
        self.pos += end;

        let merged = match self.stack.last() {
            Some(parent) => self.dom.last_child(*parent),
            None => self.roots.last().copied(),
        }
        .and_then(|last| self.dom.text(last).map(|t| (last, format!("{t}{decoded}"))));

        match merged {
            Some((last, combined)) => {
                let _ = self.dom.set_text(last, &combined);
            }
            None => {
                let node = self.dom.create_text(decoded);
                self.attach(node);
            }
        }
    }

    fn close_tag(&mut self) {
        let rest = self.rest();
        let (inner, consumed) = match rest.find('>') {
            Some(ix) => (&rest[2..ix], ix + 1),
            None => (&rest[2..], rest.len()),
        };
        let name = inner.trim().to_ascii_lowercase();
        self.pos += consumed;
        if let Some(ix) = self
            .stack
            .iter()
            .rposition(|open| self.dom.tag(*open) == Some(name.as_str()))
        {
            self.stack.truncate(ix);
        }
    }

    fn open_tag(&mut self) {
        let bytes = self.input.as_bytes();
        let mut i = self.pos + 1;
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
            i += 1;
        }
        let tag = self.input[name_start..i].to_ascii_lowercase();
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                break;
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' => {
                    self_closing = true;
                    i += 1;
                    continue;
                }
                _ => {}
            }
            let attr_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            let name = self.input[attr_start..i].to_ascii_lowercase();
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let mut value = String::new();
            if i < bytes.len() && bytes[i] == b'=' {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                    let quote = bytes[i];
                    i += 1;
                    let value_start = i;
                    while i < bytes.len() && bytes[i] != quote {
                        i += 1;
                    }
                    value = decode_entities(&self.input[value_start..i]);
                    i = (i + 1).min(bytes.len());
                } else {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&self.input[value_start..i]);
                }
            }
            if !name.is_empty() && !attributes.iter().any(|(k, _)| *k == name) {
                attributes.push((name, value));
            }
        }
        self.pos = i;

        self.close_implied_by(&tag);
        let node = self.dom.create_element_with_attributes(&tag, attributes);
        self.attach(node);

        if is_void_tag(&tag) || self_closing {
            return;
        }
        if RAW_TEXT_TAGS.contains(&tag.as_str()) {
            let closing = format!("</{tag}");
            let rest = self.rest();
            let end = rest.to_ascii_lowercase().find(&closing).unwrap_or(rest.len());
            if end > 0 {
                let text = self.dom.create_text(&rest[..end]);
                self.dom.adopt(node, text);
            }
            self.pos += end;
            self.stack.push(node);
            return;
        }
        self.stack.push(node);
    }

    /// Sloppy markup such as `<li>a<li>b` closes the previous sibling item.
    fn close_implied_by(&mut self, tag: &str) {
        let closes: &[&str] = match tag {
            "li" => &["li"],
            "td" | "th" => &["td", "th"],
            "tr" => &["tr", "td", "th"],
            "p" => &["p"],
            _ => return,
        };
        while let Some(top) = self.stack.last().copied() {
            match self.dom.tag(top) {
                Some(open) if closes.contains(&open) => {
                    self.stack.pop();
                }
                _ => break,
            }
        }
    }
}
