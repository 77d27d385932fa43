//! Rich-text markup: a tolerant tokenizer, a node tree, and the caret
//! offset walk over it.
//!
//! Text boxes and table cells store their content as a small HTML-like
//! markup string. Caret positions are exchanged as **plain offsets**: the
//! number of characters in text nodes before the caret, in document order.
//! `<br>` and other elements contribute nothing.

use crate::local_history::EditableRegion;
use winnow::ModalResult;
use winnow::ascii::space0;
use winnow::combinator::{alt, delimited};
use winnow::prelude::*;
use winnow::token::{take_till, take_until, take_while};

/// One node of a parsed markup fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichNode {
    /// Decoded character data.
    Text(String),
    Element {
        tag: String,
        /// Raw attribute text, kept verbatim.
        attrs: String,
        children: Vec<RichNode>,
    },
}

/// Caret inside a node tree: child-index path to a text node plus a
/// character offset into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeCaret {
    pub path: Vec<usize>,
    pub offset: usize,
}

const VOID_TAGS: [&str; 6] = ["br", "hr", "img", "input", "meta", "wbr"];

fn is_void(tag: &str) -> bool {
    VOID_TAGS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

// ─── Tokenizer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Open {
        tag: &'a str,
        attrs: &'a str,
        self_closing: bool,
    },
    Close(&'a str),
    Comment,
    Text(&'a str),
}

fn tag_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric()).parse_next(input)
}

fn comment<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    ("<!--", take_until(0.., "-->"), "-->")
        .value(Token::Comment)
        .parse_next(input)
}

fn close_tag<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    delimited("</", tag_name, (space0, '>'))
        .map(Token::Close)
        .parse_next(input)
}

fn open_tag<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    ('<', tag_name, take_till(0.., |c: char| c == '>'), '>')
        .map(|(_, tag, rest, _): (char, &'a str, &'a str, char)| {
            let rest = rest.trim();
            let self_closing = rest.ends_with('/');
            Token::Open {
                tag,
                attrs: rest.trim_end_matches('/').trim_end(),
                self_closing,
            }
        })
        .parse_next(input)
}

fn text<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    take_till(1.., |c: char| c == '<')
        .map(Token::Text)
        .parse_next(input)
}

/// A `<` that does not start a tag is literal text.
fn stray_lt<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    "<".map(Token::Text).parse_next(input)
}

fn token<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    alt((comment, close_tag, open_tag, text, stray_lt)).parse_next(input)
}

// ─── Entities ───────────────────────────────────────────────────────────

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let decoded = after.find(';').and_then(|semi| {
            let name = &after[1..semi];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &after[len..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn encode_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

// ─── Tree ───────────────────────────────────────────────────────────────

struct Frame {
    tag: String,
    attrs: String,
    children: Vec<RichNode>,
}

fn push_text(children: &mut Vec<RichNode>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(RichNode::Text(prev)) = children.last_mut() {
        prev.push_str(&text);
    } else {
        children.push(RichNode::Text(text));
    }
}

fn fold(stack: &mut Vec<Frame>, root: &mut Vec<RichNode>) {
    if let Some(frame) = stack.pop() {
        let node = RichNode::Element {
            tag: frame.tag,
            attrs: frame.attrs,
            children: frame.children,
        };
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.push(node),
        }
    }
}

/// Parse markup into a node tree. Never fails: unmatched close tags are
/// dropped and unclosed elements are closed at the end.
pub fn parse_markup(input: &str) -> Vec<RichNode> {
    let mut rest = input;
    let mut root: Vec<RichNode> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    while !rest.is_empty() {
        let Ok(tok) = token(&mut rest) else {
            // `token` always consumes at least one char on non-empty input.
            break;
        };
        let children = match stack.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut root,
        };
        match tok {
            Token::Text(raw) => push_text(children, decode_entities(raw)),
            Token::Comment => {}
            Token::Open { tag, attrs, self_closing } => {
                if self_closing || is_void(tag) {
                    children.push(RichNode::Element {
                        tag: tag.to_ascii_lowercase(),
                        attrs: attrs.to_string(),
                        children: Vec::new(),
                    });
                } else {
                    stack.push(Frame {
                        tag: tag.to_ascii_lowercase(),
                        attrs: attrs.to_string(),
                        children: Vec::new(),
                    });
                }
            }
            Token::Close(tag) => {
                if let Some(depth) = stack.iter().rposition(|f| f.tag.eq_ignore_ascii_case(tag)) {
                    while stack.len() > depth {
                        fold(&mut stack, &mut root);
                    }
                }
            }
        }
    }
    while !stack.is_empty() {
        fold(&mut stack, &mut root);
    }
    root
}

/// Serialize a node tree back to markup.
pub fn to_markup(nodes: &[RichNode]) -> String {
    let mut out = String::new();
    write_nodes(nodes, &mut out);
    out
}

fn write_nodes(nodes: &[RichNode], out: &mut String) {
    for node in nodes {
        match node {
            RichNode::Text(t) => encode_text(t, out),
            RichNode::Element { tag, attrs, children } => {
                out.push('<');
                out.push_str(tag);
                if !attrs.is_empty() {
                    out.push(' ');
                    out.push_str(attrs);
                }
                out.push('>');
                if !is_void(tag) {
                    write_nodes(children, out);
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
    }
}

/// Concatenated text-node content.
pub fn plain_text(nodes: &[RichNode]) -> String {
    let mut out = String::new();
    collect_text(nodes, &mut out);
    out
}

fn collect_text(nodes: &[RichNode], out: &mut String) {
    for node in nodes {
        match node {
            RichNode::Text(t) => out.push_str(t),
            RichNode::Element { children, .. } => collect_text(children, out),
        }
    }
}

/// Plain text of a markup string.
pub fn markup_plain_text(markup: &str) -> String {
    plain_text(&parse_markup(markup))
}

// ─── Caret walk ─────────────────────────────────────────────────────────

/// Every text node in document order as `(path, char length)`.
fn text_runs(nodes: &[RichNode]) -> Vec<(Vec<usize>, usize)> {
    fn walk(nodes: &[RichNode], prefix: &mut Vec<usize>, out: &mut Vec<(Vec<usize>, usize)>) {
        for (i, node) in nodes.iter().enumerate() {
            prefix.push(i);
            match node {
                RichNode::Text(t) => out.push((prefix.clone(), t.chars().count())),
                RichNode::Element { children, .. } => walk(children, prefix, out),
            }
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    walk(nodes, &mut Vec::new(), &mut out);
    out
}

/// Plain offset of `caret`: sum of the lengths of text nodes before the
/// caret's node, plus the offset inside it.
///
/// A caret path that points at an element (or past the end) counts every
/// text node ordered before that position.
pub fn caret_to_plain(nodes: &[RichNode], caret: &TreeCaret) -> usize {
    let mut total = 0;
    for (path, len) in text_runs(nodes) {
        match path.cmp(&caret.path) {
            std::cmp::Ordering::Less => total += len,
            std::cmp::Ordering::Equal => return total + caret.offset.min(len),
            std::cmp::Ordering::Greater => break,
        }
    }
    total
}

/// Inverse of `caret_to_plain`. At a boundary between two text nodes the
/// caret lands at the end of the earlier one; past the end it clamps to
/// the end of the last text node.
pub fn plain_to_caret(nodes: &[RichNode], offset: usize) -> TreeCaret {
    let runs = text_runs(nodes);
    let mut remaining = offset;
    for (path, len) in &runs {
        if remaining <= *len {
            return TreeCaret {
                path: path.clone(),
                offset: remaining,
            };
        }
        remaining -= len;
    }
    match runs.into_iter().last() {
        Some((path, len)) => TreeCaret { path, offset: len },
        None => TreeCaret::default(),
    }
}

fn node_at_mut<'a>(nodes: &'a mut [RichNode], path: &[usize]) -> Option<&'a mut RichNode> {
    let (first, rest) = path.split_first()?;
    let node = nodes.get_mut(*first)?;
    if rest.is_empty() {
        return Some(node);
    }
    match node {
        RichNode::Element { children, .. } => node_at_mut(children, rest),
        RichNode::Text(_) => None,
    }
}

fn char_to_byte(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(b, _)| b)
}

/// Insert plain `text` at plain offset `at`. Returns the plain offset
/// just after the inserted text.
pub fn insert_plain(nodes: &mut Vec<RichNode>, at: usize, text: &str) -> usize {
    let caret = plain_to_caret(nodes, at);
    let inserted = text.chars().count();
    match node_at_mut(nodes, &caret.path) {
        Some(RichNode::Text(t)) => {
            let byte = char_to_byte(t, caret.offset);
            t.insert_str(byte, text);
            caret_to_plain(nodes, &caret) + inserted
        }
        _ => {
            push_text(nodes, text.to_string());
            plain_text(nodes).chars().count()
        }
    }
}

// ─── In-memory editable region ──────────────────────────────────────────

/// An `EditableRegion` over a markup string, with the caret tracked as a
/// tree position.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupRegion {
    content: String,
    nodes: Vec<RichNode>,
    caret: TreeCaret,
}

impl MarkupRegion {
    /// Region holding `content`, caret at the end.
    pub fn new(content: &str) -> Self {
        let nodes = parse_markup(content);
        let caret = plain_to_caret(&nodes, usize::MAX);
        Self {
            content: content.to_string(),
            nodes,
            caret,
        }
    }

    pub fn nodes(&self) -> &[RichNode] {
        &self.nodes
    }

    pub fn caret(&self) -> &TreeCaret {
        &self.caret
    }

    pub fn set_caret(&mut self, caret: TreeCaret) {
        self.caret = caret;
    }

    pub fn plain_text(&self) -> String {
        plain_text(&self.nodes)
    }

    pub fn plain_len(&self) -> usize {
        text_runs(&self.nodes).iter().map(|(_, len)| len).sum()
    }

    /// No visible characters (whitespace only counts as blank).
    pub fn is_blank(&self) -> bool {
        self.plain_text().trim().is_empty()
    }

    pub fn caret_at_start(&self) -> bool {
        self.plain_offset() == 0
    }

    pub fn caret_at_end(&self) -> bool {
        self.plain_offset() >= self.plain_len()
    }

    /// Type `text` at the caret.
    pub fn insert_text(&mut self, text: &str) {
        let at = self.plain_offset();
        let after = insert_plain(&mut self.nodes, at, text);
        self.content = to_markup(&self.nodes);
        self.caret = plain_to_caret(&self.nodes, after);
    }
}

impl EditableRegion for MarkupRegion {
    fn plain_offset(&self) -> usize {
        caret_to_plain(&self.nodes, &self.caret)
    }

    fn set_plain_offset(&mut self, offset: usize) {
        self.caret = plain_to_caret(&self.nodes, offset);
    }

    fn serialized_content(&self) -> String {
        self.content.clone()
    }

    fn set_serialized_content(&mut self, content: &str) {
        let offset = self.plain_offset();
        self.content = content.to_string();
        self.nodes = parse_markup(content);
        self.caret = plain_to_caret(&self.nodes, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> RichNode {
        RichNode::Text(s.into())
    }

    fn el(tag: &str, children: Vec<RichNode>) -> RichNode {
        RichNode::Element {
            tag: tag.into(),
            attrs: String::new(),
            children,
        }
    }

    #[test]
    fn parses_nested_markup() {
        let nodes = parse_markup("Hi <b>bold <i>both</i></b><br>end");
        assert_eq!(
            nodes,
            vec![
                text("Hi "),
                el("b", vec![text("bold "), el("i", vec![text("both")])]),
                el("br", vec![]),
                text("end"),
            ]
        );
        assert_eq!(plain_text(&nodes), "Hi bold bothend");
    }

    #[test]
    fn tolerates_broken_markup() {
        let nodes = parse_markup("a < b </u> <b>open");
        assert_eq!(plain_text(&nodes), "a < b  open");
        assert_eq!(to_markup(&nodes), "a &lt; b  <b>open</b>");
    }

    #[test]
    fn entities_roundtrip() {
        let nodes = parse_markup("x &amp; y &lt;z&gt; &#65;&#x42;&nbsp;&bogus;");
        assert_eq!(plain_text(&nodes), "x & y <z> AB\u{a0}&bogus;");
        assert_eq!(to_markup(&nodes), "x &amp; y &lt;z&gt; AB&nbsp;&amp;bogus;");
    }

    #[test]
    fn attributes_and_comments() {
        let nodes = parse_markup(r#"<span style="color:red">r</span><!-- note --><img src="a.png"/>"#);
        assert_eq!(to_markup(&nodes), r#"<span style="color:red">r</span><img src="a.png">"#);
    }

    #[test]
    fn caret_walk_sums_preceding_text() {
        let nodes = parse_markup("ab<b>cd<i>ef</i></b>g");
        let caret = TreeCaret {
            path: vec![1, 1, 0],
            offset: 1,
        };
        assert_eq!(caret_to_plain(&nodes, &caret), 5);
        assert_eq!(plain_to_caret(&nodes, 5), caret);
        // Boundary prefers the end of the earlier node.
        assert_eq!(
            plain_to_caret(&nodes, 2),
            TreeCaret {
                path: vec![0],
                offset: 2
            }
        );
        // Caret on an element counts only what precedes it.
        let on_element = TreeCaret {
            path: vec![1],
            offset: 0,
        };
        assert_eq!(caret_to_plain(&nodes, &on_element), 2);
        assert_eq!(plain_to_caret(&nodes, 99).offset, 1);
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let mut region = MarkupRegion::new("héllo");
        region.set_plain_offset(2);
        region.insert_text("ü");
        assert_eq!(region.serialized_content(), "héüllo");
        assert_eq!(region.plain_offset(), 3);
    }

    #[test]
    fn insert_into_empty_region() {
        let mut region = MarkupRegion::new("");
        assert!(region.is_blank());
        region.insert_text("x");
        assert_eq!(region.serialized_content(), "x");
        assert!(region.caret_at_end());
    }

    #[test]
    fn set_content_keeps_caret_offset() {
        let mut region = MarkupRegion::new("<b>abc</b>def");
        region.set_plain_offset(4);
        region.set_serialized_content("abcdef");
        assert_eq!(region.plain_offset(), 4);
        assert_eq!(region.caret().path, vec![0]);
    }
}
