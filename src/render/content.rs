//! Structured content nodes: markdown parsing, budgeted truncation, and
//! summary extraction.
//!
//! Long-form fields are parsed into this tree before truncation so that a
//! cut can never sever a link or emphasis marker: the walk consumes a
//! visible-character budget and preserves wrapper nodes around whatever
//! inner content survives.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag};
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// A structured content node, the shape handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Text(String),
    Code(String),
    Emphasis(Vec<Node>),
    Strong(Vec<Node>),
    Link { url: String, children: Vec<Node> },
    Paragraph(Vec<Node>),
    Heading { depth: u8, children: Vec<Node> },
    List { ordered: bool, items: Vec<Node> },
    ListItem(Vec<Node>),
    CodeBlock(String),
    Break,
    ThematicBreak,
    Table { header: Vec<Cell>, rows: Vec<Vec<Cell>> },
}

/// One table cell: inline content plus an optional width percentage hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub children: Vec<Node>,
    pub width: Option<f32>,
}

impl Cell {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            children,
            width: None,
        }
    }
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn link(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Link {
            url: url.into(),
            children: vec![Self::Text(label.into())],
        }
    }
}

// =============================================================================
// Markdown -> nodes
// =============================================================================

enum FrameKind {
    Paragraph,
    Heading(u8),
    Emphasis,
    Strong,
    Link(String),
    List(bool),
    Item,
    CodeBlock,
    /// Container whose children flow into the parent unwrapped.
    Transparent,
}

struct Builder {
    root: Vec<Node>,
    stack: Vec<(FrameKind, Vec<Node>)>,
}

impl Builder {
    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some((_, children)) => children.push(node),
            None => self.root.push(node),
        }
    }

    fn open(&mut self, kind: FrameKind) {
        self.stack.push((kind, Vec::new()));
    }

    fn close(&mut self) {
        let Some((kind, children)) = self.stack.pop() else {
            return;
        };
        match kind {
            FrameKind::Paragraph => self.push(Node::Paragraph(children)),
            FrameKind::Heading(depth) => self.push(Node::Heading { depth, children }),
            FrameKind::Emphasis => self.push(Node::Emphasis(children)),
            FrameKind::Strong => self.push(Node::Strong(children)),
            FrameKind::Link(url) => self.push(Node::Link { url, children }),
            FrameKind::List(ordered) => self.push(Node::List {
                ordered,
                items: children,
            }),
            FrameKind::Item => self.push(Node::ListItem(children)),
            FrameKind::CodeBlock => {
                let text = children
                    .into_iter()
                    .filter_map(|n| match n {
                        Node::Text(s) => Some(s),
                        _ => None,
                    })
                    .collect::<String>();
                self.push(Node::CodeBlock(text));
            }
            FrameKind::Transparent => {
                for child in children {
                    self.push(child);
                }
            }
        }
    }
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Parse markdown into content nodes.
pub fn parse_markdown(text: &str) -> Vec<Node> {
    let mut builder = Builder {
        root: Vec::new(),
        stack: Vec::new(),
    };

    for event in Parser::new(text) {
        match event {
            Event::Start(tag) => {
                let kind = match tag {
                    Tag::Paragraph => FrameKind::Paragraph,
                    Tag::Heading(level, _, _) => FrameKind::Heading(heading_depth(level)),
                    Tag::Emphasis => FrameKind::Emphasis,
                    Tag::Strong => FrameKind::Strong,
                    Tag::Link(_, dest, _) | Tag::Image(_, dest, _) => {
                        FrameKind::Link(dest.to_string())
                    }
                    Tag::List(start) => FrameKind::List(start.is_some()),
                    Tag::Item => FrameKind::Item,
                    Tag::CodeBlock(CodeBlockKind::Fenced(_) | CodeBlockKind::Indented) => {
                        FrameKind::CodeBlock
                    }
                    _ => FrameKind::Transparent,
                };
                builder.open(kind);
            }
            Event::End(_) => builder.close(),
            Event::Text(text) => builder.push(Node::Text(text.to_string())),
            Event::Code(code) => builder.push(Node::Code(code.to_string())),
            Event::SoftBreak => builder.push(Node::Text(" ".to_string())),
            Event::HardBreak => builder.push(Node::Break),
            Event::Rule => builder.push(Node::ThematicBreak),
            Event::Html(_) | Event::FootnoteReference(_) | Event::TaskListMarker(_) => {}
        }
    }

    // Unbalanced input: close anything still open.
    while !builder.stack.is_empty() {
        builder.close();
    }

    builder.root
}

// =============================================================================
// Budgeted truncation
// =============================================================================

struct Truncator {
    remaining: usize,
    truncated: bool,
    ellipsis_added: bool,
}

/// Truncate nodes to a visible-character budget, preserving structure.
/// Returns the surviving tree and whether anything was removed.
pub fn truncate_nodes(nodes: &[Node], budget: usize) -> (Vec<Node>, bool) {
    let mut t = Truncator {
        remaining: budget,
        truncated: false,
        ellipsis_added: false,
    };
    let mut out = t.take_all(nodes);
    if t.truncated && !t.ellipsis_added {
        append_ellipsis(&mut out);
    }
    (out, t.truncated)
}

/// Attach the ellipsis to the last inline position so it reads as part of
/// the surviving sentence.
fn append_ellipsis(out: &mut Vec<Node>) {
    match out.last_mut() {
        Some(Node::Paragraph(children))
        | Some(Node::Emphasis(children))
        | Some(Node::Strong(children))
        | Some(Node::Link { children, .. })
        | Some(Node::ListItem(children))
        | Some(Node::Heading { children, .. }) => append_ellipsis(children),
        _ => out.push(Node::Text("\u{2026}".to_string())),
    }
}

impl Truncator {
    fn take_all(&mut self, nodes: &[Node]) -> Vec<Node> {
        let mut out = Vec::new();
        for node in nodes {
            if self.remaining == 0 {
                if node_has_content(node) {
                    self.truncated = true;
                }
                continue;
            }
            if let Some(taken) = self.take_node(node) {
                out.push(taken);
            }
        }
        out
    }

    fn take_node(&mut self, node: &Node) -> Option<Node> {
        match node {
            Node::Text(s) => self.take_text(s).map(Node::Text),
            Node::Code(s) => {
                let w = s.width();
                if w <= self.remaining {
                    self.remaining -= w;
                    Some(Node::Code(s.clone()))
                } else {
                    // Never split inside inline code.
                    self.remaining = 0;
                    self.truncated = true;
                    None
                }
            }
            Node::CodeBlock(s) => {
                let w = s.width();
                if w <= self.remaining {
                    self.remaining -= w;
                    Some(Node::CodeBlock(s.clone()))
                } else {
                    self.remaining = 0;
                    self.truncated = true;
                    None
                }
            }
            Node::Emphasis(children) => self.take_wrapper(children).map(Node::Emphasis),
            Node::Strong(children) => self.take_wrapper(children).map(Node::Strong),
            Node::Link { url, children } => self.take_wrapper(children).map(|kids| Node::Link {
                url: url.clone(),
                children: kids,
            }),
            Node::Paragraph(children) => self.take_wrapper(children).map(Node::Paragraph),
            Node::Heading { depth, children } => {
                self.take_wrapper(children).map(|kids| Node::Heading {
                    depth: *depth,
                    children: kids,
                })
            }
            Node::ListItem(children) => self.take_wrapper(children).map(Node::ListItem),
            Node::List { ordered, items } => {
                let kept = self.take_all(items);
                if kept.is_empty() {
                    None
                } else {
                    Some(Node::List {
                        ordered: *ordered,
                        items: kept,
                    })
                }
            }
            Node::Break => Some(Node::Break),
            Node::ThematicBreak => Some(Node::ThematicBreak),
            Node::Table { .. } => {
                // Nested tables don't survive truncation into a cell.
                self.truncated = true;
                None
            }
        }
    }

    fn take_wrapper(&mut self, children: &[Node]) -> Option<Vec<Node>> {
        let kept = self.take_all(children);
        if kept.is_empty() {
            None
        } else {
            Some(kept)
        }
    }

    fn take_text(&mut self, s: &str) -> Option<String> {
        let w = s.width();
        if w <= self.remaining {
            self.remaining -= w;
            return Some(s.to_string());
        }

        // Cut at the last whitespace boundary at or before the limit.
        let mut used = 0usize;
        let mut cut_byte = 0usize;
        for (idx, ch) in s.char_indices() {
            let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
            if used + cw > self.remaining {
                break;
            }
            used += cw;
            cut_byte = idx + ch.len_utf8();
        }
        let prefix = &s[..cut_byte];
        let cut = match prefix.rfind(char::is_whitespace) {
            Some(ws) => &prefix[..ws],
            None => prefix,
        };
        let trimmed = cut.trim_end();

        self.remaining = 0;
        self.truncated = true;
        self.ellipsis_added = true;
        if trimmed.is_empty() {
            Some("\u{2026}".to_string())
        } else {
            Some(format!("{}\u{2026}", trimmed))
        }
    }
}

fn node_has_content(node: &Node) -> bool {
    match node {
        Node::Text(s) | Node::Code(s) | Node::CodeBlock(s) => !s.trim().is_empty(),
        Node::Emphasis(children)
        | Node::Strong(children)
        | Node::Link { children, .. }
        | Node::Paragraph(children)
        | Node::Heading { children, .. }
        | Node::ListItem(children) => children.iter().any(node_has_content),
        Node::List { items, .. } => items.iter().any(node_has_content),
        Node::Break | Node::ThematicBreak => false,
        Node::Table { .. } => true,
    }
}

// =============================================================================
// Summary extraction
// =============================================================================

fn heading_level(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        Some((hashes, rest.trim()))
    } else {
        None
    }
}

fn is_thematic_break(line: &str) -> bool {
    let trimmed: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    if trimmed.len() < 3 {
        return false;
    }
    for marker in ['-', '*', '_'] {
        if trimmed.chars().all(|c| c == marker) {
            return true;
        }
    }
    false
}

/// Extract the summary section of a body.
///
/// Finds the first heading whose text contains any keyword (case-insensitive
/// substring) and returns everything up to the next heading of equal or
/// higher structural level. Without such a heading, falls back to the
/// content before the first heading or horizontal rule, whichever comes
/// first.
pub fn extract_summary(body: &str, keywords: &[String]) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut matched: Option<(usize, usize)> = None;
    for (idx, line) in lines.iter().enumerate() {
        if let Some((level, text)) = heading_level(line) {
            let haystack = text.to_lowercase();
            if lowered.iter().any(|k| haystack.contains(k.as_str())) {
                matched = Some((idx, level));
                break;
            }
        }
    }

    if let Some((start, level)) = matched {
        let mut collected = Vec::new();
        for line in &lines[start + 1..] {
            if let Some((next_level, _)) = heading_level(line) {
                if next_level <= level {
                    break;
                }
            }
            collected.push(*line);
        }
        return collected.join("\n").trim().to_string();
    }

    // Fallback: the preamble before the first heading or rule.
    let mut collected = Vec::new();
    for line in &lines {
        if heading_level(line).is_some() || is_thematic_break(line) {
            break;
        }
        collected.push(*line);
    }
    collected.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_paragraph_with_link() {
        let nodes = parse_markdown("See [the docs](https://example.com) now");
        assert_eq!(
            nodes,
            vec![Node::Paragraph(vec![
                Node::text("See "),
                Node::Link {
                    url: "https://example.com".to_string(),
                    children: vec![Node::text("the docs")],
                },
                Node::text(" now"),
            ])]
        );
    }

    #[test]
    fn test_truncation_preserves_link_wrapper() {
        let nodes = parse_markdown("Intro words [a fairly long link label](https://example.com)");
        let (out, truncated) = truncate_nodes(&nodes, 20);
        assert!(truncated);

        // The link survives as a single well-formed node around the cut text.
        let Node::Paragraph(children) = &out[0] else {
            panic!("expected paragraph, got {:?}", out);
        };
        let link = children
            .iter()
            .find(|n| matches!(n, Node::Link { .. }))
            .expect("link should survive truncation");
        let Node::Link { url, children } = link else {
            unreachable!()
        };
        assert_eq!(url, "https://example.com");
        assert_eq!(children.len(), 1);
        let Node::Text(text) = &children[0] else {
            panic!("expected text inside link");
        };
        assert!(text.ends_with('\u{2026}'));
    }

    #[test]
    fn test_truncation_cuts_at_whitespace() {
        let nodes = parse_markdown("alpha beta gamma delta");
        let (out, truncated) = truncate_nodes(&nodes, 12);
        assert!(truncated);
        assert_eq!(
            out,
            vec![Node::Paragraph(vec![Node::text("alpha beta\u{2026}")])]
        );
    }

    #[test]
    fn test_no_truncation_within_budget() {
        let nodes = parse_markdown("short");
        let (out, truncated) = truncate_nodes(&nodes, 50);
        assert!(!truncated);
        assert_eq!(out, nodes);
    }

    #[test]
    fn test_budget_exhausted_between_nodes_appends_ellipsis() {
        let nodes = parse_markdown("abcd *next*");
        let (out, truncated) = truncate_nodes(&nodes, 5);
        assert!(truncated);
        // "abcd " fits exactly; the emphasis is dropped and an ellipsis marks it.
        let Node::Paragraph(children) = &out[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(children.last(), Some(&Node::text("\u{2026}")));
    }

    #[test]
    fn test_summary_by_heading_keyword() {
        let body = "intro\n\n## Problem Summary\nthe gist\nmore gist\n\n## Details\nrest";
        let summary = extract_summary(body, &["summary".to_string()]);
        assert_eq!(summary, "the gist\nmore gist");
    }

    #[test]
    fn test_summary_stops_at_equal_or_higher_heading() {
        let body = "## Summary\nkept\n### sub\nalso kept\n# Top\ndropped";
        let summary = extract_summary(body, &["summary".to_string()]);
        assert_eq!(summary, "kept\n### sub\nalso kept");
    }

    #[test]
    fn test_summary_fallback_before_first_heading() {
        let body = "lead paragraph\nsecond line\n\n# Heading\nbody";
        let summary = extract_summary(body, &["summary".to_string()]);
        assert_eq!(summary, "lead paragraph\nsecond line");
    }

    #[test]
    fn test_summary_fallback_stops_at_rule() {
        let body = "lead\n---\nafter rule";
        let summary = extract_summary(body, &["summary".to_string()]);
        assert_eq!(summary, "lead");
    }
}
