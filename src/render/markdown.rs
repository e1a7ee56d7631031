//! Render a content-node tree back to markdown text.
//!
//! The host toolchain consumes the structured tree directly; this renderer
//! is the CLI surface and what integration tests assert over. Table cells
//! are emitted as GFM pipe rows, so inline breaks become `<br>` and pipes
//! are escaped.

use crate::render::content::{Cell, Node};

/// Render block-level nodes, blank-line separated.
pub fn render_nodes(nodes: &[Node]) -> String {
    let blocks: Vec<String> = nodes.iter().map(render_block).filter(|b| !b.is_empty()).collect();
    blocks.join("\n\n")
}

fn render_block(node: &Node) -> String {
    match node {
        Node::Paragraph(children) => render_inline(children),
        Node::Heading { depth, children } => {
            format!("{} {}", "#".repeat(*depth as usize), render_inline(children))
        }
        Node::List { ordered, items } => {
            let mut lines = Vec::new();
            for (idx, item) in items.iter().enumerate() {
                let children = match item {
                    Node::ListItem(children) => render_inline(children),
                    other => render_inline(std::slice::from_ref(other)),
                };
                if *ordered {
                    lines.push(format!("{}. {}", idx + 1, children));
                } else {
                    lines.push(format!("- {}", children));
                }
            }
            lines.join("\n")
        }
        Node::CodeBlock(code) => format!("```\n{}\n```", code.trim_end()),
        Node::ThematicBreak => "---".to_string(),
        Node::Table { header, rows } => render_table(header, rows),
        inline => render_inline(std::slice::from_ref(inline)),
    }
}

/// Render inline nodes to a single line.
pub fn render_inline(nodes: &[Node]) -> String {
    nodes.iter().map(render_inline_node).collect()
}

fn render_inline_node(node: &Node) -> String {
    match node {
        Node::Text(text) => text.clone(),
        Node::Code(code) => format!("`{}`", code),
        Node::Emphasis(children) => format!("*{}*", render_inline(children)),
        Node::Strong(children) => format!("**{}**", render_inline(children)),
        Node::Link { url, children } => format!("[{}]({})", render_inline(children), url),
        Node::Break => "<br>".to_string(),
        Node::Paragraph(children) | Node::ListItem(children) => render_inline(children),
        Node::Heading { children, .. } => render_inline(children),
        Node::List { items, .. } => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| format!("\u{2022} {}", render_inline_node(item)))
                .collect();
            rendered.join("<br>")
        }
        Node::CodeBlock(code) => format!("`{}`", code.replace('\n', " ")),
        Node::ThematicBreak => String::new(),
        Node::Table { .. } => String::new(),
    }
}

fn render_cell_text(cell: &Cell) -> String {
    render_inline(&cell.children).replace('|', "\\|").replace('\n', " ")
}

fn render_table(header: &[Cell], rows: &[Vec<Cell>]) -> String {
    let mut out = String::new();
    let header_text: Vec<String> = header.iter().map(render_cell_text).collect();
    out.push_str(&format!("| {} |\n", header_text.join(" | ")));
    out.push_str(&format!(
        "|{}\n",
        " --- |".repeat(header.len())
    ));
    for row in rows {
        let cells: Vec<String> = row.iter().map(render_cell_text).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_rendering() {
        let nodes = vec![
            Node::text("see "),
            Node::Link {
                url: "https://example.com".to_string(),
                children: vec![Node::Strong(vec![Node::text("docs")])],
            },
        ];
        assert_eq!(render_inline(&nodes), "see [**docs**](https://example.com)");
    }

    #[test]
    fn test_table_rendering_escapes_pipes() {
        let table = Node::Table {
            header: vec![
                Cell::new(vec![Node::text("TITLE")]),
                Cell::new(vec![Node::text("STATE")]),
            ],
            rows: vec![vec![
                Cell::new(vec![Node::text("a | b")]),
                Cell::new(vec![Node::text("open")]),
            ]],
        };
        assert_eq!(
            render_nodes(&[table]),
            "| TITLE | STATE |\n| --- | --- |\n| a \\| b | open |"
        );
    }

    #[test]
    fn test_block_rendering() {
        let nodes = vec![
            Node::Heading {
                depth: 2,
                children: vec![Node::text("Head")],
            },
            Node::Paragraph(vec![Node::text("body")]),
            Node::List {
                ordered: true,
                items: vec![
                    Node::ListItem(vec![Node::text("one")]),
                    Node::ListItem(vec![Node::text("two")]),
                ],
            },
        ];
        assert_eq!(render_nodes(&nodes), "## Head\n\nbody\n\n1. one\n2. two");
    }
}
