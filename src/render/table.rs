//! Table assembly: header + data rows, width hints, sub-issue splicing.

use crate::data::Record;
use crate::directive::TableOptions;
use crate::render::columns::{render_cell, render_sub_issue_block};
use crate::render::content::{Cell, Node};

/// Column-name header formatting: underscores to spaces, upper-cased.
pub fn header_label(column: &str) -> String {
    column.replace('_', " ").to_uppercase()
}

/// Normalize width percentages: applied verbatim when the sum is at most
/// 100, otherwise scaled proportionally so the sum is exactly 100.
pub fn normalize_widths(widths: &[f32]) -> Vec<f32> {
    let sum: f32 = widths.iter().sum();
    if sum <= 100.0 {
        widths.to_vec()
    } else {
        widths.iter().map(|w| w * 100.0 / sum).collect()
    }
}

/// Cells hold inline content only; a renderer that produced a paragraph-like
/// wrapper is unwrapped to its inline children.
fn unwrap_blocks(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .flat_map(|node| match node {
            Node::Paragraph(children) => children,
            other => vec![other],
        })
        .collect()
}

/// Lay out the table for an already-sorted record list.
pub fn assemble(records: &[Record], opts: &TableOptions) -> Node {
    let widths: Option<Vec<f32>> = opts.widths.as_deref().map(normalize_widths);
    let width_for = |idx: usize| widths.as_ref().map(|w| w[idx]);

    let header: Vec<Cell> = opts
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| Cell {
            children: vec![Node::text(header_label(column))],
            width: width_for(idx),
        })
        .collect();

    let append_target: Option<usize> = opts
        .append_sub_issues
        .as_ref()
        .and_then(|name| opts.columns.iter().position(|c| c == name));

    let rows: Vec<Vec<Cell>> = records
        .iter()
        .map(|record| {
            let mut cells: Vec<Cell> = opts
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| Cell {
                    children: unwrap_blocks(render_cell(record, column, opts)),
                    width: width_for(idx),
                })
                .collect();

            if let Some(target) = append_target {
                if !record.sub_issues.is_empty() {
                    let cell = &mut cells[target];
                    cell.children.push(Node::Break);
                    cell.children.extend(render_sub_issue_block(record));
                }
            }
            cells
        })
        .collect();

    Node::Table { header, rows }
}
