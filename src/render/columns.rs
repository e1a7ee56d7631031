//! Column rendering: maps a column name to structured content for one record.
//!
//! Resolution order per column: a configured label-subset override, then a
//! built-in renderer, then a direct field lookup (which covers flattened
//! board fields), then a user template. Unresolvable names render empty.

use crate::data::{LinkedPr, Reactions, Record, RecordKind, RecordState};
use crate::directive::TableOptions;
use crate::render::content::{extract_summary, parse_markdown, truncate_nodes, Node};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    #[default]
    Relative,
    Absolute,
}

/// Non-empty placeholder used where a visually blank cell must still keep
/// its row height.
const BLANK: &str = "\u{00A0}";

/// Render one cell's content for a record.
pub fn render_cell(record: &Record, column: &str, opts: &TableOptions) -> Vec<Node> {
    if let Some(patterns) = opts.label_columns.get(column) {
        return render_label_subset(record, patterns);
    }
    if let Some(nodes) = render_builtin(record, column, opts) {
        return nodes;
    }
    if let Some(value) = record.field(column) {
        return vec![Node::text(value.display())];
    }
    if let Some(template) = opts.templates.get(column) {
        return render_template(record, template);
    }
    Vec::new()
}

fn render_builtin(record: &Record, column: &str, opts: &TableOptions) -> Option<Vec<Node>> {
    if let Some(category) = column.strip_prefix("reactions_") {
        // Per-category columns render just the count, zero included.
        let count = record.reactions.get(category)?;
        return Some(vec![Node::text(count.to_string())]);
    }

    let nodes = match column {
        "number" => vec![Node::link(&record.url, format!("#{}", record.number))],
        "title" => vec![Node::link(&record.url, &record.title)],
        "url" => vec![Node::link(&record.url, &record.url)],
        "state" => vec![Node::text(state_cell(record))],
        "author" => {
            if record.author.is_empty() {
                vec![Node::text(BLANK)]
            } else {
                vec![Node::link(
                    format!("https://github.com/{}", record.author),
                    format!("@{}", record.author),
                )]
            }
        }
        "affiliation" => vec![Node::text(if record.affiliation.is_empty() {
            BLANK.to_string()
        } else {
            record.affiliation.clone()
        })],
        "repository" => vec![Node::link(
            format!("https://github.com/{}", record.repository),
            &record.repository,
        )],
        "created" => date_cell(record.created, opts),
        "updated" => date_cell(record.updated, opts),
        "closed" => date_cell(record.closed, opts),
        "merged" => date_cell(record.merged, opts),
        "comments" => vec![Node::text(record.comments.to_string())],
        "reactions" => render_reactions(&record.reactions),
        "interactions" => vec![Node::text(record.reactions.total().to_string())],
        "draft" => vec![Node::text(if record.draft { "draft" } else { BLANK })],
        "labels" => render_labels(record.labels.iter().map(|l| l.name.as_str())),
        "linked_prs" => render_pr_list(&record.linked_prs),
        "closing_prs" => {
            let closing: Vec<LinkedPr> = record.closing_prs().into_iter().cloned().collect();
            render_pr_list(&closing)
        }
        "sub_issues" => render_sub_issue_block(record),
        "body" => render_long_form(&record.body, opts.body_truncate, &record.url),
        "summary" => {
            let summary = extract_summary(&record.body, &opts.summary_headers);
            render_long_form(&summary, opts.summary_truncate, &record.url)
        }
        _ => return None,
    };
    Some(nodes)
}

fn state_cell(record: &Record) -> String {
    if record.draft && record.state == RecordState::Open {
        return "\u{25CC} draft".to_string();
    }
    let glyph = match (record.kind, record.state) {
        (RecordKind::Issue, RecordState::Open) => "\u{2299}",
        (RecordKind::Issue, _) => "\u{2298}",
        (RecordKind::PullRequest, RecordState::Open) => "\u{21C4}",
        (RecordKind::PullRequest, RecordState::Merged) => "\u{21CC}",
        (RecordKind::PullRequest, RecordState::Closed) => "\u{2297}",
    };
    format!("{} {}", glyph, record.state.label())
}

fn date_cell(value: Option<DateTime<Utc>>, opts: &TableOptions) -> Vec<Node> {
    match value {
        Some(t) => vec![Node::text(format_date(t, opts.date_format, Utc::now()))],
        None => vec![Node::text(BLANK)],
    }
}

pub(crate) fn format_date(t: DateTime<Utc>, format: DateFormat, now: DateTime<Utc>) -> String {
    match format {
        DateFormat::Absolute => t.format("%Y-%m-%d").to_string(),
        DateFormat::Relative => relative_date(t, now),
    }
}

fn relative_date(t: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(t);
    let minutes = delta.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = delta.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = delta.num_days();
    if days < 31 {
        return plural(days, "day");
    }
    let months = days / 30;
    if months < 12 {
        return plural(months, "month");
    }
    plural(days / 365, "year")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Reaction breakdown in fixed priority order, non-zero counts only.
fn render_reactions(reactions: &Reactions) -> Vec<Node> {
    let mut parts = Vec::new();
    for (name, glyph) in Reactions::CATEGORIES {
        let count = reactions.get(name).unwrap_or(0);
        if count > 0 {
            parts.push(format!("{} {}", glyph, count));
        }
    }
    if parts.is_empty() {
        vec![Node::text(BLANK)]
    } else {
        vec![Node::text(parts.join("  "))]
    }
}

fn render_labels<'a>(names: impl Iterator<Item = &'a str>) -> Vec<Node> {
    let mut nodes = Vec::new();
    for name in names {
        if !nodes.is_empty() {
            nodes.push(Node::text(" "));
        }
        nodes.push(Node::Code(name.to_string()));
    }
    nodes
}

fn render_pr_list(prs: &[LinkedPr]) -> Vec<Node> {
    let mut nodes = Vec::new();
    for pr in prs {
        if !nodes.is_empty() {
            nodes.push(Node::text(", "));
        }
        let glyph = if pr.merged {
            "\u{21CC}"
        } else {
            match pr.state {
                RecordState::Open => "\u{21C4}",
                RecordState::Merged => "\u{21CC}",
                RecordState::Closed => "\u{2297}",
            }
        };
        nodes.push(Node::text(format!("{} ", glyph)));
        nodes.push(Node::link(&pr.url, format!("#{}", pr.number)));
    }
    nodes
}

/// Sub-issue disclosure block: a progress line plus one list entry per
/// tracked sub-issue.
pub fn render_sub_issue_block(record: &Record) -> Vec<Node> {
    if record.sub_issues.is_empty() {
        return Vec::new();
    }
    let done = record
        .sub_issues
        .iter()
        .filter(|s| s.state == RecordState::Closed)
        .count();
    let items = record
        .sub_issues
        .iter()
        .map(|sub| {
            let glyph = match sub.state {
                RecordState::Open => "\u{2299}",
                _ => "\u{2298}",
            };
            Node::ListItem(vec![
                Node::text(format!("{} ", glyph)),
                Node::link(&sub.url, format!("#{} {}", sub.number, sub.title)),
            ])
        })
        .collect();

    vec![
        Node::Strong(vec![Node::text(format!(
            "Sub-issues {}/{}",
            done,
            record.sub_issues.len()
        ))]),
        Node::List {
            ordered: false,
            items,
        },
    ]
}

/// Long-form cell: parse to a structured tree first, then truncate by
/// visible-character budget so markup never gets severed. When content was
/// removed, a trailing "read more" link points at the record.
fn render_long_form(text: &str, budget: usize, url: &str) -> Vec<Node> {
    if text.trim().is_empty() {
        return vec![Node::text(BLANK)];
    }
    let parsed = parse_markdown(text);
    let (mut nodes, truncated) = truncate_nodes(&parsed, budget);
    if truncated {
        nodes.push(Node::text(" "));
        nodes.push(Node::link(url, "read more"));
    }
    nodes
}

// =============================================================================
// Label-subset columns
// =============================================================================

/// Render only the labels matching one of the column's glob patterns.
/// `*` is the only wildcard; a pattern without one is an exact match.
fn render_label_subset(record: &Record, patterns: &[String]) -> Vec<Node> {
    let regexes: Vec<Regex> = patterns.iter().filter_map(|p| glob_to_regex(p)).collect();
    render_labels(
        record
            .labels
            .iter()
            .map(|l| l.name.as_str())
            .filter(|name| regexes.iter().any(|re| re.is_match(name))),
    )
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::from("^");
    for ch in pattern.chars() {
        if ch == '*' {
            source.push_str(".*");
        } else {
            source.push_str(&regex::escape(&ch.to_string()));
        }
    }
    source.push('$');
    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Invalid label pattern {:?}: {}", pattern, e);
            None
        }
    }
}

// =============================================================================
// Template columns
// =============================================================================

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_ .-]*?)\s*(?:\|\s*([A-Za-z0-9_]+)\s*)?\}\}")
        .expect("placeholder regex")
});

/// Substitute `{{field}}` / `{{field | filter}}` placeholders. A column whose
/// placeholders all resolve to empty renders as empty content, not a
/// template shell with blanks.
fn render_template(record: &Record, template: &str) -> Vec<Node> {
    let mut placeholders = 0usize;
    let mut resolved_any = false;

    let substituted = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        placeholders += 1;
        let field = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let value = record
            .field(field)
            .map(|v| v.display())
            .unwrap_or_default();
        if !value.is_empty() {
            resolved_any = true;
        }
        match caps.get(2).map(|m| m.as_str()) {
            Some("urlencode") => urlencoding::encode(&value).into_owned(),
            // Unrecognized filter names pass the value through unchanged.
            _ => value,
        }
    });

    if placeholders > 0 && !resolved_any {
        return Vec::new();
    }
    parse_markdown(&substituted)
}
