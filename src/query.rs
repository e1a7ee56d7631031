//! Query resolution: classify the directive argument into a fetch plan.
//!
//! Three input shapes are accepted: a project-board view URL, an issue-list
//! URL for a specific repository, or a free-form search expression. Malformed
//! URLs are never an error here; anything unrecognized is treated as a
//! literal search expression.

use serde::{Deserialize, Serialize};

/// Resolved fetch plan, immutable for the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchPlan {
    Search { query: String },
    Board(BoardRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Org,
    User,
}

/// A project board, optionally scoped to one saved view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRef {
    pub owner_kind: OwnerKind,
    pub owner: String,
    pub number: u32,
    pub view: Option<u32>,
    /// Filter string carried in the URL, already decoded.
    pub filter: Option<String>,
}

impl FetchPlan {
    /// Stable textual identity of the plan, used to build cache keys.
    pub fn cache_key_component(&self) -> String {
        match self {
            Self::Search { query } => format!("search:{}", query),
            Self::Board(board) => {
                let kind = match board.owner_kind {
                    OwnerKind::Org => "org",
                    OwnerKind::User => "user",
                };
                let mut key = format!("board:{}/{}/{}", kind, board.owner, board.number);
                if let Some(view) = board.view {
                    key.push_str(&format!("/view/{}", view));
                }
                if let Some(filter) = &board.filter {
                    key.push_str(&format!("?{}", filter));
                }
                key
            }
        }
    }
}

/// Classify the directive argument into a fetch plan.
pub fn resolve(input: &str) -> FetchPlan {
    let trimmed = input.trim();
    if let Some(plan) = parse_board_url(trimmed) {
        return plan;
    }
    if let Some(query) = parse_issue_list_url(trimmed) {
        return FetchPlan::Search { query };
    }
    FetchPlan::Search {
        query: trimmed.to_string(),
    }
}

/// Strip scheme and host, returning `(path_segments, query_string)` for
/// github.com URLs only.
fn split_github_url(input: &str) -> Option<(Vec<&str>, Option<&str>)> {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))?;
    let (host, path) = rest.split_once('/')?;
    if host != "github.com" && host != "www.github.com" {
        return None;
    }
    let (path, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    Some((segments, query))
}

fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn percent_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// `https://github.com/orgs/<owner>/projects/<n>[/views/<v>][?filterQuery=..]`
/// (or `/users/<owner>/...`).
fn parse_board_url(input: &str) -> Option<FetchPlan> {
    let (segments, query) = split_github_url(input)?;
    if segments.len() < 4 || segments[2] != "projects" {
        return None;
    }
    let owner_kind = match segments[0] {
        "orgs" => OwnerKind::Org,
        "users" => OwnerKind::User,
        _ => return None,
    };
    let number: u32 = segments[3].parse().ok()?;
    let view = match (segments.get(4), segments.get(5)) {
        (Some(&"views"), Some(v)) => Some(v.parse().ok()?),
        _ => None,
    };
    let filter = query_param(query, "filterQuery").map(percent_decode);

    Some(FetchPlan::Board(BoardRef {
        owner_kind,
        owner: segments[1].to_string(),
        number,
        view,
        filter,
    }))
}

/// `https://github.com/<owner>/<repo>/issues?q=..` (or `/pulls?..`) rewritten
/// into an equivalent repo-scoped search expression.
fn parse_issue_list_url(input: &str) -> Option<String> {
    let (segments, query) = split_github_url(input)?;
    // Exactly owner/repo/issues — a deeper path is a single issue, not a list.
    if segments.len() != 3 {
        return None;
    }
    let (owner, repo, kind) = (segments[0], segments[1], segments[2]);
    let default = match kind {
        "issues" => "is:issue",
        "pulls" => "is:pull-request",
        _ => return None,
    };
    let scoped = format!("repo:{}/{}", owner, repo);
    match query_param(query, "q") {
        Some(q) => Some(format!("{} {}", scoped, percent_decode(q))),
        None => Some(format!("{} {} is:open", scoped, default)),
    }
}
