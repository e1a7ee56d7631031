//! Search-plan fetching: paginated GraphQL `search()` with a delegable-sort
//! decision that controls how many records are pulled.

use super::{execute_query, FetchFailure, FetchOutcome, GraphqlTransport};
use crate::data::{Direction, SortSpec};
use serde::Deserialize;

/// Over-fetch multiplier applied when a sort cannot be pushed to the remote
/// service: client-side sorting over a larger candidate pool approximates a
/// correct top-N. A heuristic, not a correctness guarantee; tune with care.
pub const OVERFETCH_FACTOR: usize = 4;

/// Minimum candidate pool when over-fetching.
pub const PAGE_FLOOR: usize = 100;

const PAGE_SIZE: usize = 50;

/// Sort fields the search API can apply itself (single-key only).
const DELEGABLE_FIELDS: [&str; 5] = ["reactions", "interactions", "comments", "created", "updated"];

const SEARCH_QUERY: &str = r#"
  query($q: String!, $first: Int!, $after: String) {
    search(query: $q, type: ISSUE, first: $first, after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes {
        __typename
        ... on Issue {
          number title url state body createdAt updatedAt closedAt
          author {
            login
            ... on User { company organizations(first: 5) { nodes { name login } } }
          }
          repository { nameWithOwner }
          labels(first: 50) { nodes { name } }
          comments { totalCount }
          reactionGroups { content reactors { totalCount } }
          timelineItems(itemTypes: [CROSS_REFERENCED_EVENT], first: 50) {
            nodes {
              ... on CrossReferencedEvent {
                willCloseTarget
                source { ... on PullRequest { number url state mergedAt } }
              }
            }
          }
          subIssues(first: 50) { nodes { number title url state updatedAt } }
        }
        ... on PullRequest {
          number title url state body createdAt updatedAt closedAt mergedAt isDraft
          author {
            login
            ... on User { company organizations(first: 5) { nodes { name login } } }
          }
          repository { nameWithOwner }
          labels(first: 50) { nodes { name } }
          comments { totalCount }
          reactionGroups { content reactors { totalCount } }
        }
      }
    }
  }
"#;

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchConnection {
    page_info: PageInfo,
    nodes: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// The remote sort clause for a delegable sort spec, or `None` when sorting
/// must happen locally (multi-key, or a field the service cannot sort by).
fn delegable_clause(spec: &SortSpec) -> Option<String> {
    if spec.len() != 1 {
        return None;
    }
    let key = &spec[0];
    if !DELEGABLE_FIELDS.contains(&key.field.as_str()) {
        return None;
    }
    let dir = match key.direction {
        Direction::Asc => "asc",
        Direction::Desc => "desc",
    };
    Some(format!("sort:{}-{}", key.field, dir))
}

pub async fn fetch_search(
    transport: &dyn GraphqlTransport,
    token: &str,
    query: &str,
    limit: usize,
    sort: Option<&SortSpec>,
) -> Result<FetchOutcome, FetchFailure> {
    let (query_string, target, delegated) = match sort {
        None => (query.to_string(), limit, None),
        Some(spec) => match delegable_clause(spec) {
            Some(clause) => (format!("{} {}", query, clause), limit, Some(spec.clone())),
            None => (
                query.to_string(),
                (limit * OVERFETCH_FACTOR).max(PAGE_FLOOR),
                None,
            ),
        },
    };

    tracing::debug!(
        "Search fetch: query={:?} target={} delegated={}",
        query_string,
        target,
        delegated.is_some()
    );

    let mut items: Vec<serde_json::Value> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let first = PAGE_SIZE.min(target - items.len());
        let variables = serde_json::json!({
            "q": query_string,
            "first": first,
            "after": cursor,
        });

        let data = execute_query(transport, token, SEARCH_QUERY, variables).await?;
        let page: SearchData = serde_json::from_value(data)
            .map_err(|e| FetchFailure::new(format!("Unexpected search response shape: {}", e)))?;

        items.extend(page.search.nodes);

        if items.len() >= target || !page.search.page_info.has_next_page {
            break;
        }
        match page.search.page_info.end_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    items.truncate(target);

    Ok(FetchOutcome {
        items,
        delegated_sort: delegated,
        effective_sort: sort.cloned(),
    })
}
