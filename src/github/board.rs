//! Project-board fetching: view configuration lookup plus item pagination.
//!
//! A missing board or view is a resolution failure (zero records, logged),
//! not a hard error; transport and API failures still abort the request.

use super::{FetchFailure, FetchOutcome, GraphqlTransport};
use crate::data::{Direction, SortKey, SortSpec};
use crate::query::{BoardRef, OwnerKind};
use serde::Deserialize;

const PAGE_SIZE: usize = 50;

fn owner_field(kind: OwnerKind) -> &'static str {
    match kind {
        OwnerKind::Org => "organization",
        OwnerKind::User => "user",
    }
}

fn view_query(kind: OwnerKind) -> String {
    format!(
        r#"
  query($owner: String!, $number: Int!, $view: Int!) {{
    {owner}(login: $owner) {{
      projectV2(number: $number) {{
        view(number: $view) {{
          filter
          sortByFields(first: 4) {{
            nodes {{
              direction
              field {{ ... on ProjectV2FieldCommon {{ name }} }}
            }}
          }}
        }}
      }}
    }}
  }}
"#,
        owner = owner_field(kind)
    )
}

fn items_query(kind: OwnerKind) -> String {
    format!(
        r#"
  query($owner: String!, $number: Int!, $first: Int!, $after: String) {{
    {owner}(login: $owner) {{
      projectV2(number: $number) {{
        items(first: $first, after: $after) {{
          pageInfo {{ hasNextPage endCursor }}
          nodes {{
            fieldValues(first: 30) {{
              nodes {{
                ... on ProjectV2ItemFieldTextValue {{
                  text field {{ ... on ProjectV2FieldCommon {{ name }} }}
                }}
                ... on ProjectV2ItemFieldSingleSelectValue {{
                  name field {{ ... on ProjectV2FieldCommon {{ name }} }}
                }}
                ... on ProjectV2ItemFieldNumberValue {{
                  number field {{ ... on ProjectV2FieldCommon {{ name }} }}
                }}
                ... on ProjectV2ItemFieldDateValue {{
                  date field {{ ... on ProjectV2FieldCommon {{ name }} }}
                }}
                ... on ProjectV2ItemFieldIterationValue {{
                  title field {{ ... on ProjectV2FieldCommon {{ name }} }}
                }}
              }}
            }}
            content {{
              __typename
              ... on Issue {{
                number title url state body createdAt updatedAt closedAt
                author {{
                  login
                  ... on User {{ company organizations(first: 5) {{ nodes {{ name login }} }} }}
                }}
                repository {{ nameWithOwner }}
                labels(first: 50) {{ nodes {{ name }} }}
                comments {{ totalCount }}
                reactionGroups {{ content reactors {{ totalCount }} }}
                subIssues(first: 50) {{ nodes {{ number title url state updatedAt }} }}
              }}
              ... on PullRequest {{
                number title url state body createdAt updatedAt closedAt mergedAt isDraft
                author {{
                  login
                  ... on User {{ company organizations(first: 5) {{ nodes {{ name login }} }} }}
                }}
                repository {{ nameWithOwner }}
                labels(first: 50) {{ nodes {{ name }} }}
                comments {{ totalCount }}
                reactionGroups {{ content reactors {{ totalCount }} }}
              }}
            }}
          }}
        }}
      }}
    }}
  }}
"#,
        owner = owner_field(kind)
    )
}

/// Run a board query, treating NOT_FOUND as "board absent" rather than a
/// hard failure. Other error payloads still abort.
async fn execute_board_query(
    transport: &dyn GraphqlTransport,
    token: &str,
    query: &str,
    variables: serde_json::Value,
) -> Result<Option<serde_json::Value>, FetchFailure> {
    let payload = serde_json::json!({"query": query, "variables": variables});
    let mut body = transport.execute(token, payload).await?;

    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let all_not_found = errors
                .iter()
                .all(|e| e["type"].as_str() == Some("NOT_FOUND"));
            if all_not_found {
                return Ok(None);
            }
            return Err(FetchFailure::new(format!(
                "GitHub GraphQL returned errors: {}",
                body["errors"]
            )));
        }
    }

    Ok(Some(body["data"].take()))
}

#[derive(Debug, Default)]
struct ViewConfig {
    filter: Option<String>,
    sort: Option<SortSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewNode {
    filter: Option<String>,
    sort_by_fields: Option<SortFieldConnection>,
}

#[derive(Debug, Deserialize)]
struct SortFieldConnection {
    nodes: Vec<SortFieldNode>,
}

#[derive(Debug, Deserialize)]
struct SortFieldNode {
    direction: Option<String>,
    field: Option<SortFieldName>,
}

#[derive(Debug, Deserialize)]
struct SortFieldName {
    name: Option<String>,
}

async fn fetch_view(
    transport: &dyn GraphqlTransport,
    token: &str,
    board: &BoardRef,
    view_number: u32,
) -> Result<Option<ViewConfig>, FetchFailure> {
    let variables = serde_json::json!({
        "owner": board.owner,
        "number": board.number,
        "view": view_number,
    });

    let Some(data) =
        execute_board_query(transport, token, &view_query(board.owner_kind), variables).await?
    else {
        return Ok(None);
    };

    let view = &data[owner_field(board.owner_kind)]["projectV2"]["view"];
    if view.is_null() {
        return Ok(None);
    }

    let node: ViewNode = serde_json::from_value(view.clone())
        .map_err(|e| FetchFailure::new(format!("Unexpected view response shape: {}", e)))?;

    let sort = node.sort_by_fields.and_then(|conn| {
        let keys: SortSpec = conn
            .nodes
            .into_iter()
            .filter_map(|n| {
                let field = n.field?.name?;
                let direction = match n.direction.as_deref() {
                    Some("ASC") => Direction::Asc,
                    _ => Direction::Desc,
                };
                Some(SortKey { field, direction })
            })
            .collect();
        if keys.is_empty() {
            None
        } else {
            Some(keys)
        }
    });

    Ok(Some(ViewConfig {
        filter: node.filter,
        sort,
    }))
}

/// Board-field names a `has:<field>` predicate requires to be present.
fn required_fields(filter: Option<&str>) -> Vec<String> {
    filter
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|token| token.strip_prefix("has:"))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// True when the raw item carries a non-empty value for the named board field.
fn item_has_field(item: &serde_json::Value, name: &str) -> bool {
    let Some(nodes) = item["fieldValues"]["nodes"].as_array() else {
        return false;
    };
    nodes.iter().any(|value| {
        if value["field"]["name"].as_str() != Some(name) {
            return false;
        }
        // Exactly one scalar is populated per field value.
        for key in ["text", "name", "date", "title"] {
            if let Some(s) = value[key].as_str() {
                if !s.is_empty() {
                    return true;
                }
            }
        }
        value["number"].is_number()
    })
}

pub async fn fetch_board(
    transport: &dyn GraphqlTransport,
    token: &str,
    board: &BoardRef,
    limit: usize,
    sort: Option<&SortSpec>,
) -> Result<FetchOutcome, FetchFailure> {
    let mut filter = board.filter.clone();
    let mut native_sort: Option<SortSpec> = None;

    // A view number without an inline filter requires a lookup of that
    // view's stored configuration.
    if filter.is_none() {
        if let Some(view_number) = board.view {
            match fetch_view(transport, token, board, view_number).await? {
                Some(view) => {
                    filter = view.filter;
                    native_sort = view.sort;
                }
                None => {
                    tracing::error!(
                        "Project view {} not found on {} board {}",
                        view_number,
                        board.owner,
                        board.number
                    );
                    return Ok(FetchOutcome {
                        items: Vec::new(),
                        delegated_sort: None,
                        effective_sort: sort.cloned(),
                    });
                }
            }
        }
    }

    let required = required_fields(filter.as_deref());
    let query = items_query(board.owner_kind);

    let mut items: Vec<serde_json::Value> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "owner": board.owner,
            "number": board.number,
            "first": PAGE_SIZE,
            "after": cursor,
        });

        let Some(data) = execute_board_query(transport, token, &query, variables).await? else {
            tracing::error!(
                "Project board {} not found for {}",
                board.number,
                board.owner
            );
            return Ok(FetchOutcome {
                items: Vec::new(),
                delegated_sort: None,
                effective_sort: sort.cloned(),
            });
        };

        let connection = &data[owner_field(board.owner_kind)]["projectV2"]["items"];
        if connection.is_null() {
            tracing::error!(
                "Project board {} not found for {}",
                board.number,
                board.owner
            );
            return Ok(FetchOutcome {
                items: Vec::new(),
                delegated_sort: None,
                effective_sort: sort.cloned(),
            });
        }

        if let Some(nodes) = connection["nodes"].as_array() {
            for node in nodes {
                if required.iter().all(|name| item_has_field(node, name)) {
                    items.push(node.clone());
                }
                if items.len() >= limit {
                    break;
                }
            }
        }

        let has_next = connection["pageInfo"]["hasNextPage"].as_bool().unwrap_or(false);
        if items.len() >= limit || !has_next {
            break;
        }
        match connection["pageInfo"]["endCursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    items.truncate(limit);

    Ok(FetchOutcome {
        items,
        delegated_sort: None,
        effective_sort: sort.cloned().or(native_sort),
    })
}
