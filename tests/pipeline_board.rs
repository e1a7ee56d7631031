mod test_utils;

use issuetable::directive::{plan, Pipeline, TableOptions};
use issuetable::render::markdown::render_nodes;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use test_utils::{issue, test_config, MockTransport};

fn board_item(content: Value, status: Option<&str>) -> Value {
    let fields: Vec<Value> = status
        .map(|s| vec![json!({"name": s, "field": {"name": "Status"}})])
        .unwrap_or_default();
    json!({"fieldValues": {"nodes": fields}, "content": content})
}

fn view_response(filter: &str) -> Value {
    json!({
        "data": {
            "organization": {
                "projectV2": {
                    "view": {
                        "filter": filter,
                        "sortByFields": {
                            "nodes": [
                                {"direction": "ASC", "field": {"name": "Status"}}
                            ]
                        }
                    }
                }
            }
        }
    })
}

fn items_response(items: Vec<Value>) -> Value {
    json!({
        "data": {
            "organization": {
                "projectV2": {
                    "items": {
                        "pageInfo": {"hasNextPage": false, "endCursor": null},
                        "nodes": items
                    }
                }
            }
        }
    })
}

#[tokio::test]
async fn view_url_applies_stored_filter_and_native_sort() {
    let transport = Arc::new(MockTransport::new(vec![
        Ok(view_response("is:open has:Status")),
        Ok(items_response(vec![
            board_item(issue(1, "Later", 0, "2024-01-01T00:00:00Z"), Some("Todo")),
            board_item(issue(2, "Untracked", 0, "2024-01-02T00:00:00Z"), None),
            board_item(issue(3, "Sooner", 0, "2024-01-03T00:00:00Z"), Some("Done")),
        ])),
    ]));

    let cache = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_transport(test_config(cache.path()), transport.clone());

    let options = TableOptions::from_directive([("columns", "title,Status")]).unwrap();
    let pending = plan("https://github.com/orgs/acme/projects/4/views/2", options).unwrap();
    let node = pipeline.resolve(&pending).await;

    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.variables(0)["view"].as_u64().unwrap(), 2);
    assert_eq!(transport.variables(1)["number"].as_u64().unwrap(), 4);

    // The has:Status predicate drops the untracked item; the view's own
    // sort orders the rest by Status ascending.
    let rendered = render_nodes(&[node]);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "| TITLE | STATUS |");
    assert_eq!(lines.len(), 4);
    assert!(lines[2].contains("Sooner") && lines[2].contains("Done"));
    assert!(lines[3].contains("Later") && lines[3].contains("Todo"));
    assert!(!rendered.contains("Untracked"));
}

#[tokio::test]
async fn inline_filter_skips_the_view_lookup() {
    let transport = Arc::new(MockTransport::new(vec![Ok(items_response(vec![
        board_item(issue(1, "Tracked", 0, "2024-01-01T00:00:00Z"), Some("Todo")),
        board_item(issue(2, "Untracked", 0, "2024-01-02T00:00:00Z"), None),
    ]))]));

    let cache = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_transport(test_config(cache.path()), transport.clone());

    let options = TableOptions::from_directive([("columns", "title")]).unwrap();
    let pending = plan(
        "https://github.com/orgs/acme/projects/4?filterQuery=has%3AStatus",
        options,
    )
    .unwrap();
    let node = pipeline.resolve(&pending).await;

    assert_eq!(transport.request_count(), 1);
    let rendered = render_nodes(&[node]);
    assert!(rendered.contains("Tracked"));
    assert!(!rendered.contains("Untracked"));
}

#[tokio::test]
async fn missing_view_resolves_to_no_results() {
    let transport = Arc::new(MockTransport::new(vec![Ok(json!({
        "data": {"organization": {"projectV2": {"view": null}}}
    }))]));

    let cache = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_transport(test_config(cache.path()), transport.clone());

    let pending = plan(
        "https://github.com/orgs/acme/projects/4/views/9",
        TableOptions::default(),
    )
    .unwrap();
    let node = pipeline.resolve(&pending).await;

    assert_eq!(transport.request_count(), 1);
    assert_eq!(render_nodes(&[node]), "*No items matched this query.*");
}

#[tokio::test]
async fn not_found_board_resolves_to_no_results() {
    let transport = Arc::new(MockTransport::new(vec![Ok(json!({
        "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to an Organization"}]
    }))]));

    let cache = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_transport(test_config(cache.path()), transport.clone());

    let pending = plan(
        "https://github.com/orgs/ghost/projects/1?filterQuery=is%3Aopen",
        TableOptions::default(),
    )
    .unwrap();
    let node = pipeline.resolve(&pending).await;

    assert_eq!(render_nodes(&[node]), "*No items matched this query.*");
}
