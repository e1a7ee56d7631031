//! Shared helpers for integration tests: a canned-response transport and
//! raw GraphQL payload builders.

use futures::future::BoxFuture;
use futures::FutureExt;
use issuetable::config::Config;
use issuetable::github::{FetchFailure, GraphqlTransport};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

/// Transport serving canned responses in order, recording every payload.
pub struct MockTransport {
    pub requests: Mutex<Vec<Value>>,
    responses: Mutex<VecDeque<Result<Value, FetchFailure>>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Result<Value, FetchFailure>>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Variables of the nth recorded request.
    pub fn variables(&self, idx: usize) -> Value {
        self.requests.lock().unwrap()[idx]["variables"].clone()
    }
}

impl GraphqlTransport for MockTransport {
    fn execute<'a>(
        &'a self,
        _token: &'a str,
        payload: Value,
    ) -> BoxFuture<'a, Result<Value, FetchFailure>> {
        self.requests.lock().unwrap().push(payload);
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchFailure::new("no canned response left")));
        async move { next }.boxed()
    }
}

pub fn test_config(cache_dir: &Path) -> Config {
    Config {
        token: "test-token".to_string(),
        cache_dir: cache_dir.to_path_buf(),
        cache_enabled: true,
    }
}

/// A raw search-node issue payload with the given reaction/comment counts.
pub fn issue(number: u64, title: &str, thumbs_up: u64, updated: &str) -> Value {
    json!({
        "__typename": "Issue",
        "number": number,
        "title": title,
        "url": format!("https://github.com/acme/widgets/issues/{}", number),
        "state": "OPEN",
        "body": "",
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": updated,
        "closedAt": null,
        "author": {"login": "alice", "company": null, "organizations": {"nodes": []}},
        "repository": {"nameWithOwner": "acme/widgets"},
        "labels": {"nodes": []},
        "comments": {"totalCount": 0},
        "reactionGroups": [
            {"content": "THUMBS_UP", "reactors": {"totalCount": thumbs_up}}
        ],
        "timelineItems": {"nodes": []},
        "subIssues": {"nodes": []}
    })
}

/// Wrap search nodes into one response page.
pub fn search_page(nodes: Vec<Value>, has_next: bool, cursor: Option<&str>) -> Value {
    json!({
        "data": {
            "search": {
                "pageInfo": {"hasNextPage": has_next, "endCursor": cursor},
                "nodes": nodes
            }
        }
    })
}
