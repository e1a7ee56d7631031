//! GitHub GraphQL access: shared HTTP client, transport seam, and the
//! fetch dispatcher for both plan shapes.

pub mod board;
pub mod search;

use crate::data::SortSpec;
use crate::query::FetchPlan;
use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use std::fmt;
use std::time::Duration;

const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Shared HTTP client for all API requests to enable connection pooling
pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .build()
        .expect("Failed to create HTTP client")
});

/// A failed fetch. Aborts the whole table request; partial pages already
/// fetched are discarded rather than returned degraded.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub msg: String,
}

impl FetchFailure {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for FetchFailure {}

/// Seam between the fetchers and the wire. Production uses [`HttpTransport`];
/// tests substitute canned responses.
pub trait GraphqlTransport: Send + Sync {
    fn execute<'a>(
        &'a self,
        token: &'a str,
        payload: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value, FetchFailure>>;
}

/// Transport backed by the shared reqwest client.
#[derive(Debug, Default)]
pub struct HttpTransport;

impl GraphqlTransport for HttpTransport {
    fn execute<'a>(
        &'a self,
        token: &'a str,
        payload: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value, FetchFailure>> {
        async move {
            let response = HTTP_CLIENT
                .post(GITHUB_GRAPHQL_URL)
                .header("Authorization", format!("Bearer {}", token))
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", "issuetable")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .json(&payload)
                .send()
                .await
                .map_err(|e| FetchFailure::new(format!("Request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(FetchFailure::new(format!(
                    "GitHub API error: {}",
                    response.status()
                )));
            }

            response
                .json()
                .await
                .map_err(|e| FetchFailure::new(format!("Malformed response: {}", e)))
        }
        .boxed()
    }
}

/// Run one GraphQL query, surfacing an explicit `errors` payload as failure.
pub(crate) async fn execute_query(
    transport: &dyn GraphqlTransport,
    token: &str,
    query: &str,
    variables: serde_json::Value,
) -> Result<serde_json::Value, FetchFailure> {
    let payload = serde_json::json!({"query": query, "variables": variables});
    let mut body = transport.execute(token, payload).await?;

    if body
        .get("errors")
        .and_then(|e| e.as_array())
        .is_some_and(|e| !e.is_empty())
    {
        return Err(FetchFailure::new(format!(
            "GitHub GraphQL returned errors: {}",
            body["errors"]
        )));
    }

    Ok(body["data"].take())
}

/// Result of one fetch: raw item payloads plus sort bookkeeping.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FetchOutcome {
    /// Raw GraphQL item payloads, pre-normalization (this is what gets cached).
    pub items: Vec<serde_json::Value>,
    /// Sort clause the remote service applied itself, if any.
    pub delegated_sort: Option<SortSpec>,
    /// Sort the local sorter should apply: the caller's request, or the
    /// board view's native order when the caller gave none.
    pub effective_sort: Option<SortSpec>,
}

/// Execute a fetch plan under a result budget.
pub async fn fetch(
    transport: &dyn GraphqlTransport,
    token: &str,
    plan: &FetchPlan,
    limit: usize,
    sort: Option<&SortSpec>,
) -> Result<FetchOutcome, FetchFailure> {
    match plan {
        FetchPlan::Search { query } => {
            search::fetch_search(transport, token, query, limit, sort).await
        }
        FetchPlan::Board(board) => board::fetch_board(transport, token, board, limit, sort).await,
    }
}
