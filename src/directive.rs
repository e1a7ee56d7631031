//! Directive surface and the two-phase table protocol.
//!
//! Phase one (`plan`) runs synchronously in the host: it validates options
//! and returns an immutable [`PendingTable`] placeholder. Phase two
//! (`Pipeline::resolve`) runs later and turns each placeholder into a final
//! content node. Resolution never propagates errors: every failure becomes
//! a replacement node so one broken table cannot abort a document build.

use crate::cache;
use crate::config::Config;
use crate::data::{parse_sort_spec, sort_spec_display, SortSpec};
use crate::github::{self, FetchFailure, FetchOutcome, GraphqlTransport, HttpTransport};
use crate::normalize::normalize_items;
use crate::query::{self, FetchPlan};
use crate::render::columns::DateFormat;
use crate::render::content::Node;
use crate::render::table::assemble;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_COLUMNS: &str = "title,author,state,reactions";
const DEFAULT_LIMIT: usize = 25;
const DEFAULT_BODY_TRUNCATE: usize = 200;
const DEFAULT_SUMMARY_TRUNCATE: usize = 400;
const DEFAULT_SUMMARY_HEADERS: &str = "summary,description,overview";

/// Parsed per-table options.
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub columns: Vec<String>,
    pub sort: Option<SortSpec>,
    pub limit: usize,
    pub body_truncate: usize,
    pub summary_truncate: usize,
    pub date_format: DateFormat,
    pub summary_headers: Vec<String>,
    pub templates: HashMap<String, String>,
    pub widths: Option<Vec<f32>>,
    pub label_columns: HashMap<String, Vec<String>>,
    pub append_sub_issues: Option<String>,
    pub use_cache: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            columns: split_list(DEFAULT_COLUMNS),
            sort: None,
            limit: DEFAULT_LIMIT,
            body_truncate: DEFAULT_BODY_TRUNCATE,
            summary_truncate: DEFAULT_SUMMARY_TRUNCATE,
            date_format: DateFormat::Relative,
            summary_headers: split_list(DEFAULT_SUMMARY_HEADERS),
            templates: HashMap::new(),
            widths: None,
            label_columns: HashMap::new(),
            append_sub_issues: None,
            use_cache: true,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse semicolon-separated `name=value` definitions.
fn split_defs(raw: &str, option: &str) -> Result<Vec<(String, String)>> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|def| {
            def.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .with_context(|| format!("Invalid {} definition {:?}: expected name=...", option, def))
        })
        .collect()
}

impl TableOptions {
    /// Build options from the host's named directive options.
    pub fn from_directive<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let mut opts = Self::default();
        for (key, value) in pairs {
            match key {
                "columns" => opts.columns = split_list(value),
                "sort" => {
                    let spec = parse_sort_spec(value);
                    opts.sort = if spec.is_empty() { None } else { Some(spec) };
                }
                "limit" => {
                    opts.limit = value
                        .trim()
                        .parse()
                        .with_context(|| format!("Invalid limit {:?}", value))?;
                }
                "body-truncate" => {
                    opts.body_truncate = value
                        .trim()
                        .parse()
                        .with_context(|| format!("Invalid body-truncate {:?}", value))?;
                }
                "summary-truncate" => {
                    opts.summary_truncate = value
                        .trim()
                        .parse()
                        .with_context(|| format!("Invalid summary-truncate {:?}", value))?;
                }
                "date-format" => {
                    opts.date_format = match value.trim() {
                        "relative" => DateFormat::Relative,
                        "absolute" => DateFormat::Absolute,
                        other => bail!("Invalid date-format {:?}: expected relative or absolute", other),
                    };
                }
                "summary-header" => opts.summary_headers = split_list(value),
                "templates" => {
                    for (name, template) in split_defs(value, "templates")? {
                        opts.templates.insert(name, template);
                    }
                }
                "widths" => {
                    let widths: Result<Vec<f32>> = split_list(value)
                        .iter()
                        .map(|w| {
                            w.parse::<f32>()
                                .with_context(|| format!("Invalid width {:?}", w))
                        })
                        .collect();
                    opts.widths = Some(widths?);
                }
                "label-columns" => {
                    for (name, patterns) in split_defs(value, "label-columns")? {
                        opts.label_columns.insert(name, split_list(&patterns));
                    }
                }
                "append-sub-issues" => opts.append_sub_issues = Some(value.trim().to_string()),
                other => bail!("Unknown option {:?}", other),
            }
        }
        Ok(opts)
    }

    /// Precondition checks for an invocation.
    fn validate(&self, arg: &str) -> Result<()> {
        if arg.trim().is_empty() {
            bail!("Search argument must not be empty");
        }
        if self.columns.is_empty() {
            bail!("columns must name at least one column");
        }
        if let Some(widths) = &self.widths {
            if widths.len() != self.columns.len() {
                bail!(
                    "widths has {} entries for {} columns",
                    widths.len(),
                    self.columns.len()
                );
            }
            if widths.iter().any(|w| *w <= 0.0) {
                bail!("widths must all be positive");
            }
        }
        if let Some(target) = &self.append_sub_issues {
            if !self.columns.contains(target) {
                bail!("append-sub-issues target {:?} is not in columns", target);
            }
        }
        Ok(())
    }
}

/// An opaque placeholder for a table pending resolution. Immutable; the
/// host swaps it for the resolved node in its own tree-substitution pass.
#[derive(Debug, Clone)]
pub struct PendingTable {
    pub arg: String,
    pub options: TableOptions,
}

/// Phase one: validate and collect. A returned error is a precondition
/// failure the host should surface via [`error_node`].
pub fn plan(arg: &str, options: TableOptions) -> Result<PendingTable> {
    options.validate(arg)?;
    Ok(PendingTable {
        arg: arg.trim().to_string(),
        options,
    })
}

/// User-visible replacement for a table that could not be built.
pub fn error_node(message: &str) -> Node {
    Node::Paragraph(vec![
        Node::Strong(vec![Node::text("Issue table error:")]),
        Node::text(format!(" {}", message)),
    ])
}

fn no_results_node() -> Node {
    Node::Paragraph(vec![Node::Emphasis(vec![Node::text(
        "No items matched this query.",
    )])])
}

/// Phase two: resolves pending tables against the GitHub API and the local
/// cache. One instance serves a whole document build.
pub struct Pipeline {
    config: Config,
    transport: Arc<dyn GraphqlTransport>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: Arc::new(HttpTransport),
        }
    }

    /// Substitute the wire; used by tests and by hosts with their own client.
    pub fn with_transport(config: Config, transport: Arc<dyn GraphqlTransport>) -> Self {
        Self { config, transport }
    }

    /// Resolve one pending table. Infallible by contract: failures render
    /// as replacement nodes.
    pub async fn resolve(&self, pending: &PendingTable) -> Node {
        match self.run(pending).await {
            Ok(node) => node,
            Err(failure) => {
                tracing::error!("Table for {:?} failed: {}", pending.arg, failure.msg);
                error_node(&failure.msg)
            }
        }
    }

    /// Resolve a batch of placeholders concurrently. Output order matches
    /// input order; completion order between tables is unspecified.
    pub async fn resolve_all(&self, pending: &[PendingTable]) -> Vec<Node> {
        futures::future::join_all(pending.iter().map(|p| self.resolve(p))).await
    }

    async fn run(&self, pending: &PendingTable) -> Result<Node, FetchFailure> {
        let opts = &pending.options;
        let plan = query::resolve(&pending.arg);
        let is_board = matches!(plan, FetchPlan::Board(_));

        let sort_id = opts.sort.as_deref().map(sort_spec_display).unwrap_or_default();
        let key = cache::cache_key(&plan.cache_key_component(), opts.limit, &sort_id);

        let outcome = match self.read_cached(&key, opts.use_cache) {
            Some(outcome) => outcome,
            None => {
                let outcome = github::fetch(
                    self.transport.as_ref(),
                    &self.config.token,
                    &plan,
                    opts.limit,
                    opts.sort.as_ref(),
                )
                .await?;
                if opts.use_cache && self.config.cache_enabled {
                    match serde_json::to_value(&outcome) {
                        Ok(value) => {
                            if let Err(e) = cache::write(&self.config.cache_dir, &key, value) {
                                tracing::warn!("Failed to write cache entry: {}", e);
                            }
                        }
                        Err(e) => tracing::warn!("Failed to serialize cache entry: {}", e),
                    }
                }
                outcome
            }
        };

        let records = normalize_items(&outcome.items, is_board);
        let mut records = match &outcome.effective_sort {
            Some(spec) => crate::data::sorting::sort_records(&records, spec),
            None => records,
        };
        records.truncate(opts.limit);

        if records.is_empty() {
            return Ok(no_results_node());
        }
        Ok(assemble(&records, opts))
    }

    fn read_cached(&self, key: &str, use_cache: bool) -> Option<FetchOutcome> {
        if !use_cache || !self.config.cache_enabled {
            return None;
        }
        let value = cache::read(&self.config.cache_dir, key)?;
        match serde_json::from_value(value) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::debug!("Discarding cache entry with stale shape: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TableOptions::default();
        assert_eq!(opts.columns, vec!["title", "author", "state", "reactions"]);
        assert_eq!(opts.limit, 25);
        assert_eq!(opts.date_format, DateFormat::Relative);
        assert!(opts.sort.is_none());
    }

    #[test]
    fn test_from_directive_parsing() {
        let opts = TableOptions::from_directive([
            ("columns", "title,state,type"),
            ("sort", "reactions-desc,updated-asc"),
            ("limit", "10"),
            ("date-format", "absolute"),
            ("templates", "search=[q](https://x?q={{title | urlencode}})"),
            ("label-columns", "type=type:*;misc=enhancement,bug"),
            ("widths", "50,25,25"),
        ])
        .unwrap();

        assert_eq!(opts.limit, 10);
        assert_eq!(opts.sort.as_ref().unwrap().len(), 2);
        assert_eq!(opts.date_format, DateFormat::Absolute);
        assert_eq!(opts.templates.len(), 1);
        assert_eq!(
            opts.label_columns.get("misc").unwrap(),
            &vec!["enhancement".to_string(), "bug".to_string()]
        );
        assert_eq!(opts.widths, Some(vec![50.0, 25.0, 25.0]));
    }

    #[test]
    fn test_unknown_option_rejected() {
        assert!(TableOptions::from_directive([("frobnicate", "1")]).is_err());
    }

    #[test]
    fn test_plan_rejects_empty_argument() {
        assert!(plan("  ", TableOptions::default()).is_err());
    }

    #[test]
    fn test_plan_rejects_width_count_mismatch() {
        let mut opts = TableOptions::default();
        opts.widths = Some(vec![50.0, 50.0]);
        assert!(plan("is:open", opts).is_err());
    }

    #[test]
    fn test_plan_rejects_non_positive_width() {
        let mut opts = TableOptions::default();
        opts.widths = Some(vec![25.0, 25.0, 25.0, -5.0]);
        assert!(plan("is:open", opts).is_err());
    }

    #[test]
    fn test_plan_rejects_missing_append_target() {
        let mut opts = TableOptions::default();
        opts.append_sub_issues = Some("sub_issues".to_string());
        assert!(plan("is:open", opts).is_err());

        let mut opts = TableOptions::default();
        opts.columns.push("sub_issues".to_string());
        opts.append_sub_issues = Some("sub_issues".to_string());
        assert!(plan("is:open", opts).is_ok());
    }
}
