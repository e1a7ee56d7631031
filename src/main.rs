use anyhow::Result;
use clap::Parser;
use issuetable::config::Config;
use issuetable::directive::{self, Pipeline, TableOptions};
use issuetable::render::markdown::render_nodes;

#[derive(Parser, Debug)]
#[command(name = "issuetable")]
#[command(about = "Render GitHub issue searches and project board views as markdown tables")]
#[command(version)]
struct Args {
    /// Search expression, issue-list URL, or project board view URL
    query: String,

    /// Comma-separated column list
    #[arg(long)]
    columns: Option<String>,

    /// Comma-separated field-direction pairs, e.g. "reactions-desc,updated-asc"
    #[arg(long)]
    sort: Option<String>,

    /// Maximum number of rows
    #[arg(long)]
    limit: Option<String>,

    /// Character budget for body columns
    #[arg(long = "body-truncate")]
    body_truncate: Option<String>,

    /// Character budget for summary columns
    #[arg(long = "summary-truncate")]
    summary_truncate: Option<String>,

    /// Date rendering: "relative" or "absolute"
    #[arg(long = "date-format")]
    date_format: Option<String>,

    /// Comma-separated summary heading keywords
    #[arg(long = "summary-header")]
    summary_header: Option<String>,

    /// Semicolon-separated name=template definitions
    #[arg(long)]
    templates: Option<String>,

    /// Comma-separated width percentages, one per column
    #[arg(long)]
    widths: Option<String>,

    /// Semicolon-separated name=pattern,pattern label column definitions
    #[arg(long = "label-columns")]
    label_columns: Option<String>,

    /// Column to splice sub-issue blocks into
    #[arg(long = "append-sub-issues")]
    append_sub_issues: Option<String>,

    /// Skip the local result cache
    #[arg(long = "no-cache")]
    no_cache: bool,
}

impl Args {
    fn directive_pairs(&self) -> Vec<(&'static str, &str)> {
        let options = [
            ("columns", &self.columns),
            ("sort", &self.sort),
            ("limit", &self.limit),
            ("body-truncate", &self.body_truncate),
            ("summary-truncate", &self.summary_truncate),
            ("date-format", &self.date_format),
            ("summary-header", &self.summary_header),
            ("templates", &self.templates),
            ("widths", &self.widths),
            ("label-columns", &self.label_columns),
            ("append-sub-issues", &self.append_sub_issues),
        ];
        options
            .into_iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.as_str())))
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("issuetable=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    let mut options = TableOptions::from_directive(args.directive_pairs())?;
    if args.no_cache {
        options.use_cache = false;
    }

    let pending = directive::plan(&args.query, options)?;
    let pipeline = Pipeline::new(config);
    let node = pipeline.resolve(&pending).await;

    println!("{}", render_nodes(&[node]));
    Ok(())
}
