use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use coursegraph_api::{
    AggregationClient, CatalogFixture, HttpAggregationClient, MemoryAggregationClient,
    resource_list_url,
};
use coursegraph_core::{NodeId, Vec2};
use coursegraph_events::{ActivationOrigin, Event, EventListener};
use coursegraph_graph::{Navigator, NavigatorConfig, ToggleResult};
use reqwest::Url;
use std::path::PathBuf;

mod report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse the course resource hierarchy", long_about = None)]
struct Args {
    /// Catalog fixture to answer aggregation requests from [default:
    /// fixtures/catalog.json unless the config names a base_url]
    #[arg(short, long, conflicts_with = "endpoint")]
    dataset: Option<PathBuf>,

    /// Base URL of a live backend; falls back to `endpoint.base_url` from the
    /// config
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Navigator config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node to toggle after loading, e.g. `group-1/major-11`. Repeatable,
    /// applied in order.
    #[arg(short = 'x', long = "expand")]
    expand: Vec<NodeId>,

    /// Zoom factor applied after all toggles
    #[arg(long)]
    zoom: Option<f32>,

    /// Viewport size as WIDTHxHEIGHT
    #[arg(long, default_value = "1280x720", value_parser = parse_size)]
    viewport: Vec2,

    /// Restore the post-load state after applying the toggles
    #[arg(long)]
    reset: bool,

    /// Node to activate; prints its resource-list link
    #[arg(short, long)]
    select: Option<NodeId>,

    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log navigator events as they are published
    #[arg(long)]
    events: bool,
}

const DEFAULT_DATASET: &str = "fixtures/catalog.json";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Endpoint(String),
    Dataset(PathBuf),
}

/// Command-line flags win over the config file; with neither, the bundled
/// sample catalog is used.
fn resolve_source(args: &Args, config: &NavigatorConfig) -> Source {
    if let Some(url) = &args.endpoint {
        return Source::Endpoint(url.clone());
    }
    if let Some(path) = &args.dataset {
        return Source::Dataset(path.clone());
    }
    match &config.endpoint.base_url {
        Some(url) => Source::Endpoint(url.clone()),
        None => Source::Dataset(PathBuf::from(DEFAULT_DATASET)),
    }
}

fn parse_size(raw: &str) -> Result<Vec2, String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{raw}`"))?;
    let w: f32 = w.trim().parse().map_err(|_| format!("invalid width `{w}`"))?;
    let h: f32 = h.trim().parse().map_err(|_| format!("invalid height `{h}`"))?;
    if w <= 0.0 || h <= 0.0 {
        return Err("viewport dimensions must be positive".to_string());
    }
    Ok(Vec2::new(w, h))
}

/// Forwards navigator events to the log.
struct EventLog;

impl EventListener for EventLog {
    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::RootLoadFailed { .. }
            | Event::NodeFetchFailed { .. }
            | Event::BudgetExceeded { .. } => tracing::warn!(?event, "navigator event"),
            _ => tracing::info!(?event, "navigator event"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => NavigatorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NavigatorConfig::default(),
    };

    match resolve_source(&args, &config) {
        Source::Endpoint(base_url) => {
            let client = HttpAggregationClient::new(
                &base_url,
                &config.endpoint.aggregation_path,
                config.endpoint.timeout(),
            )?;
            tracing::info!(endpoint = %client.endpoint(), "using live aggregation endpoint");
            run(Navigator::new(client, config, args.viewport), &args).await
        }
        Source::Dataset(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading dataset {}", path.display()))?;
            let catalog = CatalogFixture::from_json(&content)
                .with_context(|| format!("parsing dataset {}", path.display()))?;
            let client = MemoryAggregationClient::new(catalog);
            run(Navigator::new(client, config, args.viewport), &args).await
        }
    }
}

async fn run<C: AggregationClient>(mut nav: Navigator<C>, args: &Args) -> Result<()> {
    let mut log = EventLog;
    let loaded = nav.load_root().await;
    if args.events {
        nav.events().dispatch_to(&mut log);
    }
    let summary = loaded.context("loading resource groups")?;
    tracing::info!(
        nodes = summary.node_count,
        expanded_groups = summary.expanded_groups,
        "loaded"
    );

    for id in &args.expand {
        match nav.toggle_expand(id).await? {
            ToggleResult::Ignored(reason) => {
                eprintln!("{id}: toggle ignored ({reason:?})");
            }
            result => tracing::debug!(node = %id, ?result, "toggled"),
        }
        if args.events {
            nav.events().dispatch_to(&mut log);
        }
    }

    if let Some(factor) = args.zoom {
        if factor <= 0.0 {
            bail!("zoom factor must be positive");
        }
        nav.zoom_by(factor);
        while nav.tick(std::time::Duration::from_millis(16)) {}
    }

    if args.reset {
        nav.reset()?;
    }

    let selection = match &args.select {
        Some(id) => {
            let query = nav.activate(id, ActivationOrigin::Select)?;
            let base = Url::parse(&nav.config().endpoint.resource_list_url)
                .context("parsing resource_list_url")?;
            let link = resource_list_url(&base, &query);
            Some(report::Selection {
                id: id.clone(),
                query,
                link: link.to_string(),
            })
        }
        None => None,
    };
    if args.events {
        nav.events().dispatch_to(&mut log);
    }

    let report = report::Report::capture(&nav, selection);
    match args.format {
        Format::Text => print!("{}", report.render_text()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
