use anyhow::Context;
use anyhow::Result;
use catalog_filter::CatalogEngine;
use catalog_filter::CatalogView;
use catalog_filter::EngineConfig;
use catalog_filter::FilterSelection;
use catalog_filter::JsonFileSource;
use catalog_filter::RefreshOutcome;
use clap::Parser;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod render;

use render::Palette;
use render::Report;

/// Grace period on top of the debounce window while waiting for a view.
const VIEW_WAIT_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
    name = "catalog-filter",
    version,
    about = "Filter a JSON product catalog by attribute values"
)]
struct Cli {
    /// Catalog file: a JSON array of entries or an object with an `entries` array
    #[arg(short, long, value_name = "PATH")]
    catalog: PathBuf,

    /// Value every listed entry must carry; repeat to narrow further
    #[arg(short, long = "size", value_name = "VALUE")]
    sizes: Vec<String>,

    /// Engine configuration (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// List the available values with their entry counts
    #[arg(long)]
    facets: bool,

    /// Print operation timings after the run
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).await?;
    let wait = config.debounce() + VIEW_WAIT_SLACK;
    let source = Arc::new(JsonFileSource::new(&cli.catalog));
    let engine = CatalogEngine::new(config, source).context("Failed to start catalog engine")?;

    let outcome = engine
        .refresh()
        .await
        .with_context(|| format!("Failed to load catalog from {}", cli.catalog.display()))?;
    if let RefreshOutcome::Installed {
        accepted, rejected, ..
    } = outcome
    {
        info!(accepted, rejected, "catalog loaded");
        if rejected > 0 {
            warn!("{rejected} catalog entries were skipped");
        }
    }

    let selection: FilterSelection = cli.sizes.iter().map(String::as_str).collect();
    let view = apply_filter(&engine, selection, wait).await?;
    engine.shutdown();

    let report = Report::new(
        &view,
        engine.snapshot().snapshot().len(),
        cli.facets.then(|| engine.facets()),
        cli.metrics.then(|| engine.metrics_report()),
    );
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render(Palette::for_stdout()));
    }
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    EngineConfig::from_toml_str(&raw)
        .with_context(|| format!("Invalid config {}", path.display()))
}

/// Route `selection` through the engine's coalescer and wait for the view it
/// produces.
async fn apply_filter(
    engine: &CatalogEngine,
    selection: FilterSelection,
    wait: Duration,
) -> Result<Arc<CatalogView>> {
    let current = engine.current_view();
    if current.selection == selection {
        return Ok(current);
    }
    let mut views = engine.subscribe();
    engine.set_filter(selection.clone());
    let applied = tokio::time::timeout(wait, async {
        loop {
            views.changed().await?;
            let view = views.borrow_and_update().clone();
            if view.selection == selection {
                return Ok::<_, anyhow::Error>(view);
            }
        }
    })
    .await
    .context("Timed out waiting for the filter to apply")??;
    Ok(applied)
}
