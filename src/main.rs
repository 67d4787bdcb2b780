use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::info;

use catalog_watcher::{
    AppConfig, CatalogPipeline, NotificationHub, PipelineScheduler,
    database::{self, PriceStore, SqlitePriceStore},
    fetcher::{HttpPageFetcher, PageFetcher},
    web::{self, AppState},
};

#[derive(Parser, Debug)]
#[command(name = "catalog-watcher", version, about = "Catalog price watcher")]
struct Cli {
    /// Config file path, without extension
    #[arg(short, long, env = "CATALOG_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and live feed (default)
    Serve {
        /// Start the pipeline loop immediately
        #[arg(long)]
        autostart: bool,
    },
    /// Run one catalog pass and print its report
    Scrape,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("catalog_watcher=info".parse()?),
        )
        .init();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to install metrics exporter")?;
        info!(port = config.metrics.port, "Metrics exporter listening");
    }

    let pool = database::connect(&config.database).await?;
    let store: Arc<dyn PriceStore> = Arc::new(SqlitePriceStore::new(pool));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(&config.scraper)?);
    let hub = Arc::new(NotificationHub::new(config.feed.format));
    let pipeline = Arc::new(CatalogPipeline::from_config(
        &config.scraper,
        fetcher,
        store.clone(),
        hub.clone(),
    )?);

    match cli.command.unwrap_or(Command::Serve { autostart: false }) {
        Command::Scrape => {
            info!(start_url = pipeline.start_url(), "Running a single catalog pass");
            let report = pipeline.run_pass().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve { autostart } => {
            let scheduler = Arc::new(PipelineScheduler::new(pipeline, config.scheduler.interval()));
            if autostart || config.scheduler.autostart {
                scheduler.ensure_running().await;
            }

            let state = AppState {
                store,
                hub,
                scheduler: scheduler.clone(),
                config: config.clone(),
            };

            info!("Starting Catalog Watcher...");
            tokio::select! {
                result = web::serve(config, state) => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
            }
            scheduler.shutdown().await;
        }
    }

    Ok(())
}
