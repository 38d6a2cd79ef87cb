mod check;
mod retailers;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pricewatch_scraper::{EngineSettings, JsonLinesSink, PriceEngine, RetailerRegistry, SharedRegistry};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricewatch")]
#[command(about = "Resilient product price extraction")]
struct Cli {
    /// Retailer registry file (overrides PRICEWATCH_RETAILERS_PATH)
    #[arg(long, global = true)]
    retailers: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract the current price for one product URL
    Check {
        url: String,

        /// Known retail price; extracted prices above twice this are rejected
        #[arg(long)]
        retail_price: Option<f64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract prices for every URL in a file (one per line, `#` comments)
    Batch {
        file: PathBuf,

        /// Print one JSON result per line
        #[arg(long)]
        json: bool,
    },
    /// List configured retailers
    Retailers {
        /// Show which retailer handles this URL instead of listing all
        #[arg(long)]
        lookup: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut config = pricewatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    if let Some(path) = cli.retailers {
        config.retailers_path = path;
    }

    let Some(command) = cli.command else {
        println!("pricewatch: nothing to do; see --help");
        return Ok(());
    };

    let registry = Arc::new(SharedRegistry::new(RetailerRegistry::from_file(
        &config.retailers_path,
    )?));
    tracing::debug!(
        path = %config.retailers_path.display(),
        retailers = registry.current().len(),
        "loaded retailer registry"
    );

    match command {
        Commands::Retailers { lookup } => {
            retailers::run_retailers(&registry, lookup.as_deref());
            Ok(())
        }
        Commands::Check {
            url,
            retail_price,
            json,
        } => {
            let engine = build_engine(registry, &config)?;
            check::run_check(&engine, &url, retail_price, json, shutdown_token()).await
        }
        Commands::Batch { file, json } => {
            let engine = build_engine(registry, &config)?;
            check::run_batch(
                &engine,
                &file,
                config.max_concurrent_checks,
                json,
                shutdown_token(),
            )
            .await
        }
    }
}

fn build_engine(
    registry: Arc<SharedRegistry>,
    config: &pricewatch_core::AppConfig,
) -> anyhow::Result<PriceEngine> {
    let settings = EngineSettings::from_app_config(config);
    let mut engine = PriceEngine::new(registry, settings)?;
    if let Some(path) = &config.results_path {
        tracing::info!(path = %path.display(), "storing successful results");
        engine = engine.with_sink(Arc::new(JsonLinesSink::new(path)));
    }
    Ok(engine)
}

/// Cancelled on ctrl-c so in-flight extractions end with a result instead
/// of being dropped.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("received ctrl-c, cancelling in-flight extractions");
        trigger.cancel();
    });
    token
}
