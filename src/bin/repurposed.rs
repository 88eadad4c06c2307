//! repurposed: newsletter repurposing daemon.
//!
//! Serves `POST /api/generate` over HTTP, turning an article into X,
//! LinkedIn and Instagram drafts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use repurpose::pipeline::Generator;
use repurpose::providers::{OpenAiClient, RetryingProvider};
use repurpose::ratelimit::FixedWindowLimiter;
use repurpose::server::config::{Config, Secrets};
use repurpose::server::{self, AppState};
use repurpose::{RepurposeError, Result};

/// Newsletter repurposing daemon.
#[derive(Parser)]
#[command(name = "repurposed")]
#[command(version = repurpose::PKG_VERSION)]
#[command(about = "Turns newsletter articles into social media drafts")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "REPURPOSE_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Override the bind address from the config file.
    #[arg(long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("repurpose=info,repurposed=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.server.address = address;
    }
    let secrets = Secrets::load()?;

    let limiter = Arc::new(FixedWindowLimiter::new());
    let generator = build_generator(&config, &secrets, Arc::clone(&limiter))?;

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| RepurposeError::Configuration(format!("Invalid address: {e}")))?;

    info!(
        version = repurpose::version_string(),
        %addr,
        model = %config.provider.model,
        "repurposed starting"
    );

    server::spawn_limiter_pruner(
        limiter,
        Duration::from_secs(config.server.limits.prune_interval_secs.max(1)),
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = server::router(AppState::new(Arc::new(generator)));
    server::serve(listener, app).await?;

    info!("repurposed stopped");
    Ok(())
}

/// Build the [`Generator`] from configuration.
fn build_generator(
    config: &Config,
    secrets: &Secrets,
    limiter: Arc<FixedWindowLimiter>,
) -> Result<Generator> {
    let mut builder = Generator::builder()
        .limiter(limiter)
        .rate_policy(config.server.limits.rate_policy())
        .model(config.provider.model.clone())
        .temperature(config.provider.temperature)
        .pricing(config.pricing);

    // Without a key the server still starts; generations answer 500 until one is configured.
    match secrets.api_key() {
        Some(key) => {
            let client = OpenAiClient::with_base_url(key, config.provider.base_url.clone())
                .timeout(config.provider.timeout());
            let provider = RetryingProvider::new(Arc::new(client), config.provider.retry_config());
            builder = builder.provider(Arc::new(provider));
        }
        None => warn!("no OpenAI API key configured; generation requests will fail"),
    }

    if let Some(path) = &config.storage.database_path {
        builder = with_database(builder, path)?;
    }

    Ok(builder.build())
}

#[cfg(feature = "sqlite")]
fn with_database(
    builder: repurpose::pipeline::GeneratorBuilder,
    path: &std::path::Path,
) -> Result<repurpose::pipeline::GeneratorBuilder> {
    let store = Arc::new(repurpose::storage::SqliteStore::open(path)?);
    info!(path = %path.display(), "using SQLite cache and usage log");
    Ok(builder
        .cache(repurpose::cache::ResponseCache::new(store.clone()))
        .usage_sink(store))
}

#[cfg(not(feature = "sqlite"))]
fn with_database(
    _builder: repurpose::pipeline::GeneratorBuilder,
    path: &std::path::Path,
) -> Result<repurpose::pipeline::GeneratorBuilder> {
    Err(RepurposeError::Configuration(format!(
        "storage.database_path is set to {path:?} but this build lacks the sqlite feature"
    )))
}
