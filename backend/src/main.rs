use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use differer::{runner, AppState, Config};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    if env::args().any(|a| a == "--version" || a == "-V") {
        println!("differer {}", VERSION);
        return Ok(());
    }

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "could not read config: {}. \
             Point DIFFERER_CONFIG at a YAML file with a `runners` mapping.",
            e
        )
    })?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting differer {}", VERSION);

    let runners = runner::from_config(&config)?;
    for (name, service) in &config.runners {
        tracing::info!("Registered runner {} at {}", name, service);
    }
    if runners.is_empty() {
        tracing::warn!("No runners configured, every batch will come back empty");
    }
    tracing::info!(
        "Runner timeout is {}",
        humantime::format_duration(config.timeout)
    );

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let state = Arc::new(AppState::new(&config, runners));
    let shutdown = state.shutdown.clone();
    let app = differer::app(state);

    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}
