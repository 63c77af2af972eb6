//! Portal Gateway binary.
//!
//! Loads the gateway configuration, binds the listener, starts the metrics
//! exporter, and runs the proxy server until a shutdown signal arrives.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_gateway::config::loader::load_config;
use portal_gateway::{HttpServer, Shutdown};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "portal-gateway", about = "Path-routing HTTP gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args.config)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %args.config.display(),
        routes = config.routes.len(),
        upstreams = config.upstreams.len(),
        redirects = config.redirects.len(),
        "Portal gateway starting"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => portal_gateway::observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Metrics address did not parse, exporter disabled"
            ),
        }
    }

    // Ctrl-C starts the graceful drain.
    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(config);
    server.run(listener, shutdown_rx).await?;
    Ok(())
}
