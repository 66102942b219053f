use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use booking_mesh::config::{load_config, MeshConfig};
use booking_mesh::lifecycle::{build_state, Shutdown};
use booking_mesh::observability::{logging, metrics};
use booking_mesh::HttpServer;

#[derive(Parser)]
#[command(name = "booking-mesh", version, about = "Inter-service resilience gateway for the booking services")]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long, env = "MESH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => MeshConfig::default().with_default_dependencies(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "booking-mesh starting");
    match &args.config {
        Some(path) => tracing::info!(path = %path.display(), "Configuration loaded"),
        None => tracing::info!("No config file given, using defaults"),
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = build_state(config)?;
    let server = HttpServer::new(state);

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move { shutdown.trigger_on_ctrl_c().await });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
