//! Roundabout: round-robin HTTP load balancer.

use clap::Parser;
use log::{error, info};

use roundabout_config::validator::validate as validate_config;
use roundabout_edge::ProxyServer;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long)]
    config: Option<String>,

    /// Overrides the listen port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(|| "./config/config.yaml".to_string());

    // Read configuration file
    let config = match roundabout_config::loader::load_config(&config_path, cli.port) {
        Ok(cfg) => cfg,
        Err(err_msg) => {
            eprintln!("Error loading config: {}", err_msg);
            std::process::exit(1);
        }
    };

    // Initialize the Logger
    let log_file = config.log.file.as_deref();
    if let Err(e) = roundabout_utils::logger::init_logger(&config.log.level, log_file) {
        eprintln!("Error initializing logger: {}", e);
        std::process::exit(1);
    }

    // Validate Configurations
    if !validate_config(&config) {
        error!("Configuration validation failed. Exiting...");
        std::process::exit(1);
    }

    info!(
        "Roundabout {} is starting: {} backends, liveness {}",
        env!("CARGO_PKG_VERSION"),
        config.backends.len(),
        config.liveness
    );

    let server = match ProxyServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    server.serve(shutdown_signal()).await;
    info!("Roundabout stopped");
}
