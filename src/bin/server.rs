//! lanekv Server Binary
//!
//! Starts the lanekv server.

use clap::Parser;
use lanekv::config::SyncStrategy;
use lanekv::{Config, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// lanekv Server
#[derive(Parser, Debug)]
#[command(name = "lanekv-server")]
#[command(about = "Multi-database key-value server")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./lanekv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4141")]
    endpoint: String,

    /// Pending requests allowed per database
    #[arg(short, long, default_value = "4096")]
    inbox_capacity: usize,

    /// Threads serving catalog commands
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Disconnect clients that block a reply for this long (0 = never)
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,

    /// fsync the store log after every write
    #[arg(long)]
    sync_every_write: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lanekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("lanekv server v{}", lanekv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Endpoint: {}", args.endpoint);

    let sync_strategy = if args.sync_every_write {
        SyncStrategy::EveryWrite
    } else {
        SyncStrategy::EveryNEntries { count: 100 }
    };

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .endpoint(&args.endpoint)
        .inbox_capacity(args.inbox_capacity)
        .catalog_workers(args.workers)
        .write_timeout_ms(args.write_timeout_ms)
        .sync_strategy(sync_strategy)
        .build();

    let server = match Server::bind(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.shutdown();
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
