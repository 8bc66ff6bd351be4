//! ShelfStore -- book review catalog REST API server.
//!
//! Startup is idempotent: the catalog schema is created on first run and
//! left alone afterwards. SIGTERM/SIGINT handlers stop accepting new
//! connections and let in-flight requests finish before exiting.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

/// Command-line arguments for the ShelfStore server.
#[derive(Parser, Debug)]
#[command(
    name = "shelfstore",
    version,
    about = "Book review catalog REST API server"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "shelfstore.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = shelfstore::config::load_config(&cli.config)?;
    shelfstore::config::apply_env_overrides(&mut config);

    // Initialize tracing / logging. RUST_LOG wins over the config level.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Configuration loaded from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder and register metric descriptions.
    shelfstore::metrics::init_metrics();
    shelfstore::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    // Initialize the catalog store based on config.
    let catalog: Arc<dyn shelfstore::catalog::store::CatalogStore> =
        match config.store.engine.as_str() {
            "memory" => {
                info!("In-memory catalog store initialized");
                Arc::new(shelfstore::catalog::memory::MemoryCatalogStore::new())
            }
            "sqlite" | _ => {
                let db_path = &config.store.sqlite.path;
                // Ensure parent directory exists for the SQLite file.
                if let Some(parent) = std::path::Path::new(db_path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let store = shelfstore::catalog::sqlite::SqliteCatalogStore::new(db_path)?;
                info!("SQLite catalog store initialized at {}", db_path);
                Arc::new(store)
            }
        };

    // Build AppState.
    let state = Arc::new(shelfstore::AppState {
        config: config.clone(),
        catalog,
    });

    let app = shelfstore::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("ShelfStore listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and wait for in-flight requests to complete before exiting.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ShelfStore shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
