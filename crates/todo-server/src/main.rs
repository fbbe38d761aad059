//! Todo App server - bearer-token authenticated REST API

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, ConfigSource, DatabaseBackend, DatabaseConfig, LogFormat, LoggingConfig};
use todo_api::{AppState, create_router};
use todo_auth::{JwtManager, PathPolicy, RequestGate, SigningKey, StoreResolver};
use todo_db::{Database, MemoryUserStore, UserStore};

/// Todo App server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "TODO_AUTH_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "TODO_AUTH_PORT")]
    port: Option<u16>,

    /// Token signing secret
    #[arg(long, env = "TODO_AUTH_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let (mut config, source) = Config::load(&args.config)?;
    if args.jwt_secret.is_some() {
        config.auth.jwt_secret = args.jwt_secret;
    }

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Todo App server v{}", env!("CARGO_PKG_VERSION"));
    if source == ConfigSource::Defaults {
        info!("Config file {} not found, using defaults", args.config);
    }

    // Initialize metrics
    let metrics_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(Arc::new(handle)),
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
            None
        }
    };

    // Initialize user store
    let users = open_user_store(&config.database).await?;

    // Initialize token codec
    let key = SigningKey::derive(config.auth.jwt_secret.as_deref(), config.auth.key_mode())?;
    let jwt = Arc::new(JwtManager::new(&key, config.auth.expiration_seconds));

    // Initialize request gate
    let resolver = Arc::new(StoreResolver::new(users.clone()));
    let policy = PathPolicy::default().with_public_paths(&config.auth.public_paths);
    let gate = Arc::new(
        RequestGate::new(jwt.clone(), resolver, Arc::new(policy))
            .with_resolver_timeout(config.auth.resolver_timeout())
            .with_enforce_subject_exists(config.auth.enforce_subject_exists),
    );

    // Create application state
    let state = AppState::new(users, jwt, gate);

    // Create router
    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Open the configured user store
async fn open_user_store(config: &DatabaseConfig) -> Result<Arc<dyn UserStore>> {
    match config.backend {
        DatabaseBackend::Sqlite => {
            if let Some(parent) = Path::new(&config.path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let db = Database::new(&format!("sqlite:{}?mode=rwc", config.path)).await?;
            if !db.has_users().await? {
                info!("No registered users yet");
            }
            let store: Arc<dyn UserStore> = Arc::new(db);
            Ok(store)
        }
        DatabaseBackend::Memory => {
            warn!("Using in-memory user store; accounts are lost on restart");
            let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
            Ok(store)
        }
    }
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
