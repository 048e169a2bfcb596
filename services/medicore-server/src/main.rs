//! MediCore API Server
//!
//! REST API server for the MediCore clinic platform: authentication,
//! refresh sessions and account management.
//!
//! # Features
//!
//! - Bearer access tokens with rotating http-only refresh cookies
//! - Role and capability gates
//! - Optional Google sign-in
//! - OpenAPI description at `/api-docs/openapi.json`
//! - Prometheus metrics export
//! - Graceful shutdown handling
//! - Health check endpoints
//!
//! # Usage
//!
//! ```bash
//! # Start against PostgreSQL
//! medicore-server --access-secret ... --refresh-secret ...
//!
//! # Start with custom config
//! medicore-server --config /path/to/config.toml
//!
//! # Local development: in-memory store, generated secrets
//! medicore-server --dev-mode
//!
//! # Environment overrides
//! MEDICORE__SERVER__PORT=9000 medicore-server
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medicore_api::{create_router, ApiConfig, AppState};
use medicore_auth::{AuthService, BroadcastPublisher, GoogleProvider};
use medicore_db::{AccountRepo, AccountStore, Database, MemoryStore};

use crate::config::{ServerConfig, StoreBackend};

// =============================================================================
// CLI Arguments
// =============================================================================

/// MediCore API Server
#[derive(Parser, Debug)]
#[command(name = "medicore-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "MEDICORE_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "MEDICORE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MEDICORE_PORT")]
    port: Option<u16>,

    /// Log level or filter directive
    #[arg(long, env = "MEDICORE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "MEDICORE_LOG_FORMAT")]
    log_format: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Access token signing secret
    #[arg(long, env = "JWT_ACCESS_SECRET", hide_env_values = true)]
    access_secret: Option<String>,

    /// Refresh token signing secret
    #[arg(long, env = "JWT_REFRESH_SECRET", hide_env_values = true)]
    refresh_secret: Option<String>,

    /// Development mode: in-memory store, cheap hashing, generated secrets
    #[arg(long, env = "MEDICORE_DEV_MODE")]
    dev_mode: bool,
}

impl Args {
    /// CLI values win over file and environment configuration
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.database_url {
            config.database.postgres_url = url;
        }
        if let Some(secret) = self.access_secret {
            config.auth.jwt.access_secret = secret;
        }
        if let Some(secret) = self.refresh_secret {
            config.auth.jwt.refresh_secret = secret;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let dev_mode = args.dev_mode;

    let mut server_config = if dev_mode && args.config.is_none() {
        ServerConfig::development()
    } else {
        ServerConfig::load(args.config.as_deref())?
    };
    args.apply(&mut server_config);
    if dev_mode {
        server_config.fill_dev_secrets();
    }

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dev_mode,
        "Starting MediCore API Server"
    );

    validate_config(&server_config, dev_mode)?;

    if server_config.metrics.enabled {
        start_metrics_exporter(server_config.metrics.port)?;
    }

    let store = init_store(&server_config.database).await?;

    let events = BroadcastPublisher::default();
    spawn_event_log(&events);

    let auth = AuthService::new(store, Arc::new(events), server_config.auth.clone())
        .context("failed to initialize authentication")?;

    let mut state = AppState::new(auth);
    if let Some(google) = server_config.auth.oauth.google.clone() {
        tracing::info!("Google sign-in enabled");
        state = state.with_identity_provider(Arc::new(GoogleProvider::new(google)));
    }

    let api_config = ApiConfig {
        enable_cors: server_config.api.enable_cors,
        cors_origins: server_config.api.cors_origins.clone(),
        enable_compression: server_config.api.enable_compression,
        enable_tracing: server_config.api.enable_tracing,
        request_timeout: server_config.server.request_timeout(),
        max_body_size: server_config.api.max_body_size,
    };

    let app = create_router(Arc::new(state), api_config);

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }

    Ok(())
}

/// Refuse to start with configuration that cannot be safe
fn validate_config(config: &ServerConfig, dev_mode: bool) -> anyhow::Result<()> {
    if let Err(problems) = config.auth.validate() {
        for problem in &problems {
            tracing::warn!(problem = %problem, "Auth configuration");
        }
        if !dev_mode {
            anyhow::bail!("invalid auth configuration: {}", problems.join("; "));
        }
    }

    if config.database.backend == StoreBackend::Memory && !dev_mode {
        anyhow::bail!("the memory store is only available with --dev-mode");
    }

    if config.api.enable_cors && config.api.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS allows any origin; browsers will not send the refresh cookie");
    }

    Ok(())
}

/// Build the configured account store
async fn init_store(config: &config::DatabaseSettings) -> anyhow::Result<Arc<dyn AccountStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory account store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let db = Database::connect(&config.to_db_config()).await?;

            if config.run_migrations {
                db.migrate().await?;
            }

            let health = db.health_check().await;
            if !health.healthy {
                anyhow::bail!("database health check failed");
            }

            let repo = db.account_repo();
            if config.session_sweep_secs > 0 {
                spawn_session_sweeper(repo.clone(), Duration::from_secs(config.session_sweep_secs));
            }

            Ok(Arc::new(repo))
        }
    }
}

/// Periodically delete refresh sessions past their expiry
fn spawn_session_sweeper(repo: AccountRepo, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match repo.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
                Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
            }
        }
    });
}

/// Structured log line per account event
fn spawn_event_log(events: &BroadcastPublisher) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => tracing::info!(
                    target: "medicore::events",
                    account_id = %envelope.event.account_id(),
                    event = ?envelope.event,
                    "Account event"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log lagging")
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Install the Prometheus recorder with its own HTTP listener
fn start_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to start metrics exporter")?;

    tracing::info!(port, "Metrics exporter listening");
    Ok(())
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
