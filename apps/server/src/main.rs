//! # Mercado Server
//!
//! ```text
//! mercado-server [--config <path>]
//!
//!   config file ──► env overrides ──► validate
//!        │
//!        ▼
//!   open SQLite (migrations) ──► bootstrap admin ──► serve until Ctrl+C
//! ```

use std::path::PathBuf;

use anyhow::Context;
use mercado_db::{Database, DbConfig};
use mercado_server::auth::bootstrap_admin;
use mercado_server::{build_router, AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mercado=debug,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config_path = parse_args()?;
    let config = ServerConfig::load(config_path).context("Failed to load configuration")?;

    if config.uses_default_secret() {
        warn!("Using the built-in JWT secret; set MERCADO_JWT_SECRET in production");
    }

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db = Database::new(
        DbConfig::new(&db_path).max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to open database")?;
    info!(path = %db_path.display(), "Database ready");

    bootstrap_admin(&db, &config.auth)
        .await
        .context("Failed to bootstrap admin")?;

    let addr = config.socket_addr()?;
    let state = AppState::new(db.clone(), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Mercado listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn parse_args() -> anyhow::Result<Option<PathBuf>> {
    let mut config_path = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("Usage: mercado-server [--config <path>]");
                println!();
                println!("Environment overrides use the MERCADO_ prefix, e.g. MERCADO_PORT.");
                std::process::exit(0);
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }

    Ok(config_path)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
