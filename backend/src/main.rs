//! Kummerkasten Backend
//!
//! Feedback box for student councils: cookie-session accounts and an
//! admin-curated FAQ list.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! - Routes: HTTP request handling and routing
//! - Services: Business logic
//! - Repositories: Data access behind async traits
//! - Database: PostgreSQL with SQLx, or in-memory stores for local runs

use anyhow::Result;
use kummerkasten_backend::{
    config, db, maintenance::SessionReaper, routes, state::AppState,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shortest pepper accepted in production
const MIN_PRODUCTION_PEPPER_LEN: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = config::AppConfig::load()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        env = if config::AppConfig::is_production() { "production" } else { "development" },
        "Starting Kummerkasten Backend"
    );

    // Refuse to start without a pepper
    let pepper = match config.auth.pepper() {
        Ok(pepper) => pepper,
        Err(e) => {
            error!("Configuration error: {}", e);
            anyhow::bail!("KK__AUTH__PEPPER must be set");
        }
    };

    // Validate production configuration
    if config::AppConfig::is_production() {
        validate_production_config(&config, pepper.len())?;
    }

    let state = if config.database.is_in_memory() {
        warn!("Running on in-memory stores, data is lost on exit");
        AppState::in_memory(config.clone(), pepper)?
    } else {
        info!("Connecting to database...");
        let db_pool = db::create_pool(&config.database).await?;

        // Run migrations (skip in production if using separate migration job)
        if !config::AppConfig::is_production() {
            db::run_migrations(&db_pool).await?;
        }

        AppState::new(db_pool, config.clone(), pepper)?
    };

    bootstrap_admin(&state, &config).await?;

    // Session reaper runs until shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = SessionReaper::new(
        Arc::clone(state.sessions()),
        config.session.inactivity_window(),
        config.session.reaper_interval(),
    )
    .spawn(shutdown_rx);

    // Build application
    let app = routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(address = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_tx.send(true).ok();
    if let Err(e) = reaper.await {
        warn!(error = %e, "Session reaper did not stop cleanly");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Create the configured admin account on first start
async fn bootstrap_admin(state: &AppState, config: &config::AppConfig) -> Result<()> {
    match (&config.auth.admin_email, &config.auth.admin_password) {
        (Some(email), Some(password)) => {
            if state.auth().ensure_admin(email, password).await? {
                info!("Bootstrap admin created");
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("Both admin_email and admin_password are needed to bootstrap an admin");
        }
        (None, None) => {}
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config::AppConfig::is_production() {
            "kummerkasten_backend=info,tower_http=info".into()
        } else {
            "kummerkasten_backend=debug,tower_http=debug,sqlx=warn".into()
        }
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config::AppConfig::is_production() {
        // JSON logging for production (better for log aggregation)
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        // Pretty logging for development
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Validate configuration for production deployment
fn validate_production_config(config: &config::AppConfig, pepper_len: usize) -> Result<()> {
    let mut errors = Vec::new();

    if pepper_len < MIN_PRODUCTION_PEPPER_LEN {
        errors.push("Pepper must be at least 16 bytes");
    }

    if config.database.is_in_memory() {
        errors.push("In-memory stores are for development only");
    }

    if !config.session.cookie_secure {
        warn!("Session cookie is sent without the Secure attribute");
    }

    // Check database URL is not localhost in production
    if config.database.url.contains("localhost") || config.database.url.contains("127.0.0.1") {
        warn!("Database URL contains localhost - ensure this is intentional for production");
    }

    if !errors.is_empty() {
        for err in &errors {
            error!("Configuration error: {}", err);
        }
        anyhow::bail!("Invalid production configuration");
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
