//! TaskHub API Server
//!
//! REST API server for TaskHub projects and tasks.

use std::sync::Arc;
use std::time::Duration;
use taskhub_api::{
    create_app,
    db::{self, Repositories},
    state::AppState,
};
use taskhub_core::config::{AppConfig, LoggingConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; TASKHUB_CONFIG points at an optional TOML file
    let config = match std::env::var("TASKHUB_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);
    config.validate()?;

    if config.uses_development_secret() {
        tracing::warn!("JWT_SECRET is not set; using the development signing secret");
    }

    let pool = db::connect_pool(&config.database).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let purge_interval = config.auth.purge_interval_secs;

    let state = Arc::new(AppState::new(
        config,
        Repositories::postgres(pool.clone()),
        Some(pool),
    )?);

    if purge_interval > 0 {
        spawn_token_purge(state.clone(), Duration::from_secs(purge_interval));
    }

    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("TaskHub API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "taskhub_api={level},taskhub_core={level},audit=info,tower_http=info",
            level = logging.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Periodically delete expired refresh tokens and blacklist entries
fn spawn_token_purge(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = state.tokens.purge_expired().await {
                tracing::warn!(error = %e, "Token purge failed");
            }
        }
    });
}

/// Resolves on Ctrl-C; `/ready` reports 503 while in-flight requests drain
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    state.set_ready(false);
    tracing::info!("Shutdown signal received");
}
