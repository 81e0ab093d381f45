use anyhow::Context;
use sqlx::PgPool;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

use crate::config::Config;
use crate::service::job_service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pulse Server...");

    let config = Config::from_env();
    config.validate()?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    tokio::spawn(sweep_stale_jobs(
        pool.clone(),
        config.stale_sweep_interval,
        config.stale_job_timeout,
    ));

    // Build router with all API endpoints
    let app = api::create_router(pool);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

/// Periodically fail RUNNING jobs whose runner went silent
async fn sweep_stale_jobs(pool: PgPool, every: Duration, max_idle: Duration) {
    tracing::info!(
        "Sweeping stale jobs every {:?} (timeout: {:?})",
        every,
        max_idle
    );

    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        match job_service::fail_stale_jobs(&pool, max_idle).await {
            Ok(0) => {}
            Ok(count) => tracing::info!("Failed {} stale job(s)", count),
            Err(e) => tracing::error!("Stale job sweep failed: {:?}", e),
        }
    }
}
