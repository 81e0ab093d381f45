//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod account;
pub mod error;
pub mod health;
pub mod job;
pub mod report;

use axum::{
    Router,
    routing::{get, post},
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

/// Create the main API router with all endpoints
pub fn create_router(pool: PgPool) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/jobs", post(job::trigger_job).get(job::list_jobs))
        .route("/jobs/pending", get(job::list_pending_jobs))
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}/status", get(job::get_job_status))
        .route("/jobs/{id}/start", post(job::start_job))
        .route("/jobs/{id}/accounts", get(job::list_job_accounts))
        .route(
            "/jobs/{id}/accounts/{account_id}",
            post(job::record_account_outcome),
        )
        .route("/jobs/{id}/finish", post(job::finish_job))
        .route("/jobs/{id}/fail", post(job::fail_job))
        // Account endpoints
        .route(
            "/accounts",
            post(account::create_account).get(account::list_accounts),
        )
        .route("/accounts/{id}/history", get(account::get_account_history))
        .route(
            "/categories",
            post(account::create_category).get(account::list_categories),
        )
        // Report endpoints
        .route("/reports/platforms", get(report::platform_report))
        // Add state and middleware
        .with_state(pool)
        .layer(TraceLayer::new_for_http())
}
