//! Health Check API Handler
//!
//! Liveness plus database reachability, for monitoring.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;

/// GET /health
/// 200 when the database answers, 503 otherwise
pub async fn health_check(State(pool): State<PgPool>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
