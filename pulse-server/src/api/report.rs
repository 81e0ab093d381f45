//! Report API Handlers

use axum::{Json, extract::State};
use pulse_core::domain::report::PlatformSummary;
use sqlx::PgPool;

use crate::api::error::ApiResult;
use crate::service::report_service;

/// GET /reports/platforms
/// Account count and total followers per platform
pub async fn platform_report(State(pool): State<PgPool>) -> ApiResult<Json<Vec<PlatformSummary>>> {
    tracing::debug!("Building platform report");

    let summary = report_service::platform_summary(&pool).await?;

    Ok(Json(summary))
}
