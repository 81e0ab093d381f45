//! Account API Handlers
//!
//! HTTP endpoints for tracked accounts and categories.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use pulse_core::domain::account::{Account, Category};
use pulse_core::dto::account::{AccountHistory, CreateAccount, CreateCategory};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::account_service;

/// POST /accounts
/// Start tracking an account
pub async fn create_account(
    State(pool): State<PgPool>,
    Json(req): Json<CreateAccount>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    tracing::info!("Creating account: {} @{}", req.platform, req.handle);

    let account = account_service::create_account(&pool, req).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /accounts
/// List tracked accounts
///
/// Query parameters:
/// - `categoryId` (optional): only accounts of this category
pub async fn list_accounts(
    State(pool): State<PgPool>,
    Query(params): Query<AccountsQuery>,
) -> ApiResult<Json<Vec<Account>>> {
    tracing::debug!("Listing accounts (category: {:?})", params.category_id);

    let accounts = account_service::list_accounts(&pool, params.category_id).await?;

    Ok(Json(accounts))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsQuery {
    pub category_id: Option<Uuid>,
}

/// GET /accounts/{id}/history
/// Follower snapshots and growth of one account
pub async fn get_account_history(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AccountHistory>> {
    tracing::debug!("Getting history of account: {}", id);

    let history = account_service::get_history(&pool, id).await?;

    Ok(Json(history))
}

/// POST /categories
pub async fn create_category(
    State(pool): State<PgPool>,
    Json(req): Json<CreateCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = account_service::create_category(&pool, req).await?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /categories
pub async fn list_categories(State(pool): State<PgPool>) -> ApiResult<Json<Vec<Category>>> {
    let categories = account_service::list_categories(&pool).await?;

    Ok(Json(categories))
}
