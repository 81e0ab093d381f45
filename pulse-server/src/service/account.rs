//! Account Service
//!
//! Business logic for tracked accounts, categories and snapshot history.

use pulse_core::domain::account::{
    Account, Category, MAX_HANDLE_LEN, is_valid_handle, normalize_handle,
};
use pulse_core::domain::report::history_growth;
use pulse_core::dto::account::{AccountHistory, CreateAccount, CreateCategory};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{account_repository, snapshot_repository};

/// Service error type
#[derive(Debug)]
pub enum AccountError {
    NotFound(Uuid),
    CategoryNotFound(Uuid),
    AlreadyExists(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        AccountError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

/// Start tracking an account
pub async fn create_account(pool: &PgPool, mut req: CreateAccount) -> Result<Account> {
    req.handle = normalize_handle(&req.handle);
    validate_handle(&req.handle)?;

    if let Some(category_id) = req.category_id {
        account_repository::find_category(pool, category_id)
            .await?
            .ok_or(AccountError::CategoryNotFound(category_id))?;
    }

    let label = format!("{} @{}", req.platform, req.handle);
    let account = account_repository::create(pool, req)
        .await?
        .ok_or_else(|| AccountError::AlreadyExists(format!("{} is already tracked", label)))?;

    tracing::info!("Account created: {} ({})", account.id, label);

    Ok(account)
}

/// List accounts, optionally restricted to one category
pub async fn list_accounts(pool: &PgPool, category_id: Option<Uuid>) -> Result<Vec<Account>> {
    let accounts = account_repository::list(pool, category_id).await?;
    Ok(accounts)
}

/// Snapshot history and growth of one account
pub async fn get_history(pool: &PgPool, id: Uuid) -> Result<AccountHistory> {
    let account = account_repository::find_by_id(pool, id)
        .await?
        .ok_or(AccountError::NotFound(id))?;

    let snapshots = snapshot_repository::find_by_account(pool, id).await?;
    let growth_percent = history_growth(&snapshots);

    Ok(AccountHistory {
        account,
        snapshots,
        growth_percent,
    })
}

/// Create a category
pub async fn create_category(pool: &PgPool, mut req: CreateCategory) -> Result<Category> {
    req.name = req.name.trim().to_string();
    if req.name.is_empty() {
        return Err(AccountError::ValidationError(
            "Category name cannot be empty".to_string(),
        ));
    }

    let name = req.name.clone();
    let category = account_repository::create_category(pool, req)
        .await?
        .ok_or_else(|| AccountError::AlreadyExists(format!("Category '{}' already exists", name)))?;

    tracing::info!("Category created: {} ({})", category.id, category.name);

    Ok(category)
}

/// List categories
pub async fn list_categories(pool: &PgPool) -> Result<Vec<Category>> {
    let categories = account_repository::list_categories(pool).await?;
    Ok(categories)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_handle(handle: &str) -> Result<()> {
    if handle.is_empty() {
        return Err(AccountError::ValidationError(
            "Handle cannot be empty".to_string(),
        ));
    }

    if handle.len() > MAX_HANDLE_LEN {
        return Err(AccountError::ValidationError(format!(
            "Handle is too long (max {} characters)",
            MAX_HANDLE_LEN
        )));
    }

    if !is_valid_handle(handle) {
        return Err(AccountError::ValidationError(
            "Handle may only contain letters, digits, '.' and '_'".to_string(),
        ));
    }

    Ok(())
}
