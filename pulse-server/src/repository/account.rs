//! Account Repository
//!
//! Handles database operations for tracked accounts, categories and job
//! enrollment.

use chrono::{DateTime, Utc};
use pulse_core::domain::account::{Account, Category, Platform};
use pulse_core::domain::job::JobScope;
use pulse_core::dto::account::{CreateAccount, CreateCategory};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::job::is_unique_violation;

/// Create a new account
///
/// Returns `None` when `(platform, handle)` is already tracked.
pub async fn create(pool: &PgPool, req: CreateAccount) -> Result<Option<Account>, sqlx::Error> {
    let account = Account {
        id: Uuid::new_v4(),
        handle: req.handle,
        platform: req.platform,
        display_name: req.display_name,
        category_id: req.category_id,
        created_at: Utc::now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO accounts (id, handle, platform, display_name, category_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(account.id)
    .bind(&account.handle)
    .bind(account.platform.as_str())
    .bind(&account.display_name)
    .bind(account.category_id)
    .bind(account.created_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(Some(account)),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Find an account by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Account>, sqlx::Error> {
    let row = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT id, handle, platform, display_name, category_id, created_at
        FROM accounts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|r| r.try_into().ok()))
}

/// List accounts, optionally restricted to one category
pub async fn list(pool: &PgPool, category_id: Option<Uuid>) -> Result<Vec<Account>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT id, handle, platform, display_name, category_id, created_at
        FROM accounts
        WHERE $1::uuid IS NULL OR category_id = $1
        ORDER BY platform, handle
        "#,
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?;

    Ok(convert_rows(rows))
}

/// IDs of the accounts a job over `scope` enrolls
pub async fn ids_in_scope(pool: &PgPool, scope: JobScope) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM accounts
        WHERE $1::uuid IS NULL OR category_id = $1
        "#,
    )
    .bind(scope.category_id())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Accounts enrolled in a job
pub async fn find_enrolled(pool: &PgPool, job_id: Uuid) -> Result<Vec<Account>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT a.id, a.handle, a.platform, a.display_name, a.category_id, a.created_at
        FROM job_accounts ja
        JOIN accounts a ON a.id = ja.account_id
        WHERE ja.job_id = $1
        ORDER BY a.platform, a.handle
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(convert_rows(rows))
}

/// One enrolled account and whether it has been attempted
pub async fn find_enrollment(
    pool: &PgPool,
    job_id: Uuid,
    account_id: Uuid,
) -> Result<Option<(Account, bool)>, sqlx::Error> {
    let row = sqlx::query_as::<_, EnrollmentRow>(
        r#"
        SELECT a.id, a.handle, a.platform, a.display_name, a.category_id, a.created_at,
               ja.attempted_at
        FROM job_accounts ja
        JOIN accounts a ON a.id = ja.account_id
        WHERE ja.job_id = $1 AND ja.account_id = $2
        "#,
    )
    .bind(job_id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|r| {
        let attempted = r.attempted_at.is_some();
        r.account.try_into().ok().map(|a| (a, attempted))
    }))
}

// =============================================================================
// Categories
// =============================================================================

/// Create a category; `None` when the name is taken
pub async fn create_category(
    pool: &PgPool,
    req: CreateCategory,
) -> Result<Option<Category>, sqlx::Error> {
    let category = Category {
        id: Uuid::new_v4(),
        name: req.name,
        created_at: Utc::now(),
    };

    let result = sqlx::query("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3)")
        .bind(category.id)
        .bind(&category.name)
        .bind(category.created_at)
        .execute(pool)
        .await;

    match result {
        Ok(_) => Ok(Some(category)),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

pub async fn find_category(pool: &PgPool, id: Uuid) -> Result<Option<Category>, sqlx::Error> {
    let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
        "SELECT id, name, created_at FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, name, created_at)| Category {
        id,
        name,
        created_at,
    }))
}

pub async fn list_categories(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
        "SELECT id, name, created_at FROM categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, created_at)| Category {
            id,
            name,
            created_at,
        })
        .collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

fn convert_rows(rows: Vec<AccountRow>) -> Vec<Account> {
    rows.into_iter()
        .filter_map(|row| match Account::try_from(row) {
            Ok(account) => Some(account),
            Err(e) => {
                tracing::warn!("Skipping account row: {}", e);
                None
            }
        })
        .collect()
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    handle: String,
    platform: String,
    display_name: Option<String>,
    category_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    #[sqlx(flatten)]
    account: AccountRow,
    attempted_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = String;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let platform = row.platform.parse::<Platform>()?;
        Ok(Account {
            id: row.id,
            handle: row.handle,
            platform,
            display_name: row.display_name,
            category_id: row.category_id,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(platform: &str) -> AccountRow {
        AccountRow {
            id: Uuid::new_v4(),
            handle: "nasa".to_string(),
            platform: platform.to_string(),
            display_name: None,
            category_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_account_row_conversion() {
        let account = Account::try_from(row("TWITTER")).unwrap();
        assert_eq!(account.platform, Platform::Twitter);
        assert_eq!(account.handle, "nasa");
    }

    #[test]
    fn test_unknown_platform_rows_are_skipped() {
        let accounts = convert_rows(vec![row("INSTAGRAM"), row("FRIENDSTER")]);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].platform, Platform::Instagram);
    }
}
