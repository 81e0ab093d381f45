//! Postgres fixtures for store tests
//!
//! Tests call [`pool`] and return early when `DATABASE_URL` is not set.
//! Every fixture creates its own category, so concurrent tests never share
//! a job scope.

use pulse_core::domain::account::{Account, Category, Platform};
use pulse_core::dto::account::{CreateAccount, CreateCategory};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::db;
use crate::repository::account_repository;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Pool on the test database with the schema in place
pub async fn pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = db::create_pool(&url, 5)
        .await
        .expect("DATABASE_URL is set but not reachable");

    MIGRATED
        .get_or_init(|| async {
            db::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");
        })
        .await;

    Some(pool)
}

pub async fn category(pool: &PgPool) -> Category {
    account_repository::create_category(
        pool,
        CreateCategory {
            name: format!("test-{}", Uuid::new_v4()),
        },
    )
    .await
    .unwrap()
    .unwrap()
}

pub async fn account_in(pool: &PgPool, category: &Category) -> Account {
    let handle = format!("t{}", &Uuid::new_v4().simple().to_string()[..20]);

    account_repository::create(
        pool,
        CreateAccount {
            handle,
            platform: Platform::Instagram,
            display_name: None,
            category_id: Some(category.id),
        },
    )
    .await
    .unwrap()
    .unwrap()
}
