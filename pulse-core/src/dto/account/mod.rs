//! Account, category and report DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::account::{Account, FollowerSnapshot, Platform};

/// Request to start tracking an account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    pub handle: String,
    pub platform: Platform,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

/// Request to create a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategory {
    pub name: String,
}

/// Snapshot history of one account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHistory {
    pub account: Account,
    /// Oldest first
    pub snapshots: Vec<FollowerSnapshot>,
    pub growth_percent: Option<f64>,
}
