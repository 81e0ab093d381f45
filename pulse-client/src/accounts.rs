//! Account, category and report API endpoints

use crate::PulseClient;
use crate::error::Result;
use pulse_core::domain::account::{Account, Category};
use pulse_core::domain::report::PlatformSummary;
use pulse_core::dto::account::{AccountHistory, CreateAccount, CreateCategory};
use uuid::Uuid;

impl PulseClient {
    /// Start tracking an account
    pub async fn create_account(&self, req: &CreateAccount) -> Result<Account> {
        let response = self
            .client
            .post(self.url("/accounts"))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List tracked accounts, optionally restricted to one category
    pub async fn list_accounts(&self, category_id: Option<Uuid>) -> Result<Vec<Account>> {
        let mut request = self.client.get(self.url("/accounts"));
        if let Some(category_id) = category_id {
            request = request.query(&[("categoryId", category_id.to_string())]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Snapshot history and growth of one account
    pub async fn get_account_history(&self, account_id: Uuid) -> Result<AccountHistory> {
        let response = self
            .client
            .get(self.url(&format!("/accounts/{}/history", account_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a category
    pub async fn create_category(&self, name: impl Into<String>) -> Result<Category> {
        let response = self
            .client
            .post(self.url("/categories"))
            .json(&CreateCategory { name: name.into() })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List categories
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let response = self.client.get(self.url("/categories")).send().await?;

        self.handle_response(response).await
    }

    /// Account count and total followers per platform
    pub async fn platform_report(&self) -> Result<Vec<PlatformSummary>> {
        let response = self
            .client
            .get(self.url("/reports/platforms"))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
