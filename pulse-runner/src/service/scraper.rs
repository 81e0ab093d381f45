//! Scraper service
//!
//! Reads the current follower count of one account from the external
//! scraping source. The source exposes:
//! - `GET {base}/health` for a pre-flight check
//! - `GET {base}/{platform}/{handle}` returning `{ "followers": <count> }`

use anyhow::{Context, Result};
use async_trait::async_trait;
use pulse_core::domain::account::{Account, Platform, is_valid_handle};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Why a single account could not be scraped
///
/// None of these abort the job; they become entries in the job's errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("rate limited by {platform}")]
    RateLimited { platform: Platform },

    #[error("handle @{handle} does not exist on {platform}")]
    InvalidHandle { platform: Platform, handle: String },

    #[error("network error: {0}")]
    Network(String),
}

/// Service trait for reading follower counts
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Checks that the scraping source is reachable before a job starts
    async fn health_check(&self) -> Result<()>;

    /// Current follower count of `account`
    async fn fetch_followers(&self, account: &Account) -> std::result::Result<u64, ScrapeError>;
}

/// HTTP implementation of Scraper
pub struct HttpScraper {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpScraper {
    /// Creates a new HTTP scraper
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the scraping source
    /// * `token` - Optional bearer token
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid scraper URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Scraper URL cannot carry a path: {}", base_url);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build scraper HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Base URL extended with `segments`, each encoded as one path segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn account_url(&self, account: &Account) -> Url {
        self.endpoint(&[account.platform.slug(), account.handle.as_str()])
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FollowerCount {
    followers: u64,
}

/// Map a non-success status from the source to a scrape error
fn classify(status: StatusCode, account: &Account) -> ScrapeError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ScrapeError::RateLimited {
            platform: account.platform,
        },
        StatusCode::NOT_FOUND => ScrapeError::InvalidHandle {
            platform: account.platform,
            handle: account.handle.clone(),
        },
        other => ScrapeError::Network(format!("scraper responded with {}", other)),
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn health_check(&self) -> Result<()> {
        let response = self
            .get(self.endpoint(&["health"]))
            .send()
            .await
            .context("Scraper health check failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Scraper is unhealthy: {}", response.status());
        }

        Ok(())
    }

    async fn fetch_followers(&self, account: &Account) -> std::result::Result<u64, ScrapeError> {
        if !is_valid_handle(&account.handle) {
            return Err(ScrapeError::InvalidHandle {
                platform: account.platform,
                handle: account.handle.clone(),
            });
        }

        let response = self
            .get(self.account_url(account))
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify(status, account));
        }

        let body = response
            .json::<FollowerCount>()
            .await
            .map_err(|e| ScrapeError::Network(format!("invalid scraper response: {}", e)))?;

        Ok(body.followers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn account(platform: Platform, handle: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            handle: handle.to_string(),
            platform,
            display_name: None,
            category_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_account_url() {
        let scraper =
            HttpScraper::new("http://scraper:9090/", None, Duration::from_secs(5)).unwrap();
        let url = scraper.account_url(&account(Platform::Tiktok, "khaby.lame"));
        assert_eq!(url.as_str(), "http://scraper:9090/tiktok/khaby.lame");

        let prefixed =
            HttpScraper::new("http://scraper:9090/api", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            prefixed.endpoint(&["health"]).as_str(),
            "http://scraper:9090/api/health"
        );
    }

    #[test]
    fn test_handle_stays_in_its_path_segment() {
        let scraper =
            HttpScraper::new("http://scraper:9090", None, Duration::from_secs(5)).unwrap();
        let url = scraper.account_url(&account(Platform::Instagram, "nasa/../esa?x#y"));
        assert_eq!(
            url.as_str(),
            "http://scraper:9090/instagram/nasa%2F..%2Fesa%3Fx%23y"
        );
    }

    #[tokio::test]
    async fn test_invalid_handle_is_never_requested() {
        // Nothing listens on the discard port; a request would surface as Network
        let scraper =
            HttpScraper::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let err = scraper
            .fetch_followers(&account(Platform::Instagram, "nasa/../esa"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ScrapeError::InvalidHandle {
                platform: Platform::Instagram,
                handle: "nasa/../esa".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(HttpScraper::new("not a url", None, Duration::from_secs(5)).is_err());
        assert!(HttpScraper::new("mailto:ops@example.com", None, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_classify_status() {
        let acc = account(Platform::Instagram, "nasa");

        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, &acc),
            ScrapeError::RateLimited {
                platform: Platform::Instagram
            }
        );
        assert_eq!(
            classify(StatusCode::NOT_FOUND, &acc),
            ScrapeError::InvalidHandle {
                platform: Platform::Instagram,
                handle: "nasa".to_string()
            }
        );
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, &acc),
            ScrapeError::Network(_)
        ));
    }

    #[test]
    fn test_error_messages_name_the_account() {
        let err = ScrapeError::InvalidHandle {
            platform: Platform::Twitter,
            handle: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), "handle @ghost does not exist on Twitter");
    }

    #[test]
    fn test_follower_count_body() {
        let body: FollowerCount = serde_json::from_str(r#"{"followers": 1200}"#).unwrap();
        assert_eq!(body.followers, 1200);
    }
}
