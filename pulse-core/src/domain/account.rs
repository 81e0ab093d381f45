//! Tracked account domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Social network an account lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Instagram,
    Tiktok,
    Twitter,
}

/// An account whose follower count is tracked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    /// Handle without a leading `@`
    pub handle: String,
    pub platform: Platform,
    pub display_name: Option<String>,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Grouping of accounts; a job may be scoped to one category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Follower count captured for one account by one job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerSnapshot {
    pub id: Uuid,
    pub account_id: Uuid,
    pub job_id: Uuid,
    pub platform: Platform,
    pub follower_count: u64,
    pub captured_at: DateTime<Utc>,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::Tiktok, Platform::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "INSTAGRAM",
            Platform::Tiktok => "TIKTOK",
            Platform::Twitter => "TWITTER",
        }
    }

    /// Lowercase path segment used by scraping endpoints
    pub fn slug(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Instagram => write!(f, "Instagram"),
            Platform::Tiktok => write!(f, "TikTok"),
            Platform::Twitter => write!(f, "Twitter"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instagram" | "ig" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "twitter" | "x" => Ok(Platform::Twitter),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// Strip surrounding whitespace and a leading `@` from a handle
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_string()
}

/// Longest handle any supported platform allows
pub const MAX_HANDLE_LEN: usize = 30;

/// Whether `handle` is a normalized handle the platforms can issue
///
/// Handles use only ASCII letters, digits, `.` and `_`, so a valid handle is
/// always a single URL path segment.
pub fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LEN
        && handle
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("instagram".parse::<Platform>(), Ok(Platform::Instagram));
        assert_eq!("TIKTOK".parse::<Platform>(), Ok(Platform::Tiktok));
        assert_eq!("x".parse::<Platform>(), Ok(Platform::Twitter));
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_as_str_parses_back() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("  @nasa "), "nasa");
        assert_eq!(normalize_handle("nasa"), "nasa");
    }

    #[test]
    fn test_valid_handles() {
        assert!(is_valid_handle("nasa"));
        assert!(is_valid_handle("khaby.lame"));
        assert!(is_valid_handle("jack_2006"));
        assert!(is_valid_handle(&"a".repeat(MAX_HANDLE_LEN)));
    }

    #[test]
    fn test_handles_that_would_leave_their_path_segment() {
        for handle in ["nasa/../esa", "nasa?x=1", "nasa#top", "..%2Fesa", "na sa", "ñandú", ""] {
            assert!(!is_valid_handle(handle), "{:?} should be rejected", handle);
        }
        assert!(!is_valid_handle(&"a".repeat(MAX_HANDLE_LEN + 1)));
    }
}
