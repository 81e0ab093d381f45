//! Service layer
//!
//! Services contain business logic for the runner. They orchestrate
//! operations using repositories: running a scraping job and reading
//! follower counts from the scraping source.
//!
//! All services are trait-based to enable testing and dependency injection.

mod job_runner;
mod scraper;

// Re-export traits
pub use scraper::{ScrapeError, Scraper};

// Re-export implementations
pub use job_runner::JobRunner;
pub use scraper::HttpScraper;
