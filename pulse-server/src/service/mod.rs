//! Service Module
//!
//! Business logic layer for the server.
//! Services orchestrate between repositories and contain domain logic.

pub mod account;
pub mod job;
pub mod report;

// Re-export for convenience
pub use account as account_service;
pub use job as job_service;
pub use report as report_service;
