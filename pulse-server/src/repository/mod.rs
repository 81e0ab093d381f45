//! Repository Module
//!
//! Data access layer for the server.
//! Each repository handles database operations for a specific domain entity.

pub mod account;
pub mod job;
pub mod snapshot;

#[cfg(test)]
pub mod test_db;

// Re-export for convenience
pub use account as account_repository;
pub use job as job_repository;
pub use snapshot as snapshot_repository;
