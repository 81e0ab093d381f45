//! Repository layer
//!
//! Repositories abstract communication with the Pulse server. They provide
//! simple, focused interfaces for the runner-facing job endpoints without
//! any business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod jobs;

// Re-export traits
pub use jobs::JobRepository;

// Re-export implementations
pub use jobs::HttpJobRepository;

#[cfg(test)]
pub use jobs::memory::InMemoryJobRepository;
