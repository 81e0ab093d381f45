//! Scheduler layer for the runner
//!
//! This layer handles polling the server for pending jobs and handing them
//! to the job runner, bounded by the number of jobs allowed in parallel.

pub mod poller;

pub use poller::JobPoller;
