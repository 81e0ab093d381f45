//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used for communication between Pulse services
//! (server, runner, cli). Field names are camelCase on the wire.

pub mod account;
pub mod job;
