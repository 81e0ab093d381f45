//! Pulse Core
//!
//! Core types and abstractions for the Pulse follower tracker.
//!
//! This crate contains:
//! - Domain types: Core business entities (ScrapingJob, Account, snapshots, reports)
//! - DTOs: Data transfer objects for communication between server, runner and clients

pub mod domain;
pub mod dto;
