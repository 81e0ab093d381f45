//! Core domain types
//!
//! This module contains the core domain structures used across Pulse services.
//! These types represent the fundamental business entities and are shared between
//! server (for persistence), runner (for scraping) and clients (for display).

pub mod account;
pub mod job;
pub mod report;
