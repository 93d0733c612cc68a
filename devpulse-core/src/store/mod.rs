//! Storage layer for devpulse
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for upserts and queries
//! - Content-hash checkpoints for archive imports

pub mod repo;
pub mod schema;

pub use repo::Database;
