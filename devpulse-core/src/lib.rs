//! # devpulse-core
//!
//! Core library for devpulse - a software delivery KPI engine.
//!
//! This library provides:
//! - Domain types for commits, pull requests, reviews, issues, and deployments
//! - Database storage layer with SQLite
//! - Ingestion from the GitHub API and from JSONL archives
//! - Metric calculators for cycle time, review turnaround, AI-assistance
//!   ratio, bug density, and deployment frequency
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Sources:** The GitHub REST API and on-disk JSONL archives
//! - **Store:** Normalized SQLite tables, idempotent under re-ingestion
//! - **Metrics:** KPI calculators reading through the [`metrics::EventStore`]
//!   trait (regenerable, never persisted)
//!
//! ## Example
//!
//! ```rust,no_run
//! use devpulse_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{ArchiveImporter, ImportResult, SyncOutcome};
pub use metrics::{EventStore, MetricsWindow};
pub use store::Database;
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod store;
pub mod types;
