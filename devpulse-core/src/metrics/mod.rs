//! The KPI engine.
//!
//! Layering, top to bottom:
//!
//! ```text
//!   overview / insights / heatmap        assembled outputs
//!        |            |
//!   cycle_time  review_turnaround        pure calculators over
//!   ai_ratio    bug_density              event slices
//!   deployments
//!        |
//!   EventStore trait                     the only upstream seam
//!        |
//!   store::Database (or any impl)
//! ```
//!
//! Calculators never perform IO: they take slices of [`crate::types`]
//! records and return plain rows. Whoever drives them fetches the data
//! through [`EventStore`] with a single shared [`MetricsWindow`], so every
//! number in one response describes the same slice of time.

pub mod ai_ratio;
pub mod bug_density;
pub mod cycle_time;
pub mod deployments;
pub mod heatmap;
pub mod insights;
pub mod overview;
pub mod review_turnaround;
pub mod window;

pub use ai_ratio::{AiRatioSummary, AiRatioWeek};
pub use bug_density::BugDensityWeek;
pub use cycle_time::{CycleTimeSummary, CycleTimeWeek};
pub use deployments::{DeploymentSummary, DeploymentWeek};
pub use heatmap::HeatmapCell;
pub use insights::{Insight, AI_PRODUCTIVITY_SIGNAL};
pub use overview::KpiSnapshot;
pub use review_turnaround::{ReviewTurnaroundSummary, ReviewTurnaroundWeek};
pub use window::{hours_between, MetricsWindow, WeekBucket};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Commit, Deployment, Issue, PullRequest, Review};
use crate::types::RepoRef;

/// Read access to one repository's event history.
///
/// Every listing takes the same shape: all events for `repo` at or after
/// `since`, ordered by their primary timestamp. Implementations surface
/// their own failures as errors; they never silently truncate.
pub trait EventStore {
    fn list_commits(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Commit>>;
    fn list_pull_requests(&self, repo: &RepoRef, since: DateTime<Utc>)
        -> Result<Vec<PullRequest>>;
    fn list_reviews(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Review>>;
    fn list_issues(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Issue>>;
    fn list_deployments(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Deployment>>;
}

/// Lower bound that admits the full recorded history.
pub fn all_history() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}
