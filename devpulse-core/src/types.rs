//! Core domain types for devpulse
//!
//! These types represent the canonical event model that normalizes delivery
//! activity pulled from a forge (commits, pull requests, reviews, issues,
//! deployments). The metrics engine consumes slices of these records; it
//! never talks to the forge or the database directly.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Repo** | A single repository identified by `owner/name` |
//! | **Commit** | One commit on any branch, with an optional AI-assisted flag |
//! | **PullRequest** | A PR; "resolved" means merged or, failing that, closed |
//! | **Review** | One review submission on a PR (may lack a timestamp) |
//! | **Issue** | A tracker issue; `is_bug` is derived from its labels |
//! | **Deployment** | A production-ish deploy event (workflow-run proxy) |
//! | **Annotation** | A hand-placed timeline marker (e.g. "AI tool rollout") |
//!
//! The AI-assisted flag on commits is nullable: absence means "not
//! classified", and every ratio in the metrics layer treats absence as
//! `false` without ever producing NaN.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================
// Repository identity
// ============================================

/// Identifies one repository by forge owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A registry row for a tracked repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub repo: RepoRef,
    /// Default branch reported by the forge, if known
    pub default_branch: Option<String>,
}

// ============================================
// Delivery events
// ============================================

/// One commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit SHA (primary key)
    pub sha: String,
    /// Forge login of the author, if the commit maps to an account
    pub author_login: Option<String>,
    /// Display name from the commit metadata
    pub author_name: Option<String>,
    /// Committer timestamp (UTC)
    pub committed_at: DateTime<Utc>,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
    #[serde(default)]
    pub files_changed: i64,
    /// Full commit message
    #[serde(default)]
    pub message: String,
    /// Whether this commit was AI-assisted; `None` means not classified
    pub ai_assisted: Option<bool>,
}

impl Commit {
    /// Treats an unclassified commit as not AI-assisted.
    pub fn is_ai_assisted(&self) -> bool {
        self.ai_assisted.unwrap_or(false)
    }

    /// Author identity for grouping: login, else display name, else "unknown".
    pub fn author_identity(&self) -> &str {
        self.author_login
            .as_deref()
            .or(self.author_name.as_deref())
            .unwrap_or("unknown")
    }
}

/// One pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number within the repository (primary key together with the repo)
    pub number: i64,
    pub author_login: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Forge state string ("open", "closed")
    pub state: Option<String>,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
    #[serde(default)]
    pub changed_files: i64,
}

impl PullRequest {
    /// Resolution timestamp: merged wins over closed; open PRs have none.
    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.merged_at.or(self.closed_at)
    }
}

/// One review submission on a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Forge review id (primary key)
    pub id: i64,
    /// Number of the PR this review belongs to
    pub pr_number: i64,
    pub author_login: Option<String>,
    /// Forge state string ("APPROVED", "CHANGES_REQUESTED", ...)
    pub state: Option<String>,
    /// Submission time; pending reviews have none and never count as "first"
    pub submitted_at: Option<DateTime<Utc>>,
}

/// One tracker issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Forge issue id (primary key)
    pub id: i64,
    pub number: i64,
    pub author_login: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub state: Option<String>,
    /// True when any label name contains "bug" (case-insensitive)
    #[serde(default)]
    pub is_bug: bool,
}

/// One deployment event.
///
/// With no deployment API wired up, completed workflow runs stand in for
/// deploys; `source_id` keeps the originating run id so repeated syncs
/// upsert instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub deployed_at: DateTime<Utc>,
    /// "prod" when the source workflow looks like a deploy, else "unknown"
    pub environment: String,
    /// Workflow conclusion ("success", "failure", "unknown")
    pub status: String,
    /// Where this event came from (e.g. "github_actions")
    pub source: Option<String>,
    /// Upstream identifier (workflow run id), if any
    pub source_id: Option<i64>,
}

// ============================================
// Annotations
// ============================================

/// A hand-placed marker on a repository's timeline.
///
/// Annotations give KPI charts context ("AI tool rollout", "freeze week").
/// The metrics engine ignores them; they are read back next to the series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// Store-assigned id
    pub id: i64,
    pub repo: RepoRef,
    /// The moment the annotation points at
    pub event_at: DateTime<Utc>,
    pub label: String,
    pub note: Option<String>,
}
