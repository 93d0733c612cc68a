//! The combined KPI snapshot.
//!
//! One fetch pass, one window, five calculators. Every sequence is listed
//! with the same lower bound so the headline numbers can never disagree
//! about what "the last N days" meant. Any store failure aborts the whole
//! snapshot; a half-filled overview is worse than none.

use serde::Serialize;

use crate::error::Result;
use crate::metrics::window::MetricsWindow;
use crate::metrics::{ai_ratio, bug_density, cycle_time, deployments, review_turnaround};
use crate::metrics::EventStore;
use crate::types::RepoRef;

/// Headline KPIs for one repository over one shared window.
#[derive(Debug, Clone, Serialize)]
pub struct KpiSnapshot {
    pub repo: RepoRef,
    /// Window length the caller asked for
    pub days: i64,
    pub avg_pr_cycle_hours: Option<f64>,
    pub pr_count: i64,
    pub avg_first_review_hours: Option<f64>,
    pub ai_ratio: Option<f64>,
    pub total_commits: i64,
    pub ai_commits: i64,
    pub avg_bugs_per_100_commits: Option<f64>,
    pub deployments: i64,
    pub deployments_per_week: Option<f64>,
}

/// Computes the snapshot for `repo` over `window`.
pub fn snapshot<S: EventStore + ?Sized>(
    store: &S,
    repo: &RepoRef,
    window: MetricsWindow,
) -> Result<KpiSnapshot> {
    let since = window.since();

    let commits = store.list_commits(repo, since)?;
    let prs = store.list_pull_requests(repo, since)?;
    let reviews = store.list_reviews(repo, since)?;
    let issues = store.list_issues(repo, since)?;
    let deploys = store.list_deployments(repo, since)?;

    let cycle = cycle_time::summarize(&prs);
    let review = review_turnaround::summarize(&prs, &reviews);
    let ai = ai_ratio::summarize(&commits);
    let density_rows = bug_density::weekly(&commits, &issues);
    let deploy = deployments::summarize(&deploys, window.days());

    tracing::debug!(
        repo = %repo,
        days = window.days(),
        pr_count = cycle.pr_count,
        total_commits = ai.total_commits,
        deployments = deploy.deployments,
        "computed KPI snapshot"
    );

    Ok(KpiSnapshot {
        repo: repo.clone(),
        days: window.days(),
        avg_pr_cycle_hours: cycle.avg_cycle_hours,
        pr_count: cycle.pr_count,
        avg_first_review_hours: review.avg_first_review_hours,
        ai_ratio: ai.ai_ratio,
        total_commits: ai.total_commits,
        ai_commits: ai.ai_commits,
        avg_bugs_per_100_commits: bug_density::average_per_100(&density_rows),
        deployments: deploy.deployments,
        deployments_per_week: deploy.deployments_per_week,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Commit, Deployment, Issue, PullRequest, Review};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// In-memory store over plain vectors; optionally fails on issues.
    struct VecStore {
        commits: Vec<Commit>,
        prs: Vec<PullRequest>,
        reviews: Vec<Review>,
        issues: Vec<Issue>,
        deployments: Vec<Deployment>,
        fail_issues: bool,
    }

    impl EventStore for VecStore {
        fn list_commits(&self, _repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Commit>> {
            Ok(self
                .commits
                .iter()
                .filter(|c| c.committed_at >= since)
                .cloned()
                .collect())
        }

        fn list_pull_requests(
            &self,
            _repo: &RepoRef,
            since: DateTime<Utc>,
        ) -> Result<Vec<PullRequest>> {
            Ok(self
                .prs
                .iter()
                .filter(|p| p.created_at >= since)
                .cloned()
                .collect())
        }

        fn list_reviews(&self, _repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Review>> {
            Ok(self
                .reviews
                .iter()
                .filter(|r| r.submitted_at.map(|t| t >= since).unwrap_or(false))
                .cloned()
                .collect())
        }

        fn list_issues(&self, _repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Issue>> {
            if self.fail_issues {
                return Err(Error::Config("issue backend offline".to_string()));
            }
            Ok(self
                .issues
                .iter()
                .filter(|i| i.created_at >= since)
                .cloned()
                .collect())
        }

        fn list_deployments(
            &self,
            _repo: &RepoRef,
            since: DateTime<Utc>,
        ) -> Result<Vec<Deployment>> {
            Ok(self
                .deployments
                .iter()
                .filter(|d| d.deployed_at >= since)
                .cloned()
                .collect())
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn fixture_store() -> VecStore {
        let base = utc(2024, 5, 6, 9);
        VecStore {
            commits: (0..10)
                .map(|i| Commit {
                    sha: format!("c{i}"),
                    author_login: Some("alice".to_string()),
                    author_name: None,
                    committed_at: base + Duration::hours(i),
                    additions: 1,
                    deletions: 0,
                    files_changed: 1,
                    message: "change".to_string(),
                    ai_assisted: Some(i < 4),
                })
                .collect(),
            prs: vec![
                PullRequest {
                    number: 1,
                    author_login: Some("alice".to_string()),
                    title: None,
                    created_at: base,
                    merged_at: Some(base + Duration::hours(5)),
                    closed_at: None,
                    state: Some("closed".to_string()),
                    additions: 10,
                    deletions: 2,
                    changed_files: 2,
                },
                PullRequest {
                    number: 2,
                    author_login: Some("bob".to_string()),
                    title: None,
                    created_at: base + Duration::hours(1),
                    merged_at: None,
                    closed_at: None,
                    state: Some("open".to_string()),
                    additions: 3,
                    deletions: 1,
                    changed_files: 1,
                },
            ],
            reviews: vec![Review {
                id: 100,
                pr_number: 1,
                author_login: Some("bob".to_string()),
                state: Some("APPROVED".to_string()),
                submitted_at: Some(base + Duration::hours(2)),
            }],
            issues: vec![Issue {
                id: 500,
                number: 7,
                author_login: None,
                title: None,
                created_at: base + Duration::hours(3),
                closed_at: None,
                state: Some("open".to_string()),
                is_bug: true,
            }],
            deployments: (0..4)
                .map(|i| Deployment {
                    deployed_at: base + Duration::days(i),
                    environment: "prod".to_string(),
                    status: "success".to_string(),
                    source: Some("github_actions".to_string()),
                    source_id: Some(i),
                })
                .collect(),
            fail_issues: false,
        }
    }

    #[test]
    fn snapshot_matches_individual_calculators() {
        let store = fixture_store();
        let repo = RepoRef::new("acme", "api");
        let window = MetricsWindow::days_ending_at(utc(2024, 5, 20, 0), 28).unwrap();

        let snap = snapshot(&store, &repo, window).unwrap();

        assert_eq!(snap.days, 28);
        assert_eq!(snap.avg_pr_cycle_hours, Some(5.0));
        assert_eq!(snap.pr_count, 2);
        assert_eq!(snap.avg_first_review_hours, Some(2.0));
        assert_eq!(snap.total_commits, 10);
        assert_eq!(snap.ai_commits, 4);
        assert_eq!(snap.ai_ratio, Some(0.4));
        // One commit week, one bug: 1/10 * 100.
        assert_eq!(snap.avg_bugs_per_100_commits, Some(10.0));
        assert_eq!(snap.deployments, 4);
        assert_eq!(snap.deployments_per_week, Some(1.0));

        // The same window fed to the calculators directly agrees.
        let since = window.since();
        let commits = store.list_commits(&repo, since).unwrap();
        assert_eq!(
            ai_ratio::summarize(&commits).ai_ratio,
            snap.ai_ratio
        );
    }

    #[test]
    fn window_excludes_older_events() {
        let store = fixture_store();
        let repo = RepoRef::new("acme", "api");
        // Window starting after the fixture events: everything is empty.
        let window = MetricsWindow::days_ending_at(utc(2024, 7, 1, 0), 7).unwrap();

        let snap = snapshot(&store, &repo, window).unwrap();
        assert_eq!(snap.pr_count, 0);
        assert_eq!(snap.avg_pr_cycle_hours, None);
        assert_eq!(snap.ai_ratio, None);
        assert_eq!(snap.avg_bugs_per_100_commits, None);
        assert_eq!(snap.deployments, 0);
        assert_eq!(snap.deployments_per_week, Some(0.0));
    }

    #[test]
    fn store_failure_aborts_whole_snapshot() {
        let mut store = fixture_store();
        store.fail_issues = true;
        let repo = RepoRef::new("acme", "api");
        let window = MetricsWindow::days_ending_at(utc(2024, 5, 20, 0), 28).unwrap();

        assert!(snapshot(&store, &repo, window).is_err());
    }
}
