//! GitHub REST client and live sync pipeline
//!
//! Pulls commits, pull requests, reviews, issues, and workflow runs for a
//! repository and upserts them into the store. Completed workflow runs
//! stand in for deployments; there is no dedicated deployment API wired up.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use super::classify_ai_assisted;
use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::store::Database;
use crate::types::{Commit, Deployment, Issue, PullRequest, Repo, RepoRef, Review};

/// Page size for list endpoints
const PER_PAGE: usize = 100;

/// Page size for the workflow runs endpoint (heavier payloads)
const RUNS_PER_PAGE: usize = 50;

/// Attempts before giving up on a rate-limited endpoint
const MAX_RATE_LIMIT_RETRIES: usize = 5;

/// Counters for one repository sync.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub commits: usize,
    pub pull_requests: usize,
    pub reviews: usize,
    pub issues: usize,
    pub deployments: usize,
}

// ============================================
// Wire types
// ============================================

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepoInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitItem {
    sha: String,
    commit: ApiCommitInner,
    author: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitInner {
    message: String,
    committer: ApiCommitTimestamp,
    author: Option<ApiCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitTimestamp {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiCommitDetail {
    #[serde(default)]
    stats: Option<ApiCommitStats>,
    #[serde(default)]
    files: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiCommitStats {
    #[serde(default)]
    additions: i64,
    #[serde(default)]
    deletions: i64,
}

#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    number: i64,
    user: Option<ApiUser>,
    title: Option<String>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    state: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiPullRequestDetail {
    #[serde(default)]
    additions: i64,
    #[serde(default)]
    deletions: i64,
    #[serde(default)]
    changed_files: i64,
}

#[derive(Debug, Deserialize)]
struct ApiReview {
    id: i64,
    user: Option<ApiUser>,
    state: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    id: i64,
    number: i64,
    user: Option<ApiUser>,
    title: Option<String>,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    state: Option<String>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    /// Present when this "issue" is really a pull request
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiWorkflowRuns {
    #[serde(default)]
    workflow_runs: Vec<ApiWorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct ApiWorkflowRun {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    updated_at: DateTime<Utc>,
}

// ============================================
// Client
// ============================================

/// HTTP client for the GitHub REST API
pub struct GithubClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    /// Create a client from configuration.
    ///
    /// The token (config file or GITHUB_TOKEN env var) is optional; without
    /// one, requests run under GitHub's anonymous rate limits.
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let base_url = config.api_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("devpulse"));

        if let Some(token) = config.resolved_token() {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid GitHub token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn repo_url(&self, repo: &RepoRef, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.base_url,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            tail
        )
    }

    /// GET a JSON payload, waiting out secondary rate limits.
    ///
    /// GitHub reports those as 403 with a telltale body; anything else
    /// surfaces as an error immediately.
    async fn get_json<T>(&self, url: &str, query: &[(String, String)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut delay = Duration::from_secs(10);

        for attempt in 0..MAX_RATE_LIMIT_RETRIES {
            let response = self
                .http_client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| Error::GitHub(format!("HTTP request failed: {}", e)))?;

            let status = response.status();

            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| Error::GitHub(format!("failed to parse response: {}", e)));
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());

            if status == reqwest::StatusCode::FORBIDDEN
                && body.to_lowercase().contains("rate limit")
                && attempt + 1 < MAX_RATE_LIMIT_RETRIES
            {
                tracing::warn!(
                    attempt = attempt + 1,
                    wait_secs = delay.as_secs(),
                    "GitHub rate limit hit, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(120));
                continue;
            }

            return Err(Error::GitHub(format!("API error ({}): {}", status, body)));
        }

        Err(Error::GitHub("rate limit retries exhausted".to_string()))
    }

    /// Repository metadata (for the default branch).
    pub async fn fetch_repo(&self, repo: &RepoRef) -> Result<Repo> {
        let url = self.repo_url(repo, "");
        let info: ApiRepoInfo = self.get_json(&url, &[]).await?;

        Ok(Repo {
            repo: repo.clone(),
            default_branch: info.default_branch,
        })
    }

    /// All commits, newest pages first from the API, with a per-commit
    /// detail fetch for line stats.
    pub async fn fetch_commits(
        &self,
        repo: &RepoRef,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>> {
        let url = self.repo_url(repo, "/commits");
        let mut commits = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query = vec![
                ("per_page".to_string(), PER_PAGE.to_string()),
                ("page".to_string(), page.to_string()),
            ];
            if let Some(since) = since {
                query.push(("since".to_string(), since.to_rfc3339()));
            }

            let items: Vec<ApiCommitItem> = self.get_json(&url, &query).await?;
            if items.is_empty() {
                break;
            }

            for item in items {
                let detail_url = self.repo_url(repo, &format!("/commits/{}", item.sha));
                let detail: ApiCommitDetail = self.get_json(&detail_url, &[]).await?;
                let stats = detail.stats.unwrap_or_default();

                let message = item.commit.message;
                let ai_assisted = classify_ai_assisted(&message);

                commits.push(Commit {
                    sha: item.sha,
                    author_login: item.author.map(|u| u.login),
                    author_name: item.commit.author.and_then(|a| a.name),
                    committed_at: item.commit.committer.date,
                    additions: stats.additions,
                    deletions: stats.deletions,
                    files_changed: detail.files.map(|f| f.len() as i64).unwrap_or(0),
                    message,
                    ai_assisted,
                });
            }

            page += 1;
        }

        tracing::debug!(repo = %repo, count = commits.len(), "Fetched commits");
        Ok(commits)
    }

    /// All pull requests (any state), each with its reviews and a detail
    /// fetch for size stats.
    pub async fn fetch_pull_requests(
        &self,
        repo: &RepoRef,
    ) -> Result<Vec<(PullRequest, Vec<Review>)>> {
        let url = self.repo_url(repo, "/pulls");
        let mut out = Vec::new();
        let mut page = 1usize;

        loop {
            let query = vec![
                ("per_page".to_string(), PER_PAGE.to_string()),
                ("page".to_string(), page.to_string()),
                ("state".to_string(), "all".to_string()),
            ];

            let items: Vec<ApiPullRequest> = self.get_json(&url, &query).await?;
            if items.is_empty() {
                break;
            }

            for item in items {
                let detail_url = self.repo_url(repo, &format!("/pulls/{}", item.number));
                let detail: ApiPullRequestDetail = self.get_json(&detail_url, &[]).await?;

                let reviews_url = self.repo_url(repo, &format!("/pulls/{}/reviews", item.number));
                let reviews_query = vec![("per_page".to_string(), PER_PAGE.to_string())];
                let api_reviews: Vec<ApiReview> =
                    self.get_json(&reviews_url, &reviews_query).await?;

                let reviews = api_reviews
                    .into_iter()
                    .map(|rv| Review {
                        id: rv.id,
                        pr_number: item.number,
                        author_login: rv.user.map(|u| u.login),
                        state: rv.state,
                        submitted_at: rv.submitted_at,
                    })
                    .collect();

                out.push((
                    PullRequest {
                        number: item.number,
                        author_login: item.user.map(|u| u.login),
                        title: item.title,
                        created_at: item.created_at,
                        merged_at: item.merged_at,
                        closed_at: item.closed_at,
                        state: item.state,
                        additions: detail.additions,
                        deletions: detail.deletions,
                        changed_files: detail.changed_files,
                    },
                    reviews,
                ));
            }

            page += 1;
        }

        tracing::debug!(repo = %repo, count = out.len(), "Fetched pull requests");
        Ok(out)
    }

    /// All issues (any state). GitHub mixes pull requests into this
    /// endpoint; those are dropped here.
    pub async fn fetch_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>> {
        let url = self.repo_url(repo, "/issues");
        let mut issues = Vec::new();
        let mut page = 1usize;

        loop {
            let query = vec![
                ("per_page".to_string(), PER_PAGE.to_string()),
                ("page".to_string(), page.to_string()),
                ("state".to_string(), "all".to_string()),
            ];

            let items: Vec<ApiIssue> = self.get_json(&url, &query).await?;
            if items.is_empty() {
                break;
            }

            issues.extend(items.into_iter().filter_map(issue_from_api));
            page += 1;
        }

        tracing::debug!(repo = %repo, count = issues.len(), "Fetched issues");
        Ok(issues)
    }

    /// Completed workflow runs mapped to deployment events.
    pub async fn fetch_workflow_deployments(&self, repo: &RepoRef) -> Result<Vec<Deployment>> {
        let url = self.repo_url(repo, "/actions/runs");
        let mut deployments = Vec::new();
        let mut page = 1usize;

        loop {
            let query = vec![
                ("per_page".to_string(), RUNS_PER_PAGE.to_string()),
                ("page".to_string(), page.to_string()),
            ];

            let body: ApiWorkflowRuns = self.get_json(&url, &query).await?;
            if body.workflow_runs.is_empty() {
                break;
            }

            deployments.extend(body.workflow_runs.into_iter().filter_map(deployment_from_run));
            page += 1;
        }

        tracing::debug!(repo = %repo, count = deployments.len(), "Fetched workflow deployments");
        Ok(deployments)
    }
}

/// Convert an issue payload, dropping the pull request shadows GitHub
/// mixes into the issues endpoint.
fn issue_from_api(item: ApiIssue) -> Option<Issue> {
    if item.pull_request.is_some() {
        return None;
    }

    let is_bug = item
        .labels
        .iter()
        .any(|l| l.name.to_lowercase().contains("bug"));

    Some(Issue {
        id: item.id,
        number: item.number,
        author_login: item.user.map(|u| u.login),
        title: item.title,
        created_at: item.created_at,
        closed_at: item.closed_at,
        state: item.state,
        is_bug,
    })
}

/// Convert a workflow run into a deployment event, if it counts as one.
///
/// Only completed runs count. A run whose workflow name mentions "prod" or
/// "deploy" lands in the "prod" environment; everything else is "unknown".
fn deployment_from_run(run: ApiWorkflowRun) -> Option<Deployment> {
    if run.status.as_deref() != Some("completed") {
        return None;
    }

    let name = run.name.unwrap_or_default().to_lowercase();
    let environment = if name.contains("prod") || name.contains("deploy") {
        "prod"
    } else {
        "unknown"
    };

    Some(Deployment {
        deployed_at: run.updated_at,
        environment: environment.to_string(),
        status: run.conclusion.unwrap_or_else(|| "unknown".to_string()),
        source: Some("github_actions".to_string()),
        source_id: Some(run.id),
    })
}

// ============================================
// Sync pipeline
// ============================================

/// Pull one repository's history into the store.
///
/// `since` bounds the commit fetch; when absent, the newest stored commit
/// time is used so re-syncs only pay for new history.
pub async fn sync_repo(
    client: &GithubClient,
    db: &Database,
    repo: &RepoRef,
    since: Option<DateTime<Utc>>,
) -> Result<SyncOutcome> {
    sync_repo_with_progress(client, db, repo, since, |_| {}).await
}

/// Pull one repository's history into the store, reporting each phase.
///
/// The callback receives a short label ("commits", "issues", ...) before
/// the corresponding fetch starts, for progress display.
pub async fn sync_repo_with_progress<F>(
    client: &GithubClient,
    db: &Database,
    repo: &RepoRef,
    since: Option<DateTime<Utc>>,
    mut on_phase: F,
) -> Result<SyncOutcome>
where
    F: FnMut(&str),
{
    let mut outcome = SyncOutcome::default();

    on_phase("repository metadata");
    let meta = client.fetch_repo(repo).await?;
    db.upsert_repo(&meta)?;

    on_phase("commits");
    let since = match since {
        Some(explicit) => Some(explicit),
        None => db.latest_commit_time(repo)?,
    };
    let commits = client.fetch_commits(repo, since).await?;
    for commit in &commits {
        db.upsert_commit(repo, commit)?;
    }
    outcome.commits = commits.len();

    on_phase("pull requests");
    let prs = client.fetch_pull_requests(repo).await?;
    for (pr, reviews) in &prs {
        db.upsert_pull_request(repo, pr)?;
        for review in reviews {
            db.upsert_review(repo, review)?;
        }
        outcome.reviews += reviews.len();
    }
    outcome.pull_requests = prs.len();

    on_phase("issues");
    let issues = client.fetch_issues(repo).await?;
    for issue in &issues {
        db.upsert_issue(repo, issue)?;
    }
    outcome.issues = issues.len();

    on_phase("deployments");
    let deployments = client.fetch_workflow_deployments(repo).await?;
    for deployment in &deployments {
        db.upsert_deployment(repo, deployment)?;
    }
    outcome.deployments = deployments.len();

    tracing::info!(
        repo = %repo,
        commits = outcome.commits,
        pull_requests = outcome.pull_requests,
        reviews = outcome.reviews,
        issues = outcome.issues,
        deployments = outcome.deployments,
        "Sync complete"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_default_config() {
        let config = GithubConfig::default();
        assert!(GithubClient::new(&config).is_ok());
    }

    #[test]
    fn test_deployment_requires_completion() {
        let run: ApiWorkflowRun = serde_json::from_str(
            r#"{"id": 11, "name": "Deploy", "status": "in_progress",
                "conclusion": null, "updated_at": "2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(deployment_from_run(run).is_none());
    }

    #[test]
    fn test_deployment_environment_rule() {
        let deploy: ApiWorkflowRun = serde_json::from_str(
            r#"{"id": 12, "name": "Deploy to Production", "status": "completed",
                "conclusion": "success", "updated_at": "2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        let dep = deployment_from_run(deploy).unwrap();
        assert_eq!(dep.environment, "prod");
        assert_eq!(dep.status, "success");
        assert_eq!(dep.source_id, Some(12));

        let ci: ApiWorkflowRun = serde_json::from_str(
            r#"{"id": 13, "name": "CI", "status": "completed",
                "conclusion": null, "updated_at": "2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        let dep = deployment_from_run(ci).unwrap();
        assert_eq!(dep.environment, "unknown");
        assert_eq!(dep.status, "unknown", "missing conclusion maps to unknown");
    }

    #[test]
    fn test_pr_shadow_issues_are_dropped() {
        let shadow: ApiIssue = serde_json::from_str(
            r#"{"id": 1, "number": 5, "user": {"login": "alice"}, "title": "Add widget",
                "created_at": "2024-05-01T09:00:00Z", "closed_at": null, "state": "open",
                "labels": [], "pull_request": {"url": "https://example.invalid/pulls/5"}}"#,
        )
        .unwrap();
        assert!(issue_from_api(shadow).is_none());
    }

    #[test]
    fn test_bug_label_detection() {
        let payload = r#"{"id": 2, "number": 6, "user": null, "title": "Crash on resize",
            "created_at": "2024-05-01T09:00:00Z", "closed_at": null, "state": "open",
            "labels": [{"name": "Bugfix"}, {"name": "p1"}]}"#;
        let issue = issue_from_api(serde_json::from_str(payload).unwrap()).unwrap();
        assert!(issue.is_bug, "label match is substring, case-insensitive");
        assert_eq!(issue.author_login, None);

        let payload = r#"{"id": 3, "number": 7, "user": null, "title": "Dark mode",
            "created_at": "2024-05-01T09:00:00Z", "closed_at": null, "state": "open",
            "labels": [{"name": "feature"}]}"#;
        let issue = issue_from_api(serde_json::from_str(payload).unwrap()).unwrap();
        assert!(!issue.is_bug);
    }
}
