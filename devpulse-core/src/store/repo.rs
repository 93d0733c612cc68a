//! Database repository layer
//!
//! Provides insert and query operations for every stored entity and backs
//! the metrics engine through the [`EventStore`] trait.

use crate::error::{Error, Result};
use crate::metrics::EventStore;
use crate::types::{Annotation, Commit, Deployment, Issue, PullRequest, Repo, RepoRef, Review};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Repo registry operations
    // ============================================

    /// Insert or update a tracked repository
    pub fn upsert_repo(&self, repo: &Repo) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO repos (owner, name, default_branch)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(owner, name) DO UPDATE SET
                default_branch = excluded.default_branch
            "#,
            params![repo.repo.owner, repo.repo.name, repo.default_branch],
        )?;
        Ok(())
    }

    /// Get a tracked repository
    pub fn get_repo(&self, repo: &RepoRef) -> Result<Option<Repo>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM repos WHERE owner = ? AND name = ?",
            [&repo.owner, &repo.name],
            Self::row_to_repo,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List all tracked repositories, ordered by owner then name
    pub fn list_repos(&self) -> Result<Vec<Repo>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM repos ORDER BY owner, name")?;

        let repos = stmt
            .query_map([], Self::row_to_repo)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(repos)
    }

    fn row_to_repo(row: &Row) -> rusqlite::Result<Repo> {
        Ok(Repo {
            repo: RepoRef {
                owner: row.get("owner")?,
                name: row.get("name")?,
            },
            default_branch: row.get("default_branch")?,
        })
    }

    // ============================================
    // Commit operations
    // ============================================

    /// Insert or update a commit
    pub fn upsert_commit(&self, repo: &RepoRef, commit: &Commit) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO commits (sha, repo_owner, repo_name, author_login, author_name,
                                 committed_at, additions, deletions, files_changed,
                                 message, ai_assisted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(sha) DO UPDATE SET
                author_login = excluded.author_login,
                author_name = excluded.author_name,
                committed_at = excluded.committed_at,
                additions = excluded.additions,
                deletions = excluded.deletions,
                files_changed = excluded.files_changed,
                message = excluded.message,
                ai_assisted = excluded.ai_assisted
            "#,
            params![
                commit.sha,
                repo.owner,
                repo.name,
                commit.author_login,
                commit.author_name,
                commit.committed_at.to_rfc3339(),
                commit.additions,
                commit.deletions,
                commit.files_changed,
                commit.message,
                commit.ai_assisted,
            ],
        )?;
        Ok(())
    }

    /// Most recent commit timestamp for a repository, if any.
    ///
    /// Live sync uses this as the `since` bound so unchanged history is not
    /// re-fetched.
    pub fn latest_commit_time(&self, repo: &RepoRef) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let newest: Option<String> = conn.query_row(
            "SELECT MAX(committed_at) FROM commits WHERE repo_owner = ? AND repo_name = ?",
            [&repo.owner, &repo.name],
            |r| r.get(0),
        )?;

        Ok(newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    fn row_to_commit(row: &Row) -> rusqlite::Result<Commit> {
        let committed_at_str: String = row.get("committed_at")?;

        Ok(Commit {
            sha: row.get("sha")?,
            author_login: row.get("author_login")?,
            author_name: row.get("author_name")?,
            committed_at: DateTime::parse_from_rfc3339(&committed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            additions: row.get("additions")?,
            deletions: row.get("deletions")?,
            files_changed: row.get("files_changed")?,
            message: row.get("message")?,
            ai_assisted: row.get("ai_assisted")?,
        })
    }

    // ============================================
    // Pull request operations
    // ============================================

    /// Insert or update a pull request
    pub fn upsert_pull_request(&self, repo: &RepoRef, pr: &PullRequest) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO pull_requests (repo_owner, repo_name, number, author_login, title,
                                       created_at, merged_at, closed_at, state,
                                       additions, deletions, changed_files)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(repo_owner, repo_name, number) DO UPDATE SET
                author_login = excluded.author_login,
                title = excluded.title,
                created_at = excluded.created_at,
                merged_at = excluded.merged_at,
                closed_at = excluded.closed_at,
                state = excluded.state,
                additions = excluded.additions,
                deletions = excluded.deletions,
                changed_files = excluded.changed_files
            "#,
            params![
                repo.owner,
                repo.name,
                pr.number,
                pr.author_login,
                pr.title,
                pr.created_at.to_rfc3339(),
                pr.merged_at.map(|t| t.to_rfc3339()),
                pr.closed_at.map(|t| t.to_rfc3339()),
                pr.state,
                pr.additions,
                pr.deletions,
                pr.changed_files,
            ],
        )?;
        Ok(())
    }

    fn row_to_pull_request(row: &Row) -> rusqlite::Result<PullRequest> {
        let created_at_str: String = row.get("created_at")?;
        let merged_at_str: Option<String> = row.get("merged_at")?;
        let closed_at_str: Option<String> = row.get("closed_at")?;

        Ok(PullRequest {
            number: row.get("number")?,
            author_login: row.get("author_login")?,
            title: row.get("title")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            merged_at: merged_at_str
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            closed_at: closed_at_str
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            state: row.get("state")?,
            additions: row.get("additions")?,
            deletions: row.get("deletions")?,
            changed_files: row.get("changed_files")?,
        })
    }

    // ============================================
    // Review operations
    // ============================================

    /// Insert or update a pull request review
    pub fn upsert_review(&self, repo: &RepoRef, review: &Review) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO pr_reviews (id, repo_owner, repo_name, pr_number, author_login,
                                    state, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                author_login = excluded.author_login,
                state = excluded.state,
                submitted_at = excluded.submitted_at
            "#,
            params![
                review.id,
                repo.owner,
                repo.name,
                review.pr_number,
                review.author_login,
                review.state,
                review.submitted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn row_to_review(row: &Row) -> rusqlite::Result<Review> {
        let submitted_at_str: Option<String> = row.get("submitted_at")?;

        Ok(Review {
            id: row.get("id")?,
            pr_number: row.get("pr_number")?,
            author_login: row.get("author_login")?,
            state: row.get("state")?,
            submitted_at: submitted_at_str
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    // ============================================
    // Issue operations
    // ============================================

    /// Insert or update an issue
    pub fn upsert_issue(&self, repo: &RepoRef, issue: &Issue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO issues (id, repo_owner, repo_name, number, author_login, title,
                                created_at, closed_at, state, is_bug)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                created_at = excluded.created_at,
                closed_at = excluded.closed_at,
                state = excluded.state,
                is_bug = excluded.is_bug
            "#,
            params![
                issue.id,
                repo.owner,
                repo.name,
                issue.number,
                issue.author_login,
                issue.title,
                issue.created_at.to_rfc3339(),
                issue.closed_at.map(|t| t.to_rfc3339()),
                issue.state,
                issue.is_bug,
            ],
        )?;
        Ok(())
    }

    fn row_to_issue(row: &Row) -> rusqlite::Result<Issue> {
        let created_at_str: String = row.get("created_at")?;
        let closed_at_str: Option<String> = row.get("closed_at")?;

        Ok(Issue {
            id: row.get("id")?,
            number: row.get("number")?,
            author_login: row.get("author_login")?,
            title: row.get("title")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            closed_at: closed_at_str
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            state: row.get("state")?,
            is_bug: row.get("is_bug")?,
        })
    }

    // ============================================
    // Deployment operations
    // ============================================

    /// Insert or update a deployment.
    ///
    /// Idempotency hangs on `source_id` (the upstream workflow run id).
    /// Rows without one are matched on their full content before insert,
    /// since the UNIQUE constraint treats NULL ids as distinct.
    pub fn upsert_deployment(&self, repo: &RepoRef, dep: &Deployment) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        if dep.source_id.is_some() {
            conn.execute(
                r#"
                INSERT INTO deployments (repo_owner, repo_name, deployed_at, environment,
                                         status, source, source_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(repo_owner, repo_name, source_id) DO UPDATE SET
                    deployed_at = excluded.deployed_at,
                    environment = excluded.environment,
                    status = excluded.status,
                    source = excluded.source
                "#,
                params![
                    repo.owner,
                    repo.name,
                    dep.deployed_at.to_rfc3339(),
                    dep.environment,
                    dep.status,
                    dep.source,
                    dep.source_id,
                ],
            )?;
            return Ok(());
        }

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM deployments
             WHERE repo_owner = ? AND repo_name = ? AND deployed_at = ?
               AND environment = ? AND status = ? AND source_id IS NULL",
            params![
                repo.owner,
                repo.name,
                dep.deployed_at.to_rfc3339(),
                dep.environment,
                dep.status,
            ],
            |r| r.get(0),
        )?;
        if exists > 0 {
            return Ok(());
        }

        conn.execute(
            "INSERT INTO deployments (repo_owner, repo_name, deployed_at, environment,
                                      status, source, source_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            params![
                repo.owner,
                repo.name,
                dep.deployed_at.to_rfc3339(),
                dep.environment,
                dep.status,
                dep.source,
            ],
        )?;
        Ok(())
    }

    fn row_to_deployment(row: &Row) -> rusqlite::Result<Deployment> {
        let deployed_at_str: String = row.get("deployed_at")?;

        Ok(Deployment {
            deployed_at: DateTime::parse_from_rfc3339(&deployed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            environment: row.get("environment")?,
            status: row.get("status")?,
            source: row.get("source")?,
            source_id: row.get("source_id")?,
        })
    }

    // ============================================
    // Annotation operations
    // ============================================

    /// Record an annotation and return it with its assigned id
    pub fn insert_annotation(
        &self,
        repo: &RepoRef,
        event_at: DateTime<Utc>,
        label: &str,
        note: Option<&str>,
    ) -> Result<Annotation> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO annotations (repo_owner, repo_name, event_at, label, note)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![repo.owner, repo.name, event_at.to_rfc3339(), label, note],
        )?;

        Ok(Annotation {
            id: conn.last_insert_rowid(),
            repo: repo.clone(),
            event_at,
            label: label.to_string(),
            note: note.map(String::from),
        })
    }

    /// List annotations, optionally narrowed to one repository, ordered by event time
    pub fn list_annotations(&self, repo: Option<&RepoRef>) -> Result<Vec<Annotation>> {
        let conn = self.conn.lock().unwrap();

        let annotations = match repo {
            Some(repo) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM annotations
                     WHERE repo_owner = ? AND repo_name = ?
                     ORDER BY event_at ASC",
                )?;
                let rows = stmt
                    .query_map([&repo.owner, &repo.name], Self::row_to_annotation)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM annotations ORDER BY event_at ASC")?;
                let rows = stmt
                    .query_map([], Self::row_to_annotation)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(annotations)
    }

    fn row_to_annotation(row: &Row) -> rusqlite::Result<Annotation> {
        let event_at_str: String = row.get("event_at")?;

        Ok(Annotation {
            id: row.get("id")?,
            repo: RepoRef {
                owner: row.get("repo_owner")?,
                name: row.get("repo_name")?,
            },
            event_at: DateTime::parse_from_rfc3339(&event_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            label: row.get("label")?,
            note: row.get("note")?,
        })
    }

    // ============================================
    // Import checkpoint operations
    // ============================================

    /// Content hash recorded for a previously imported file, if any
    pub fn import_checkpoint(&self, path: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT content_hash FROM import_files WHERE path = ?",
            [path],
            |r| r.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    /// Record that a file was imported with the given content hash
    pub fn record_import(&self, path: &str, content_hash: &str, records: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO import_files (path, content_hash, imported_at, records)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(path) DO UPDATE SET
                content_hash = excluded.content_hash,
                imported_at = excluded.imported_at,
                records = excluded.records
            "#,
            params![path, content_hash, Utc::now().to_rfc3339(), records],
        )?;
        Ok(())
    }
}

// ============================================
// EventStore implementation
// ============================================

impl EventStore for Database {
    fn list_commits(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Commit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM commits
             WHERE repo_owner = ? AND repo_name = ? AND committed_at >= ?
             ORDER BY committed_at ASC",
        )?;

        let commits = stmt
            .query_map(
                params![repo.owner, repo.name, since.to_rfc3339()],
                Self::row_to_commit,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(commits)
    }

    fn list_pull_requests(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<PullRequest>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM pull_requests
             WHERE repo_owner = ? AND repo_name = ? AND created_at >= ?
             ORDER BY created_at ASC",
        )?;

        let prs = stmt
            .query_map(
                params![repo.owner, repo.name, since.to_rfc3339()],
                Self::row_to_pull_request,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(prs)
    }

    fn list_reviews(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Review>> {
        // Pending reviews have no submission time; they pass through so the
        // calculators can decide what counts.
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM pr_reviews
             WHERE repo_owner = ? AND repo_name = ?
               AND (submitted_at IS NULL OR submitted_at >= ?)
             ORDER BY submitted_at ASC",
        )?;

        let reviews = stmt
            .query_map(
                params![repo.owner, repo.name, since.to_rfc3339()],
                Self::row_to_review,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(reviews)
    }

    fn list_issues(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Issue>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM issues
             WHERE repo_owner = ? AND repo_name = ? AND created_at >= ?
             ORDER BY created_at ASC",
        )?;

        let issues = stmt
            .query_map(
                params![repo.owner, repo.name, since.to_rfc3339()],
                Self::row_to_issue,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(issues)
    }

    fn list_deployments(&self, repo: &RepoRef, since: DateTime<Utc>) -> Result<Vec<Deployment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM deployments
             WHERE repo_owner = ? AND repo_name = ? AND deployed_at >= ?
             ORDER BY deployed_at ASC",
        )?;

        let deployments = stmt
            .query_map(
                params![repo.owner, repo.name, since.to_rfc3339()],
                Self::row_to_deployment,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(deployments)
    }
}
