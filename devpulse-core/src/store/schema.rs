//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- ============================================
    -- Forge facts (one row per upstream object)
    -- ============================================

    CREATE TABLE IF NOT EXISTS repos (
        owner            TEXT NOT NULL,
        name             TEXT NOT NULL,
        default_branch   TEXT,

        PRIMARY KEY (owner, name)
    );

    CREATE TABLE IF NOT EXISTS commits (
        sha              TEXT PRIMARY KEY,
        repo_owner       TEXT NOT NULL,
        repo_name        TEXT NOT NULL,
        author_login     TEXT,
        author_name      TEXT,
        committed_at     DATETIME NOT NULL,
        additions        INTEGER NOT NULL DEFAULT 0,
        deletions        INTEGER NOT NULL DEFAULT 0,
        files_changed    INTEGER NOT NULL DEFAULT 0,
        message          TEXT NOT NULL,
        ai_assisted      INTEGER             -- NULL until classified
    );

    CREATE TABLE IF NOT EXISTS pull_requests (
        repo_owner       TEXT NOT NULL,
        repo_name        TEXT NOT NULL,
        number           INTEGER NOT NULL,
        author_login     TEXT,
        title            TEXT,
        created_at       DATETIME NOT NULL,
        merged_at        DATETIME,
        closed_at        DATETIME,
        state            TEXT,               -- 'open', 'closed'
        additions        INTEGER NOT NULL DEFAULT 0,
        deletions        INTEGER NOT NULL DEFAULT 0,
        changed_files    INTEGER NOT NULL DEFAULT 0,

        PRIMARY KEY (repo_owner, repo_name, number)
    );

    CREATE TABLE IF NOT EXISTS pr_reviews (
        id               INTEGER PRIMARY KEY,
        repo_owner       TEXT NOT NULL,
        repo_name        TEXT NOT NULL,
        pr_number        INTEGER NOT NULL,
        author_login     TEXT,
        state            TEXT,               -- 'APPROVED', 'CHANGES_REQUESTED', ...
        submitted_at     DATETIME            -- NULL while the review is pending
    );

    CREATE TABLE IF NOT EXISTS issues (
        id               INTEGER PRIMARY KEY,
        repo_owner       TEXT NOT NULL,
        repo_name        TEXT NOT NULL,
        number           INTEGER NOT NULL,
        author_login     TEXT,
        title            TEXT,
        created_at       DATETIME NOT NULL,
        closed_at        DATETIME,
        state            TEXT,
        is_bug           INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS deployments (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_owner       TEXT NOT NULL,
        repo_name        TEXT NOT NULL,
        deployed_at      DATETIME NOT NULL,
        environment      TEXT NOT NULL,      -- 'prod' or 'unknown'
        status           TEXT NOT NULL,
        source           TEXT,               -- 'github_actions', 'archive'
        source_id        INTEGER,            -- upstream run id when known

        UNIQUE (repo_owner, repo_name, source_id)
    );

    -- ============================================
    -- Local annotations (never pushed upstream)
    -- ============================================

    CREATE TABLE IF NOT EXISTS annotations (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_owner       TEXT NOT NULL,
        repo_name        TEXT NOT NULL,
        event_at         DATETIME NOT NULL,
        label            TEXT NOT NULL,
        note             TEXT
    );

    -- ============================================
    -- Archive import checkpoints
    -- ============================================

    CREATE TABLE IF NOT EXISTS import_files (
        path             TEXT PRIMARY KEY,
        content_hash     TEXT NOT NULL,
        imported_at      DATETIME NOT NULL,
        records          INTEGER NOT NULL
    );

    -- ============================================
    -- Indexes
    -- ============================================

    CREATE INDEX IF NOT EXISTS idx_commits_repo_time ON commits(repo_owner, repo_name, committed_at);
    CREATE INDEX IF NOT EXISTS idx_prs_repo_created ON pull_requests(repo_owner, repo_name, created_at);
    CREATE INDEX IF NOT EXISTS idx_reviews_repo_pr ON pr_reviews(repo_owner, repo_name, pr_number);
    CREATE INDEX IF NOT EXISTS idx_issues_repo_created ON issues(repo_owner, repo_name, created_at);
    CREATE INDEX IF NOT EXISTS idx_deployments_repo_time ON deployments(repo_owner, repo_name, deployed_at);
    CREATE INDEX IF NOT EXISTS idx_annotations_repo_time ON annotations(repo_owner, repo_name, event_at);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
