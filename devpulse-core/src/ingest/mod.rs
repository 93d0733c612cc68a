//! Ingestion layer for populating the event store
//!
//! Two paths feed the store:
//!
//! ```text
//! ┌────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  GitHub API    │ ──► │ github::sync_repo│ ──► │    Database     │
//! └────────────────┘     └──────────────────┘     │ (commits, PRs,  │
//! ┌────────────────┐     ┌──────────────────┐     │  issues, ...)   │
//! │ JSONL archives │ ──► │ ArchiveImporter  │ ──► │                 │
//! └────────────────┘     └──────────────────┘     └─────────────────┘
//! ```
//!
//! Both paths are idempotent: live sync upserts on natural keys, and the
//! importer skips files whose content hash matches the recorded checkpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devpulse_core::{Config, Database};
//! use devpulse_core::ingest::ArchiveImporter;
//!
//! let db = Database::open(&Config::database_path())?;
//! db.migrate()?;
//! let importer = ArchiveImporter::new(db);
//! let result = importer.import_dir(Path::new("./archive"))?;
//! println!("Imported {} records", result.records_inserted);
//! ```

pub mod github;

pub use github::{sync_repo, sync_repo_with_progress, GithubClient, SyncOutcome};

use crate::error::{Error, Result};
use crate::store::Database;
use crate::types::{Commit, Deployment, Issue, PullRequest, Repo, RepoRef, Review};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Commit-message markers that classify a commit as AI-assisted when they
/// appear in a `Co-Authored-By:` or `Assisted-By:` trailer.
const AI_ASSISTANT_MARKERS: &[&str] = &[
    "copilot", "claude", "cursor", "aider", "codex", "chatgpt", "devin", "windsurf", "gemini",
];

/// Classify a commit message as AI-assisted.
///
/// Only an explicit `[ai]` tag anywhere, or a trailer line crediting a known
/// assistant, counts. Prose that merely mentions a tool does not. A message
/// with no marker returns `None`, meaning "not classified" rather than
/// "human"; ratios downstream treat that as unassisted without losing the
/// distinction.
pub fn classify_ai_assisted(message: &str) -> Option<bool> {
    let lower = message.to_lowercase();

    if lower.contains("[ai]") || lower.contains("[ai-assisted]") {
        return Some(true);
    }

    for line in lower.lines() {
        let line = line.trim();
        let trailer = line
            .strip_prefix("co-authored-by:")
            .or_else(|| line.strip_prefix("assisted-by:"));
        if let Some(rest) = trailer {
            if AI_ASSISTANT_MARKERS.iter().any(|m| rest.contains(m)) {
                return Some(true);
            }
        }
    }

    None
}

// ============================================
// Archive records
// ============================================

/// One line of an archive file.
///
/// Archives are JSONL: each line is a self-contained record tagged with its
/// kind and the repository it belongs to, so a single file can carry the
/// history of several repositories.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchiveRecord {
    Repo {
        owner: String,
        name: String,
        #[serde(default)]
        default_branch: Option<String>,
    },
    Commit {
        owner: String,
        name: String,
        #[serde(flatten)]
        commit: Commit,
    },
    PullRequest {
        owner: String,
        name: String,
        #[serde(flatten)]
        pull_request: PullRequest,
    },
    Review {
        owner: String,
        name: String,
        #[serde(flatten)]
        review: Review,
    },
    Issue {
        owner: String,
        name: String,
        #[serde(flatten)]
        issue: Issue,
    },
    Deployment {
        owner: String,
        name: String,
        #[serde(flatten)]
        deployment: Deployment,
    },
}

/// Result of importing a directory of archives.
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Number of files imported
    pub files_processed: usize,
    /// Number of files skipped (content hash unchanged)
    pub files_skipped: usize,
    /// Number of records upserted into the store
    pub records_inserted: usize,
    /// Per-line parse problems (file:line: message)
    pub warnings: Vec<String>,
    /// Files that failed outright (path, error message)
    pub errors: Vec<(PathBuf, String)>,
}

/// Result of importing a single file.
#[derive(Debug)]
pub struct FileImportResult {
    /// Records upserted from this file
    pub records: usize,
    /// Per-line parse problems
    pub warnings: Vec<String>,
    /// True when the file's hash matched the checkpoint and nothing was read
    pub skipped: bool,
}

// ============================================
// Archive importer
// ============================================

/// Replays JSONL archive files into the store.
///
/// Files are skipped when their content hash matches the recorded
/// checkpoint, so re-running an import over the same directory only pays
/// for what changed. Malformed lines are reported as warnings and do not
/// abort the file.
pub struct ArchiveImporter {
    db: Database,
}

impl ArchiveImporter {
    /// Create an importer over an opened (and migrated) database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Discover archive files (`*.jsonl`) directly under a directory.
    pub fn discover_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let pattern = dir.join("*.jsonl");
        let pattern_str = pattern.to_string_lossy();

        let entries = glob::glob(&pattern_str).map_err(|e| Error::Archive {
            file: pattern_str.to_string(),
            message: format!("invalid glob pattern: {}", e),
        })?;

        let mut files: Vec<PathBuf> = entries.flatten().collect();
        files.sort();
        Ok(files)
    }

    /// Import every archive file in a directory.
    pub fn import_dir(&self, dir: &Path) -> Result<ImportResult> {
        self.import_dir_with_progress(dir, |_, _, _| {})
    }

    /// Import every archive file in a directory with a progress callback.
    ///
    /// The callback receives `(current_file_index, total_files, file_path)`
    /// before each file is processed.
    pub fn import_dir_with_progress<F>(&self, dir: &Path, mut on_progress: F) -> Result<ImportResult>
    where
        F: FnMut(usize, usize, &Path),
    {
        let files = self.discover_files(dir)?;
        let total = files.len();
        let mut result = ImportResult::default();

        for (i, file) in files.iter().enumerate() {
            on_progress(i, total, file);

            match self.import_file(file) {
                Ok(file_result) => {
                    if file_result.skipped {
                        result.files_skipped += 1;
                        tracing::debug!(path = %file.display(), "Archive unchanged, skipped");
                    } else {
                        result.files_processed += 1;
                        result.records_inserted += file_result.records;
                    }
                    result.warnings.extend(file_result.warnings);
                }
                Err(e) => {
                    result.errors.push((file.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            processed = result.files_processed,
            skipped = result.files_skipped,
            records = result.records_inserted,
            warnings = result.warnings.len(),
            "Archive import complete"
        );

        Ok(result)
    }

    /// Import a single archive file.
    pub fn import_file(&self, path: &Path) -> Result<FileImportResult> {
        let content = std::fs::read_to_string(path)?;
        let hash = content_hash(&content);
        let path_key = path.to_string_lossy();

        if let Some(previous) = self.db.import_checkpoint(&path_key)? {
            if previous == hash {
                return Ok(FileImportResult {
                    records: 0,
                    warnings: vec![],
                    skipped: true,
                });
            }
        }

        let mut records = 0usize;
        let mut warnings = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<ArchiveRecord>(line) {
                Ok(record) => {
                    self.apply(record)?;
                    records += 1;
                }
                Err(e) => {
                    warnings.push(format!("{}:{}: {}", path.display(), line_no + 1, e));
                }
            }
        }

        self.db.record_import(&path_key, &hash, records as i64)?;

        tracing::info!(path = %path.display(), records, "Imported archive file");

        Ok(FileImportResult {
            records,
            warnings,
            skipped: false,
        })
    }

    /// Upsert one record into the store.
    fn apply(&self, record: ArchiveRecord) -> Result<()> {
        match record {
            ArchiveRecord::Repo {
                owner,
                name,
                default_branch,
            } => self.db.upsert_repo(&Repo {
                repo: RepoRef::new(owner, name),
                default_branch,
            }),
            ArchiveRecord::Commit {
                owner,
                name,
                mut commit,
            } => {
                // Archives usually predate classification; fill it in here
                if commit.ai_assisted.is_none() {
                    commit.ai_assisted = classify_ai_assisted(&commit.message);
                }
                self.db.upsert_commit(&RepoRef::new(owner, name), &commit)
            }
            ArchiveRecord::PullRequest {
                owner,
                name,
                pull_request,
            } => self
                .db
                .upsert_pull_request(&RepoRef::new(owner, name), &pull_request),
            ArchiveRecord::Review { owner, name, review } => {
                self.db.upsert_review(&RepoRef::new(owner, name), &review)
            }
            ArchiveRecord::Issue { owner, name, issue } => {
                self.db.upsert_issue(&RepoRef::new(owner, name), &issue)
            }
            ArchiveRecord::Deployment {
                owner,
                name,
                deployment,
            } => self
                .db
                .upsert_deployment(&RepoRef::new(owner, name), &deployment),
        }
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn co_authored_trailer_marks_ai() {
        let message =
            "Tune cache eviction\n\nCo-Authored-By: GitHub Copilot <copilot@github.com>";
        assert_eq!(classify_ai_assisted(message), Some(true));
    }

    #[test]
    fn explicit_tag_marks_ai() {
        assert_eq!(classify_ai_assisted("[ai] tune cache eviction"), Some(true));
    }

    #[test]
    fn plain_message_is_unclassified() {
        assert_eq!(classify_ai_assisted("Fix flaky retry test"), None);
    }

    #[test]
    fn prose_mention_is_not_a_trailer() {
        let message = "Document the copilot rollout plan for Q3";
        assert_eq!(classify_ai_assisted(message), None);
    }

    #[test]
    fn human_co_author_is_unclassified() {
        let message = "Pair on parser\n\nCo-Authored-By: Dana Reyes <dana@example.com>";
        assert_eq!(classify_ai_assisted(message), None);
    }

    #[test]
    fn archive_lines_parse_by_kind() {
        let commit_line = r#"{"kind":"commit","owner":"acme","name":"api","sha":"abc123","committed_at":"2024-05-01T12:00:00Z","message":"fix parser"}"#;
        match serde_json::from_str::<ArchiveRecord>(commit_line).unwrap() {
            ArchiveRecord::Commit { owner, commit, .. } => {
                assert_eq!(owner, "acme");
                assert_eq!(commit.sha, "abc123");
                assert_eq!(commit.additions, 0, "missing counters default to zero");
                assert_eq!(commit.ai_assisted, None);
            }
            other => panic!("expected commit record, got {:?}", other),
        }

        let dep_line = r#"{"kind":"deployment","owner":"acme","name":"api","deployed_at":"2024-05-02T09:00:00Z","environment":"prod","status":"success"}"#;
        match serde_json::from_str::<ArchiveRecord>(dep_line).unwrap() {
            ArchiveRecord::Deployment { deployment, .. } => {
                assert_eq!(deployment.environment, "prod");
                assert_eq!(deployment.source_id, None);
            }
            other => panic!("expected deployment record, got {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_is_an_error_not_a_crash() {
        let line = r#"{"kind":"starfleet_log","owner":"acme","name":"api"}"#;
        assert!(serde_json::from_str::<ArchiveRecord>(line).is_err());
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        // 32 bytes hex-encoded
        assert_eq!(content_hash("abc").len(), 64);
    }
}
