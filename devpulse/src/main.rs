//! devpulse - software delivery KPIs from forge history
//!
//! Pulls repository activity from GitHub (or JSONL archives) into a local
//! SQLite store and reports KPI snapshots, weekly series, insights, and a
//! commit heatmap over it.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/devpulse/devpulse.db (~/.local/share/devpulse/devpulse.db)
//! - Logs: $XDG_STATE_HOME/devpulse/devpulse.log (~/.local/state/devpulse/devpulse.log)
//! - Config: $XDG_CONFIG_HOME/devpulse/config.toml (~/.config/devpulse/config.toml)

mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use devpulse_core::ingest::{self, ArchiveImporter, GithubClient};
use devpulse_core::metrics::{
    ai_ratio, all_history, bug_density, cycle_time, deployments, heatmap, insights, overview,
    review_turnaround, EventStore, MetricsWindow,
};
use devpulse_core::types::RepoRef;
use devpulse_core::{Config, Database};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "devpulse")]
#[command(about = "Software delivery KPIs from forge history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull a repository's history from GitHub into the store
    Sync {
        /// Repository owner (user or organization)
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// Fetch commits at or after this RFC 3339 instant instead of
        /// resuming from the newest stored commit
        #[arg(long)]
        since: Option<String>,
    },

    /// Import JSONL event archives from a directory
    Import {
        /// Directory containing *.jsonl archive files
        #[arg(long)]
        dir: PathBuf,
    },

    /// List repositories known to the store
    Repos,

    /// KPI snapshot for one repository over a recent window
    Overview {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Window length in days (default from config)
        #[arg(long)]
        days: Option<i64>,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Weekly KPI series over the whole recorded history
    Series {
        /// Which series to report
        #[arg(value_enum)]
        kind: SeriesKind,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Weeks where AI usage grew while bug volume stayed stable
    Insights {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Commits per author per week
    Heatmap {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Lookback in weeks (default from config)
        #[arg(long)]
        weeks: Option<i64>,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Attach a labelled marker to a repository's timeline
    Annotate {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Instant the marker refers to (RFC 3339)
        #[arg(long)]
        at: String,

        /// Short label, e.g. "rolled out AI review bot"
        #[arg(long)]
        label: String,

        /// Free-form note
        #[arg(long)]
        note: Option<String>,
    },

    /// List timeline annotations, all or for one repository
    Annotations {
        #[arg(long, requires = "repo")]
        owner: Option<String>,

        #[arg(long, requires = "owner")]
        repo: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeriesKind {
    /// Average hours from PR creation to merge or close
    PrCycle,
    /// Average hours from PR creation to first review
    ReviewTurnaround,
    /// Share of commits carrying an AI-assistance marker
    AiRatio,
    /// Bug issues per 100 commits
    BugDensity,
    /// Deployment counts
    Deployments,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        devpulse_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database at XDG-compliant path
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match cli.command {
        Command::Sync { owner, repo, since } => run_sync(&config, &db, owner, repo, since),
        Command::Import { dir } => run_import(db, &dir),
        Command::Repos => run_repos(&db),
        Command::Overview {
            owner,
            repo,
            days,
            format,
        } => run_overview(&config, &db, owner, repo, days, &format),
        Command::Series {
            kind,
            owner,
            repo,
            format,
        } => run_series(&db, kind, owner, repo, &format),
        Command::Insights {
            owner,
            repo,
            format,
        } => run_insights(&db, owner, repo, &format),
        Command::Heatmap {
            owner,
            repo,
            weeks,
            format,
        } => run_heatmap(&config, &db, owner, repo, weeks, &format),
        Command::Annotate {
            owner,
            repo,
            at,
            label,
            note,
        } => run_annotate(&db, owner, repo, &at, &label, note.as_deref()),
        Command::Annotations { owner, repo } => run_annotations(&db, owner, repo),
    }
}

// ============================================
// Ingest commands
// ============================================

fn run_sync(
    config: &Config,
    db: &Database,
    owner: String,
    repo: String,
    since: Option<String>,
) -> Result<()> {
    let repo = RepoRef::new(owner, repo);
    let since = since
        .as_deref()
        .map(parse_rfc3339)
        .transpose()
        .context("invalid --since timestamp")?;

    let client = GithubClient::new(&config.github).context("failed to create GitHub client")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create async runtime")?;

    println!("Syncing {} from GitHub...", repo);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let outcome = runtime
        .block_on(ingest::sync_repo_with_progress(
            &client,
            db,
            &repo,
            since,
            |phase| {
                spinner.set_message(format!("Fetching {}", phase));
            },
        ))
        .context("sync failed")?;

    spinner.finish_and_clear();

    println!("Sync complete:");
    println!("  Commits:       {}", outcome.commits);
    println!("  Pull requests: {}", outcome.pull_requests);
    println!("  Reviews:       {}", outcome.reviews);
    println!("  Issues:        {}", outcome.issues);
    println!("  Deployments:   {}", outcome.deployments);

    Ok(())
}

fn run_import(db: Database, dir: &Path) -> Result<()> {
    let importer = ArchiveImporter::new(db);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let result = importer
        .import_dir_with_progress(dir, |current, total, path| {
            if current == 0 {
                pb.set_length(total as u64);
            }
            pb.set_position(current as u64);
            pb.set_message(
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("...")
                    .to_string(),
            );
        })
        .context("import failed")?;

    pb.finish_and_clear();

    println!("Import complete:");
    println!("  Files processed: {}", result.files_processed);
    println!("  Files skipped:   {}", result.files_skipped);
    println!("  Records:         {}", result.records_inserted);

    if !result.warnings.is_empty() {
        println!("\nWarnings ({}):", result.warnings.len());
        for warning in &result.warnings {
            println!("  {}", warning);
        }
    }

    if !result.errors.is_empty() {
        println!("\nErrors ({}):", result.errors.len());
        for (path, err) in &result.errors {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}

// ============================================
// Query commands
// ============================================

fn run_repos(db: &Database) -> Result<()> {
    let repos = db.list_repos().context("failed to list repositories")?;

    if repos.is_empty() {
        println!("No repositories in the store.");
        println!("Run 'devpulse sync' or 'devpulse import' first.");
        return Ok(());
    }

    for repo in &repos {
        println!(
            "{}  (default branch: {})",
            repo.repo,
            repo.default_branch.as_deref().unwrap_or("unknown")
        );
    }

    Ok(())
}

fn run_overview(
    config: &Config,
    db: &Database,
    owner: String,
    repo: String,
    days: Option<i64>,
    format: &str,
) -> Result<()> {
    let repo = RepoRef::new(owner, repo);
    require_known_repo(db, &repo)?;

    let days = days.unwrap_or(config.metrics.default_window_days);
    let window = MetricsWindow::last_days(days)?;
    let snapshot = overview::snapshot(db, &repo, window).context("failed to compute snapshot")?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        output::print_snapshot(&snapshot);
    }

    Ok(())
}

fn run_series(
    db: &Database,
    kind: SeriesKind,
    owner: String,
    repo: String,
    format: &str,
) -> Result<()> {
    let repo = RepoRef::new(owner, repo);
    require_known_repo(db, &repo)?;
    let since = all_history();

    match kind {
        SeriesKind::PrCycle => {
            let rows = cycle_time::weekly(&db.list_pull_requests(&repo, since)?);
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                output::print_cycle_series(&repo, &rows);
            }
        }
        SeriesKind::ReviewTurnaround => {
            let prs = db.list_pull_requests(&repo, since)?;
            let reviews = db.list_reviews(&repo, since)?;
            let rows = review_turnaround::weekly(&prs, &reviews);
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                output::print_turnaround_series(&repo, &rows);
            }
        }
        SeriesKind::AiRatio => {
            let rows = ai_ratio::weekly(&db.list_commits(&repo, since)?);
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                output::print_ai_series(&repo, &rows);
            }
        }
        SeriesKind::BugDensity => {
            let commits = db.list_commits(&repo, since)?;
            let issues = db.list_issues(&repo, since)?;
            let rows = bug_density::weekly(&commits, &issues);
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                output::print_density_series(&repo, &rows);
            }
        }
        SeriesKind::Deployments => {
            let rows = deployments::weekly(&db.list_deployments(&repo, since)?);
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                output::print_deployment_series(&repo, &rows);
            }
        }
    }

    Ok(())
}

fn run_insights(db: &Database, owner: String, repo: String, format: &str) -> Result<()> {
    let repo = RepoRef::new(owner, repo);
    require_known_repo(db, &repo)?;

    let commits = db.list_commits(&repo, all_history())?;
    let issues = db.list_issues(&repo, all_history())?;
    let found = insights::detect(&commits, &issues);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        output::print_insights(&repo, &found);
    }

    Ok(())
}

fn run_heatmap(
    config: &Config,
    db: &Database,
    owner: String,
    repo: String,
    weeks: Option<i64>,
    format: &str,
) -> Result<()> {
    let repo = RepoRef::new(owner, repo);
    require_known_repo(db, &repo)?;

    let weeks = weeks.unwrap_or(config.metrics.heatmap_weeks);
    let window = MetricsWindow::last_weeks(weeks)?;
    let commits = db.list_commits(&repo, window.since())?;
    let cells = heatmap::commits_by_author(&commits);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&cells)?);
    } else {
        output::print_heatmap(&repo, weeks, &cells);
    }

    Ok(())
}

// ============================================
// Annotation commands
// ============================================

fn run_annotate(
    db: &Database,
    owner: String,
    repo: String,
    at: &str,
    label: &str,
    note: Option<&str>,
) -> Result<()> {
    let repo = RepoRef::new(owner, repo);
    let at = parse_rfc3339(at).context("invalid --at timestamp")?;

    let annotation = db
        .insert_annotation(&repo, at, label, note)
        .context("failed to record annotation")?;

    println!(
        "Recorded annotation #{} on {} at {}: {}",
        annotation.id,
        annotation.repo,
        annotation.event_at.to_rfc3339(),
        annotation.label
    );

    Ok(())
}

fn run_annotations(db: &Database, owner: Option<String>, repo: Option<String>) -> Result<()> {
    // Clap enforces that owner and repo come together.
    let filter = owner
        .zip(repo)
        .map(|(owner, repo)| RepoRef::new(owner, repo));

    let annotations = db
        .list_annotations(filter.as_ref())
        .context("failed to list annotations")?;

    if annotations.is_empty() {
        println!("No annotations recorded.");
        return Ok(());
    }

    for annotation in &annotations {
        let note = annotation
            .note
            .as_deref()
            .map(|n| format!("  ({})", n))
            .unwrap_or_default();
        println!(
            "{}  {}  {}{}",
            annotation.event_at.format("%Y-%m-%d %H:%M"),
            annotation.repo,
            annotation.label,
            note
        );
    }

    Ok(())
}

// ============================================
// Helpers
// ============================================

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("'{}' is not an RFC 3339 timestamp", s))?;
    Ok(parsed.with_timezone(&Utc))
}

/// Bail out when the repository was never ingested, so queries do not
/// report empty metrics for a repo the store has never seen.
fn require_known_repo(db: &Database, repo: &RepoRef) -> Result<()> {
    let known = db
        .get_repo(repo)
        .context("failed to query repository registry")?;
    if known.is_none() {
        anyhow::bail!(
            "repository {} is not in the store; run 'devpulse sync' or 'devpulse import' first",
            repo
        );
    }
    Ok(())
}
