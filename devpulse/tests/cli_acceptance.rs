use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use devpulse_core::Database;
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    archive_dir: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let archive_dir = base.join("archive");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");
        fs::create_dir_all(&archive_dir).expect("failed to create archive dir");

        seed_archive_fixtures(&archive_dir);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            archive_dir,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("devpulse/devpulse.db")
    }

    fn archive_arg(&self) -> String {
        self.archive_dir.to_string_lossy().into_owned()
    }
}

fn seed_archive_fixtures(archive_dir: &Path) {
    let source_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../devpulse-core/tests/fixtures/archive/history");

    for name in ["acme-api.jsonl", "acme-cli.jsonl"] {
        fs::copy(source_dir.join(name), archive_dir.join(name))
            .unwrap_or_else(|e| panic!("failed to copy fixture {name}: {e}"));
    }
}

fn run_devpulse(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("devpulse"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute devpulse: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "devpulse {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

/// Import the seeded archive, panicking unless it succeeds.
fn import_archive(env: &CliTestEnv) -> String {
    let archive = env.archive_arg();
    let args = ["import", "--dir", archive.as_str()];
    let output = run_devpulse(env, &args);
    assert_success(&args, &output);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// A window long enough to reach the 2024 fixture events from any test run.
const WIDE_DAYS: &str = "36500";
const WIDE_WEEKS: &str = "5200";

#[test]
fn import_populates_database_and_reports_counts() {
    let env = CliTestEnv::new();

    let stdout = import_archive(&env);
    assert!(stdout.contains("Import complete:"));
    assert!(
        stdout.contains("Files processed: 2"),
        "expected both fixture files processed, got:\n{stdout}"
    );
    assert!(stdout.contains("Records:         26"));

    let db_path = env.db_path();
    assert!(
        db_path.exists(),
        "database file should exist at {}",
        db_path.display()
    );

    let db = Database::open(&db_path).expect("failed to open db");
    let repos = db.list_repos().expect("failed to list repos");
    assert_eq!(repos.len(), 2, "expected both fixture repos registered");

    // A second import over the same archive changes nothing.
    let stdout = import_archive(&env);
    assert!(stdout.contains("Files skipped:   2"));
    assert!(stdout.contains("Records:         0"));
}

#[test]
fn repos_lists_the_registry() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = ["repos"];
    let output = run_devpulse(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("acme/api"));
    assert!(stdout.contains("acme/cli  (default branch: trunk)"));
}

#[test]
fn overview_reports_the_kpi_snapshot() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = [
        "overview", "--owner", "acme", "--repo", "api", "--days", WIDE_DAYS,
    ];
    let output = run_devpulse(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("acme/api over the last 36500 days:"));
    assert!(
        stdout.contains("30.0h avg over 3 PRs"),
        "expected cycle time line, got:\n{stdout}"
    );
    assert!(stdout.contains("5.0h to first review"));
    assert!(stdout.contains("4 of 9 (44%)"));
    assert!(stdout.contains("22.5 bugs per 100 commits"));
}

#[test]
fn overview_json_uses_the_api_field_names() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = [
        "overview", "--owner", "acme", "--repo", "api", "--days", WIDE_DAYS, "--format", "json",
    ];
    let output = run_devpulse(&env, &args);
    assert_success(&args, &output);

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");

    assert_eq!(parsed["repo"]["owner"], "acme");
    assert_eq!(parsed["avg_pr_cycle_hours"], 30.0);
    assert_eq!(parsed["pr_count"], 3);
    assert_eq!(parsed["avg_first_review_hours"], 5.0);
    assert_eq!(parsed["total_commits"], 9);
    assert_eq!(parsed["ai_commits"], 4);
    assert_eq!(parsed["avg_bugs_per_100_commits"], 22.5);
    assert_eq!(parsed["deployments"], 3);
}

#[test]
fn series_json_reports_weekly_rows() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = [
        "series", "pr-cycle", "--owner", "acme", "--repo", "api", "--format", "json",
    ];
    let output = run_devpulse(&env, &args);
    assert_success(&args, &output);

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    let rows = parsed.as_array().expect("series output should be an array");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["week"], "2024-05-06");
    assert_eq!(rows[0]["avg_cycle_hours"], 24.0);
    assert_eq!(rows[0]["pr_count"], 1);
    assert_eq!(rows[1]["week"], "2024-05-13");
    assert_eq!(rows[1]["avg_cycle_hours"], 36.0);
}

#[test]
fn insights_flags_the_ai_growth_week() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = ["insights", "--owner", "acme", "--repo", "api"];
    let output = run_devpulse(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("2024-05-13"),
        "expected the firing week in stdout, got:\n{stdout}"
    );
    assert!(stdout.contains("potential productivity gain signal"));
}

#[test]
fn heatmap_groups_commits_by_author() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = [
        "heatmap", "--owner", "acme", "--repo", "api", "--weeks", WIDE_WEEKS,
    ];
    let output = run_devpulse(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("alice"));
    assert!(stdout.contains("bob"));
    // Commit with no login falls back to the display name.
    assert!(stdout.contains("Carol C"));
}

#[test]
fn annotate_then_list_round_trips() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = [
        "annotate",
        "--owner",
        "acme",
        "--repo",
        "api",
        "--at",
        "2024-05-13T09:00:00Z",
        "--label",
        "AI review bot rollout",
        "--note",
        "enabled org-wide",
    ];
    let output = run_devpulse(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Recorded annotation #1 on acme/api"));

    let list_args = ["annotations", "--owner", "acme", "--repo", "api"];
    let output = run_devpulse(&env, &list_args);
    assert_success(&list_args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2024-05-13 09:00"));
    assert!(stdout.contains("AI review bot rollout"));
    assert!(stdout.contains("(enabled org-wide)"));

    // The unfiltered listing shows it too.
    let all_args = ["annotations"];
    let output = run_devpulse(&env, &all_args);
    assert_success(&all_args, &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("AI review bot rollout"));
}

#[test]
fn unknown_repository_is_a_hard_error() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = ["overview", "--owner", "acme", "--repo", "ghost"];
    let output = run_devpulse(&env, &args);

    assert!(
        !output.status.success(),
        "overview of an unknown repo should fail"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("not in the store"),
        "expected a helpful message, got:\n{stderr}"
    );
}

#[test]
fn invalid_window_is_rejected() {
    let env = CliTestEnv::new();
    import_archive(&env);

    let args = ["overview", "--owner", "acme", "--repo", "api", "--days", "0"];
    let output = run_devpulse(&env, &args);

    assert!(!output.status.success(), "a zero-day window should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid window"),
        "expected the window error, got:\n{stderr}"
    );
}
