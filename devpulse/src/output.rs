//! Text rendering for the query subcommands.
//!
//! JSON output serializes the metric rows directly; everything here is the
//! human-readable `text` format: a short header line and aligned columns.

use devpulse_core::metrics::{
    AiRatioWeek, BugDensityWeek, CycleTimeWeek, DeploymentWeek, HeatmapCell, Insight, KpiSnapshot,
    ReviewTurnaroundWeek,
};
use devpulse_core::types::RepoRef;

/// Optional value, one decimal, "-" when absent
fn fmt_one_decimal(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "-".to_string(),
    }
}

/// Optional ratio as a percentage, "-" when absent
fn fmt_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.0}%", v * 100.0),
        None => "-".to_string(),
    }
}

pub fn print_snapshot(snapshot: &KpiSnapshot) {
    println!(
        "{} over the last {} days:",
        snapshot.repo, snapshot.days
    );
    println!();
    println!(
        "  PR cycle time:       {}h avg over {} PRs",
        fmt_one_decimal(snapshot.avg_pr_cycle_hours),
        snapshot.pr_count
    );
    println!(
        "  Review turnaround:   {}h to first review",
        fmt_one_decimal(snapshot.avg_first_review_hours)
    );
    println!(
        "  AI-assisted commits: {} of {} ({})",
        snapshot.ai_commits,
        snapshot.total_commits,
        fmt_percent(snapshot.ai_ratio)
    );
    println!(
        "  Bug density:         {} bugs per 100 commits",
        fmt_one_decimal(snapshot.avg_bugs_per_100_commits)
    );
    println!(
        "  Deployments:         {} ({}/week)",
        snapshot.deployments,
        fmt_one_decimal(snapshot.deployments_per_week)
    );
}

pub fn print_cycle_series(repo: &RepoRef, rows: &[CycleTimeWeek]) {
    if rows.is_empty() {
        println!("No pull requests recorded for {}.", repo);
        return;
    }

    println!("PR cycle time for {} (by creation week):", repo);
    println!("  {:<12} {:>14} {:>6}", "Week", "Avg cycle (h)", "PRs");
    for row in rows {
        println!(
            "  {:<12} {:>14} {:>6}",
            row.week.to_string(),
            fmt_one_decimal(row.avg_cycle_hours),
            row.pr_count
        );
    }
}

pub fn print_turnaround_series(repo: &RepoRef, rows: &[ReviewTurnaroundWeek]) {
    if rows.is_empty() {
        println!("No reviewed pull requests recorded for {}.", repo);
        return;
    }

    println!("Review turnaround for {} (by creation week):", repo);
    println!("  {:<12} {:>16} {:>6}", "Week", "First review (h)", "PRs");
    for row in rows {
        println!(
            "  {:<12} {:>16.1} {:>6}",
            row.week.to_string(),
            row.avg_first_review_hours,
            row.pr_count
        );
    }
}

pub fn print_ai_series(repo: &RepoRef, rows: &[AiRatioWeek]) {
    if rows.is_empty() {
        println!("No commits recorded for {}.", repo);
        return;
    }

    println!("AI-assisted commit share for {} (by commit week):", repo);
    println!(
        "  {:<12} {:>8} {:>4} {:>7}",
        "Week", "Commits", "AI", "Ratio"
    );
    for row in rows {
        println!(
            "  {:<12} {:>8} {:>4} {:>7}",
            row.week.to_string(),
            row.total_commits,
            row.ai_commits,
            fmt_percent(row.ai_ratio)
        );
    }
}

pub fn print_density_series(repo: &RepoRef, rows: &[BugDensityWeek]) {
    if rows.is_empty() {
        println!("No commits recorded for {}.", repo);
        return;
    }

    println!("Bug density for {} (by commit week):", repo);
    println!(
        "  {:<12} {:>8} {:>6} {:>14}",
        "Week", "Commits", "Bugs", "Bugs/100"
    );
    for row in rows {
        println!(
            "  {:<12} {:>8} {:>6} {:>14}",
            row.week.to_string(),
            row.commits,
            row.bug_issues,
            fmt_one_decimal(row.bugs_per_100_commits)
        );
    }
}

pub fn print_deployment_series(repo: &RepoRef, rows: &[DeploymentWeek]) {
    if rows.is_empty() {
        println!("No deployments recorded for {}.", repo);
        return;
    }

    println!("Deployments for {} (by deploy week):", repo);
    println!("  {:<12} {:>12}", "Week", "Deployments");
    for row in rows {
        println!("  {:<12} {:>12}", row.week.to_string(), row.deployments);
    }
}

pub fn print_insights(repo: &RepoRef, insights: &[Insight]) {
    if insights.is_empty() {
        println!("No insights detected for {}.", repo);
        return;
    }

    println!("Insights for {}:", repo);
    for insight in insights {
        println!(
            "  {}  AI ratio {} with {} bug issue(s)",
            insight.week,
            fmt_percent(Some(insight.ai_ratio)),
            insight.bug_issues
        );
        println!("    {}", insight.insight);
    }
}

pub fn print_heatmap(repo: &RepoRef, weeks: i64, cells: &[HeatmapCell]) {
    if cells.is_empty() {
        println!("No commits recorded for {} in the last {} weeks.", repo, weeks);
        return;
    }

    println!("Commit heatmap for {} (last {} weeks):", repo, weeks);
    println!("  {:<12} {:<24} {:>8}", "Week", "Author", "Commits");
    for cell in cells {
        println!(
            "  {:<12} {:<24} {:>8}",
            cell.week.to_string(),
            cell.author,
            cell.commits
        );
    }
}
