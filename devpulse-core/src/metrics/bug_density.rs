//! Bug density: bug issues per 100 commits, weekly.
//!
//! Commit weeks are authoritative: a week appears iff it has commits, and
//! bug counts are left-joined onto it (missing means zero). A week with bug
//! issues but no commits produces no row at all; density over zero work is
//! considered meaningless rather than infinite.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::window::WeekBucket;
use crate::types::{Commit, Issue};

/// One week of the bug-density series, keyed by commit week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BugDensityWeek {
    pub week: WeekBucket,
    pub commits: i64,
    /// Bug issues opened this week; zero when none were filed
    pub bug_issues: i64,
    /// `bug_issues / commits * 100`; guarded against a zero denominator
    pub bugs_per_100_commits: Option<f64>,
}

/// Bug issues opened per week, over issues labelled as bugs.
pub fn bug_issues_by_week(issues: &[Issue]) -> BTreeMap<WeekBucket, i64> {
    let mut buckets: BTreeMap<WeekBucket, i64> = BTreeMap::new();
    for issue in issues.iter().filter(|i| i.is_bug) {
        *buckets.entry(WeekBucket::of(issue.created_at)).or_insert(0) += 1;
    }
    buckets
}

/// Weekly density rows: commit weeks left-joined with bug counts.
pub fn weekly(commits: &[Commit], issues: &[Issue]) -> Vec<BugDensityWeek> {
    let mut commit_weeks: BTreeMap<WeekBucket, i64> = BTreeMap::new();
    for commit in commits {
        *commit_weeks
            .entry(WeekBucket::of(commit.committed_at))
            .or_insert(0) += 1;
    }

    let bug_weeks = bug_issues_by_week(issues);

    commit_weeks
        .into_iter()
        .map(|(week, commit_count)| {
            let bug_count = bug_weeks.get(&week).copied().unwrap_or(0);
            BugDensityWeek {
                week,
                commits: commit_count,
                bug_issues: bug_count,
                bugs_per_100_commits: (commit_count > 0)
                    .then(|| bug_count as f64 / commit_count as f64 * 100.0),
            }
        })
        .collect()
}

/// Mean of the per-week ratios, not the pooled global ratio.
///
/// A low-activity noisy week weighs as much as a high-activity calm one.
pub fn average_per_100(rows: &[BugDensityWeek]) -> Option<f64> {
    let ratios: Vec<f64> = rows.iter().filter_map(|r| r.bugs_per_100_commits).collect();
    if ratios.is_empty() {
        return None;
    }
    Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
}
