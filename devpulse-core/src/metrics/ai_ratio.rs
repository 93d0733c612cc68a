//! AI-assistance ratio: share of commits flagged AI-assisted.
//!
//! The flag is nullable at the source; an unclassified commit counts as not
//! assisted. The ratio is absent (not zero, not NaN) when there are no
//! commits at all.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::window::WeekBucket;
use crate::types::Commit;

/// Scalar AI-assistance rollup over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiRatioSummary {
    pub total_commits: i64,
    pub ai_commits: i64,
    /// `ai_commits / total_commits`; absent when there are no commits
    pub ai_ratio: Option<f64>,
}

/// One week of the AI-assistance series, keyed by commit week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiRatioWeek {
    pub week: WeekBucket,
    pub total_commits: i64,
    pub ai_commits: i64,
    pub ai_ratio: Option<f64>,
}

fn ratio(ai: i64, total: i64) -> Option<f64> {
    (total > 0).then(|| ai as f64 / total as f64)
}

/// Rolls up the AI-assistance ratio over every commit in the slice.
pub fn summarize(commits: &[Commit]) -> AiRatioSummary {
    let total = commits.len() as i64;
    let ai = commits.iter().filter(|c| c.is_ai_assisted()).count() as i64;

    AiRatioSummary {
        total_commits: total,
        ai_commits: ai,
        ai_ratio: ratio(ai, total),
    }
}

/// AI-assistance ratio grouped by commit week.
pub fn weekly(commits: &[Commit]) -> Vec<AiRatioWeek> {
    // (ai, total) per bucket
    let mut buckets: BTreeMap<WeekBucket, (i64, i64)> = BTreeMap::new();

    for commit in commits {
        let entry = buckets
            .entry(WeekBucket::of(commit.committed_at))
            .or_insert((0, 0));
        if commit.is_ai_assisted() {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(week, (ai, total))| AiRatioWeek {
            week,
            total_commits: total,
            ai_commits: ai,
            ai_ratio: ratio(ai, total),
        })
        .collect()
}
