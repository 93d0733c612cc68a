//! PR cycle time: creation to resolution, in hours.
//!
//! A pull request resolves at `merged_at`, or `closed_at` when it was never
//! merged. Open PRs contribute to counts but never to averages.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::window::{hours_between, WeekBucket};
use crate::types::PullRequest;

/// Scalar cycle-time rollup over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTimeSummary {
    /// Mean hours from creation to resolution; absent when nothing resolved
    pub avg_cycle_hours: Option<f64>,
    /// Every PR in the window, resolved or not
    pub pr_count: i64,
}

/// One week of the cycle-time series, keyed by PR creation week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTimeWeek {
    pub week: WeekBucket,
    /// Absent when the week has PRs but none resolved yet
    pub avg_cycle_hours: Option<f64>,
    pub pr_count: i64,
}

/// Rolls up cycle time over every PR in the slice.
pub fn summarize(prs: &[PullRequest]) -> CycleTimeSummary {
    let mut resolved_hours = 0.0;
    let mut resolved_count = 0i64;

    for pr in prs {
        if let Some(resolved_at) = pr.resolved_at() {
            resolved_hours += hours_between(pr.created_at, resolved_at);
            resolved_count += 1;
        }
    }

    CycleTimeSummary {
        avg_cycle_hours: (resolved_count > 0).then(|| resolved_hours / resolved_count as f64),
        pr_count: prs.len() as i64,
    }
}

/// Cycle time grouped by creation week, one row per week with any PR.
pub fn weekly(prs: &[PullRequest]) -> Vec<CycleTimeWeek> {
    // (resolved hour sum, resolved count, total count) per bucket
    let mut buckets: BTreeMap<WeekBucket, (f64, i64, i64)> = BTreeMap::new();

    for pr in prs {
        let entry = buckets
            .entry(WeekBucket::of(pr.created_at))
            .or_insert((0.0, 0, 0));
        if let Some(resolved_at) = pr.resolved_at() {
            entry.0 += hours_between(pr.created_at, resolved_at);
            entry.1 += 1;
        }
        entry.2 += 1;
    }

    buckets
        .into_iter()
        .map(|(week, (hours, resolved, total))| CycleTimeWeek {
            week,
            avg_cycle_hours: (resolved > 0).then(|| hours / resolved as f64),
            pr_count: total,
        })
        .collect()
}
