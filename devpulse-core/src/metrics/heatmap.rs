//! Commit heatmap: commits per author per week.
//!
//! Author identity falls back from forge login to commit display name to
//! `"unknown"`, so anonymous mailmap noise collapses into one row instead
//! of vanishing. The caller picks the lookback (weeks) at fetch time; the
//! window edge is the raw `now - N weeks` instant, so the oldest week may
//! be partial.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::window::WeekBucket;
use crate::types::Commit;

/// One cell of the heatmap grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub week: WeekBucket,
    pub author: String,
    pub commits: i64,
}

/// Groups commits into (week, author) cells, ordered by week then author.
pub fn commits_by_author(commits: &[Commit]) -> Vec<HeatmapCell> {
    let mut cells: BTreeMap<(WeekBucket, String), i64> = BTreeMap::new();

    for commit in commits {
        let key = (
            WeekBucket::of(commit.committed_at),
            commit.author_identity().to_string(),
        );
        *cells.entry(key).or_insert(0) += 1;
    }

    cells
        .into_iter()
        .map(|((week, author), count)| HeatmapCell {
            week,
            author,
            commits: count,
        })
        .collect()
}
