//! Review turnaround: PR creation to first review, in hours.
//!
//! The first review of a PR is the earliest review that actually has a
//! submission timestamp. Pending reviews (no timestamp) never count, and a
//! PR nobody reviewed contributes nothing anywhere.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::window::{hours_between, WeekBucket};
use crate::types::{PullRequest, Review};

/// Scalar turnaround rollup over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewTurnaroundSummary {
    /// Mean hours from PR creation to its first review; absent when no PR
    /// in the window has a reviewed first review
    pub avg_first_review_hours: Option<f64>,
    /// PRs that had a first review
    pub reviewed_pr_count: i64,
}

/// One week of the turnaround series, keyed by PR creation week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewTurnaroundWeek {
    pub week: WeekBucket,
    pub avg_first_review_hours: f64,
    /// PRs created this week that got a first review
    pub pr_count: i64,
}

/// Earliest submitted review per PR number.
pub fn first_review_times(reviews: &[Review]) -> HashMap<i64, DateTime<Utc>> {
    let mut first: HashMap<i64, DateTime<Utc>> = HashMap::new();
    for review in reviews {
        if let Some(submitted_at) = review.submitted_at {
            first
                .entry(review.pr_number)
                .and_modify(|t| {
                    if submitted_at < *t {
                        *t = submitted_at;
                    }
                })
                .or_insert(submitted_at);
        }
    }
    first
}

/// Rolls up turnaround over PRs joined with their first reviews.
pub fn summarize(prs: &[PullRequest], reviews: &[Review]) -> ReviewTurnaroundSummary {
    let first = first_review_times(reviews);

    let mut hours = 0.0;
    let mut count = 0i64;
    for pr in prs {
        if let Some(first_at) = first.get(&pr.number) {
            hours += hours_between(pr.created_at, *first_at);
            count += 1;
        }
    }

    ReviewTurnaroundSummary {
        avg_first_review_hours: (count > 0).then(|| hours / count as f64),
        reviewed_pr_count: count,
    }
}

/// Turnaround grouped by creation week, over reviewed PRs only.
pub fn weekly(prs: &[PullRequest], reviews: &[Review]) -> Vec<ReviewTurnaroundWeek> {
    let first = first_review_times(reviews);

    let mut buckets: BTreeMap<WeekBucket, (f64, i64)> = BTreeMap::new();
    for pr in prs {
        if let Some(first_at) = first.get(&pr.number) {
            let entry = buckets
                .entry(WeekBucket::of(pr.created_at))
                .or_insert((0.0, 0));
            entry.0 += hours_between(pr.created_at, *first_at);
            entry.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(week, (hours, count))| ReviewTurnaroundWeek {
            week,
            avg_first_review_hours: hours / count as f64,
            pr_count: count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn pr(number: i64, created: DateTime<Utc>) -> PullRequest {
        PullRequest {
            number,
            author_login: None,
            title: None,
            created_at: created,
            merged_at: None,
            closed_at: None,
            state: Some("open".to_string()),
            additions: 0,
            deletions: 0,
            changed_files: 0,
        }
    }

    fn review(id: i64, pr_number: i64, submitted: Option<DateTime<Utc>>) -> Review {
        Review {
            id,
            pr_number,
            author_login: Some("bob".to_string()),
            state: Some("APPROVED".to_string()),
            submitted_at: submitted,
        }
    }

    #[test]
    fn earliest_submitted_review_wins() {
        let prs = vec![pr(1, utc(2024, 5, 6, 9))];
        let reviews = vec![
            review(10, 1, Some(utc(2024, 5, 6, 14))),
            review(11, 1, Some(utc(2024, 5, 6, 11))),
        ];
        let summary = summarize(&prs, &reviews);
        assert_eq!(summary.avg_first_review_hours, Some(2.0));
        assert_eq!(summary.reviewed_pr_count, 1);
    }

    #[test]
    fn pending_reviews_never_count() {
        let prs = vec![pr(1, utc(2024, 5, 6, 9))];
        let reviews = vec![review(10, 1, None)];
        let summary = summarize(&prs, &reviews);
        assert_eq!(summary.avg_first_review_hours, None);
        assert_eq!(summary.reviewed_pr_count, 0);
    }

    #[test]
    fn unreviewed_prs_are_skipped() {
        let prs = vec![pr(1, utc(2024, 5, 6, 9)), pr(2, utc(2024, 5, 6, 10))];
        let reviews = vec![review(10, 1, Some(utc(2024, 5, 6, 12)))];
        let summary = summarize(&prs, &reviews);
        assert_eq!(summary.avg_first_review_hours, Some(3.0));
        assert_eq!(summary.reviewed_pr_count, 1);
    }

    #[test]
    fn reviews_for_unknown_prs_are_ignored() {
        let prs = vec![pr(1, utc(2024, 5, 6, 9))];
        let reviews = vec![review(10, 99, Some(utc(2024, 5, 6, 12)))];
        let summary = summarize(&prs, &reviews);
        assert_eq!(summary.avg_first_review_hours, None);
    }

    #[test]
    fn weekly_rows_only_cover_reviewed_prs() {
        let prs = vec![
            pr(1, utc(2024, 5, 6, 9)),
            pr(2, utc(2024, 5, 7, 9)),
            pr(3, utc(2024, 5, 14, 9)),
        ];
        let reviews = vec![
            review(10, 1, Some(utc(2024, 5, 6, 11))), // 2h
            review(11, 2, Some(utc(2024, 5, 7, 13))), // 4h
            // PR 3 never reviewed; its week produces no row.
        ];
        let rows = weekly(&prs, &reviews);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].week.to_string(), "2024-05-06");
        assert_eq!(rows[0].avg_first_review_hours, 3.0);
        assert_eq!(rows[0].pr_count, 2);
    }
}
