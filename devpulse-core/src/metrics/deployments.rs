//! Deployment frequency: raw counts and a per-week rate.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::window::WeekBucket;
use crate::types::Deployment;

/// Scalar deployment rollup over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentSummary {
    pub deployments: i64,
    /// `deployments * 7 / window_days`; absent for a zero-day window
    pub deployments_per_week: Option<f64>,
}

/// One week of the deployment series, keyed by deploy week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentWeek {
    pub week: WeekBucket,
    pub deployments: i64,
}

/// Rolls up deployment frequency over one window of `window_days` days.
///
/// Window constructors already reject non-positive lengths; the zero guard
/// here keeps the arithmetic safe no matter how the value arrived.
pub fn summarize(deployments: &[Deployment], window_days: i64) -> DeploymentSummary {
    let count = deployments.len() as i64;
    DeploymentSummary {
        deployments: count,
        deployments_per_week: (window_days != 0)
            .then(|| count as f64 * 7.0 / window_days as f64),
    }
}

/// Deployments grouped by deploy week.
pub fn weekly(deployments: &[Deployment]) -> Vec<DeploymentWeek> {
    let mut buckets: BTreeMap<WeekBucket, i64> = BTreeMap::new();
    for deployment in deployments {
        *buckets
            .entry(WeekBucket::of(deployment.deployed_at))
            .or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(week, count)| DeploymentWeek {
            week,
            deployments: count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn deploy(at: DateTime<Utc>) -> Deployment {
        Deployment {
            deployed_at: at,
            environment: "prod".to_string(),
            status: "success".to_string(),
            source: Some("github_actions".to_string()),
            source_id: None,
        }
    }

    fn utc(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn rate_scales_count_to_weeks() {
        let deploys: Vec<Deployment> = (0..8).map(|i| deploy(utc(2024, 5, 1 + i))).collect();
        let summary = summarize(&deploys, 28);
        assert_eq!(summary.deployments, 8);
        assert_eq!(summary.deployments_per_week, Some(2.0));
    }

    #[test]
    fn zero_day_window_yields_absent_rate() {
        let summary = summarize(&[deploy(utc(2024, 5, 1))], 0);
        assert_eq!(summary.deployments, 1);
        assert_eq!(summary.deployments_per_week, None);
    }

    #[test]
    fn empty_window_is_zero_not_absent() {
        let summary = summarize(&[], 30);
        assert_eq!(summary.deployments, 0);
        assert_eq!(summary.deployments_per_week, Some(0.0));
    }

    #[test]
    fn weekly_groups_by_deploy_week() {
        let deploys = vec![
            deploy(utc(2024, 5, 6)),
            deploy(utc(2024, 5, 9)),
            deploy(utc(2024, 5, 15)),
        ];
        let rows = weekly(&deploys);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].week.to_string(), "2024-05-06");
        assert_eq!(rows[0].deployments, 2);
        assert_eq!(rows[1].week.to_string(), "2024-05-13");
        assert_eq!(rows[1].deployments, 1);
    }
}
