//! Rule-based insights over the joined AI-ratio and bug series.
//!
//! One rule ships today: flag a week whose AI-assistance ratio grew at
//! least 20% over the previous observed week while bug volume stayed flat
//! or fell. "Previous" means the previous week that had commits, not the
//! previous calendar week; weeks without commits are invisible here.

use serde::Serialize;

use crate::metrics::ai_ratio;
use crate::metrics::bug_density;
use crate::metrics::window::WeekBucket;
use crate::types::{Commit, Issue};

/// Message attached to the AI-productivity rule.
pub const AI_PRODUCTIVITY_SIGNAL: &str =
    "AI usage increased ~20% with bug volume stable → potential productivity gain signal";

/// A week where a rule fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub week: WeekBucket,
    pub ai_ratio: f64,
    pub bug_issues: i64,
    pub insight: String,
}

/// Runs the detector over full commit and issue history.
///
/// Only firing weeks are returned, in chronological order. The first
/// observed week can never fire: it has nothing to compare against.
pub fn detect(commits: &[Commit], issues: &[Issue]) -> Vec<Insight> {
    let ai_weeks = ai_ratio::weekly(commits);
    let bug_weeks = bug_density::bug_issues_by_week(issues);

    let mut insights = Vec::new();
    let mut prev: Option<(Option<f64>, i64)> = None;

    for row in &ai_weeks {
        let bug_issues = bug_weeks.get(&row.week).copied().unwrap_or(0);

        if let (Some((Some(prev_ratio), prev_bugs)), Some(cur_ratio)) = (prev, row.ai_ratio) {
            // The >= keeps an exact 1.2x on the firing side of the line.
            if cur_ratio >= prev_ratio * 1.2 && bug_issues <= prev_bugs {
                insights.push(Insight {
                    week: row.week,
                    ai_ratio: cur_ratio,
                    bug_issues,
                    insight: AI_PRODUCTIVITY_SIGNAL.to_string(),
                });
            }
        }

        prev = Some((row.ai_ratio, bug_issues));
    }

    insights
}
