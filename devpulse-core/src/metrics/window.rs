//! Time windows and week buckets.
//!
//! Every KPI request captures "now" exactly once, derives a single lower
//! bound from it, and hands that same [`MetricsWindow`] to each calculator
//! it runs. Bucketed series group timestamps into Monday-aligned UTC weeks;
//! a bucket covers the half-open interval `[start, start + 7d)`.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

// ============================================
// Week buckets
// ============================================

/// One calendar week, identified by its Monday (UTC).
///
/// Ordering and equality follow the week start, so a `BTreeMap` keyed by
/// bucket iterates series in chronological order. Serializes as the week
/// start date (`"2024-05-06"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WeekBucket(NaiveDate);

impl WeekBucket {
    /// Truncates a timestamp to the Monday that starts its UTC week.
    pub fn of(ts: DateTime<Utc>) -> Self {
        let date = ts.date_naive();
        let back = i64::from(date.weekday().num_days_from_monday());
        WeekBucket(date - Duration::days(back))
    }

    /// First instant of the week.
    pub fn start(&self) -> DateTime<Utc> {
        self.0.and_hms_opt(0, 0, 0).unwrap().and_utc()
    }

    /// First instant of the following week (exclusive upper bound).
    pub fn end(&self) -> DateTime<Utc> {
        self.start() + Duration::days(7)
    }

    /// Whether `ts` falls inside this week's half-open interval.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start() <= ts && ts < self.end()
    }
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

// ============================================
// Lookback windows
// ============================================

/// A request-scoped lookback window.
///
/// Constructed once per request so that every KPI sharing the window sees
/// the identical lower bound. Zero or negative lengths are rejected before
/// any data is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsWindow {
    now: DateTime<Utc>,
    since: DateTime<Utc>,
    days: i64,
}

impl MetricsWindow {
    /// Window covering the last `days` days, ending at the current instant.
    pub fn last_days(days: i64) -> Result<Self> {
        Self::days_ending_at(Utc::now(), days)
    }

    /// Window covering the last `weeks` weeks, ending at the current instant.
    pub fn last_weeks(weeks: i64) -> Result<Self> {
        Self::weeks_ending_at(Utc::now(), weeks)
    }

    /// Day window ending at a caller-supplied "now". Tests inject time here.
    pub fn days_ending_at(now: DateTime<Utc>, days: i64) -> Result<Self> {
        if days <= 0 {
            return Err(Error::InvalidWindow(format!(
                "days must be positive, got {}",
                days
            )));
        }
        Ok(Self {
            now,
            since: now - Duration::days(days),
            days,
        })
    }

    /// Week window ending at a caller-supplied "now".
    pub fn weeks_ending_at(now: DateTime<Utc>, weeks: i64) -> Result<Self> {
        if weeks <= 0 {
            return Err(Error::InvalidWindow(format!(
                "weeks must be positive, got {}",
                weeks
            )));
        }
        Ok(Self {
            now,
            since: now - Duration::weeks(weeks),
            days: weeks * 7,
        })
    }

    /// The instant captured at construction.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The shared lower bound (`now - length`).
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Window length in days.
    pub fn days(&self) -> i64 {
        self.days
    }
}

/// Elapsed hours between two instants, from second-resolution difference.
///
/// Negative when `end` precedes `start`; callers decide whether that is
/// meaningful (clock skew in forge data is passed through, not masked).
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}
