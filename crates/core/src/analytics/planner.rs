//! Bucket planning: splits a resolved range into labelled time buckets.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::calendar::{self, CalendarSpan};
use super::error::AnalyticsError;
use super::period::{PeriodKind, PeriodSpec};
use super::types::{DateRange, Granularity};

/// Custom ranges up to this long get daily buckets.
const DAILY_LIMIT_DAYS: i64 = 7;

/// Custom ranges up to this long (and longer than a week) get weekly buckets.
const WEEKLY_LIMIT_DAYS: i64 = 30;

/// One labelled sub-interval of a resolved range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// First instant covered (UTC).
    pub start: DateTime<Utc>,
    /// Last instant covered (UTC).
    pub end: DateTime<Utc>,
    /// Display label.
    pub label: String,
    /// Local date of `start`.
    pub first_day: NaiveDate,
    /// Local date of `end`.
    pub last_day: NaiveDate,
}

impl Bucket {
    /// Returns true if `instant` falls inside this bucket, both ends included.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Ordered buckets for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPlan {
    /// Bucket size.
    pub granularity: Granularity,
    /// Buckets, oldest first.
    pub buckets: Vec<Bucket>,
}

impl BucketPlan {
    /// Labels in bucket order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.buckets.iter().map(|b| b.label.clone()).collect()
    }

    /// Number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns true if the plan has no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Range covered from the first bucket's start to the last bucket's end.
    #[must_use]
    pub fn coverage(&self) -> Option<DateRange> {
        match (self.buckets.first(), self.buckets.last()) {
            (Some(first), Some(last)) => Some(DateRange::new(first.start, last.end)),
            _ => None,
        }
    }
}

/// Picks the bucket size for a custom range from its local wall-clock length.
#[must_use]
pub fn custom_granularity(duration: TimeDelta) -> Granularity {
    if duration <= TimeDelta::days(DAILY_LIMIT_DAYS) {
        Granularity::Day
    } else if duration <= TimeDelta::days(WEEKLY_LIMIT_DAYS) {
        Granularity::Week
    } else {
        Granularity::Month
    }
}

/// Plans the buckets for `range`, which must come from resolving `spec` at `now`.
///
/// Labels are derived from each bucket's own local dates, so a label always
/// describes the dates its bucket actually covers.
///
/// # Errors
///
/// Returns `InvariantViolation` if a relative period does not produce its
/// fixed bucket count.
pub fn plan(
    spec: &PeriodSpec,
    range: &DateRange,
    now: &DateTime<Tz>,
) -> Result<BucketPlan, AnalyticsError> {
    let tz = now.timezone();
    let kind = spec.kind();

    let (granularity, spans) = match kind {
        PeriodKind::Today | PeriodKind::Yesterday => {
            let whole = CalendarSpan {
                start: range.start,
                end: range.end,
                first_day: calendar::local_date(range.start, tz),
                last_day: calendar::local_date(range.end, tz),
            };
            (Granularity::Day, vec![whole])
        }
        PeriodKind::Last7Days => (Granularity::Day, calendar::walk(range, Granularity::Day, tz)),
        PeriodKind::Last4Weeks => (
            Granularity::Week,
            calendar::walk(range, Granularity::Week, tz),
        ),
        PeriodKind::Last3Months | PeriodKind::Last6Months | PeriodKind::Last12Months => (
            Granularity::Month,
            calendar::walk(range, Granularity::Month, tz),
        ),
        PeriodKind::Custom => {
            let granularity = custom_granularity(range.local_length(tz));
            (granularity, calendar::walk(range, granularity, tz))
        }
    };

    if let Some(expected) = expected_bucket_count(kind) {
        if spans.len() != expected {
            error!(
                period = %kind,
                expected,
                actual = spans.len(),
                "Relative period produced the wrong number of buckets"
            );
            return Err(AnalyticsError::InvariantViolation(format!(
                "{kind} produced {} buckets, expected {expected}",
                spans.len()
            )));
        }
    }

    let count = spans.len();
    let buckets = spans
        .iter()
        .enumerate()
        .map(|(index, span)| Bucket {
            start: span.start,
            end: span.end,
            label: label_for(kind, granularity, span, count - 1 - index),
            first_day: span.first_day,
            last_day: span.last_day,
        })
        .collect();

    Ok(BucketPlan {
        granularity,
        buckets,
    })
}

fn expected_bucket_count(kind: PeriodKind) -> Option<usize> {
    match kind {
        PeriodKind::Today | PeriodKind::Yesterday => Some(1),
        PeriodKind::Last7Days => Some(7),
        PeriodKind::Last4Weeks => Some(4),
        PeriodKind::Last3Months | PeriodKind::Last6Months | PeriodKind::Last12Months => {
            kind.month_count().and_then(|n| usize::try_from(n).ok())
        }
        PeriodKind::Custom => None,
    }
}

/// `Mon DD – Mon DD`.
#[must_use]
pub fn day_range_label(first: NaiveDate, last: NaiveDate) -> String {
    format!("{} – {}", first.format("%b %d"), last.format("%b %d"))
}

fn label_for(
    kind: PeriodKind,
    granularity: Granularity,
    span: &CalendarSpan,
    from_newest: usize,
) -> String {
    match kind {
        PeriodKind::Today => "Today".to_string(),
        PeriodKind::Yesterday => "Yesterday".to_string(),
        PeriodKind::Last7Days => match from_newest {
            0 => "Today".to_string(),
            1 => "Yesterday".to_string(),
            _ => span.first_day.format("%A").to_string(),
        },
        PeriodKind::Last4Weeks => {
            if from_newest == 0 {
                "Current Week".to_string()
            } else {
                day_range_label(span.first_day, span.last_day)
            }
        }
        PeriodKind::Last3Months
        | PeriodKind::Last6Months
        | PeriodKind::Last12Months
        | PeriodKind::Custom => match granularity {
            Granularity::Day => span.first_day.format("%b %d").to_string(),
            Granularity::Week => day_range_label(span.first_day, span.last_day),
            Granularity::Month => span.first_day.format("%B").to_string(),
        },
    }
}
