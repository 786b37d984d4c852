//! Local-time calendar arithmetic.
//!
//! Day, week and month boundaries are computed on local dates in the
//! reporting timezone and each boundary is converted to UTC on its own, so
//! 23- and 25-hour days around DST changes come out right. Weeks begin on
//! Sunday.
//!
//! [`walk`] is the single place bucket boundaries come from. Named periods
//! and custom ranges both go through it.

use chrono::{
    DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;
use tracing::error;

use super::types::{DateRange, Granularity};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// One tick: the gap between a bucket's inclusive end and the next bucket's start.
#[must_use]
pub fn tick() -> TimeDelta {
    TimeDelta::nanoseconds(1)
}

/// A local wall-clock time in `tz`, as UTC.
///
/// Ambiguous times (clocks falling back) take the earlier instant. Times
/// inside a DST gap move forward to the first local minute after the gap.
#[must_use]
pub fn local_instant(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    if let Some(local) = tz.from_local_datetime(&naive).earliest() {
        return local.with_timezone(&Utc);
    }

    let minute = naive
        .date()
        .and_hms_opt(naive.hour(), naive.minute(), 0)
        .unwrap_or(naive);
    (1..=MINUTES_PER_DAY)
        .find_map(|step| {
            tz.from_local_datetime(&(minute + TimeDelta::minutes(step)))
                .earliest()
        })
        .map_or_else(
            || Utc.from_utc_datetime(&naive),
            |local| local.with_timezone(&Utc),
        )
}

/// First instant of `date` in `tz`, as UTC.
///
/// When midnight does not exist locally (a DST jump at 00:00), the day
/// starts at the first local instant that does.
#[must_use]
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    local_instant(date.and_time(NaiveTime::MIN), tz)
}

/// Local calendar date of a UTC instant.
#[must_use]
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Sunday on or before `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_sunday()))
}

/// First day of `date`'s month.
#[must_use]
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// Adds (or with a negative count, subtracts) whole calendar months.
///
/// Days past the end of the target month clamp to its last day, so
/// `Mar 31 - 1 month` is `Feb 29` in a leap year.
#[must_use]
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

impl Granularity {
    /// First local date of the unit containing `date`.
    #[must_use]
    pub fn unit_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => week_start(date),
            Self::Month => month_start(date),
        }
    }

    /// First local date of the unit after the one containing `date`.
    #[must_use]
    pub fn next_unit_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date + Days::new(1),
            Self::Week => week_start(date) + Days::new(7),
            Self::Month => add_months(month_start(date), 1),
        }
    }
}

/// A calendar unit clipped to a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSpan {
    /// First instant covered (UTC).
    pub start: DateTime<Utc>,
    /// Last instant covered (UTC).
    pub end: DateTime<Utc>,
    /// Local date of `start`.
    pub first_day: NaiveDate,
    /// Local date of `end`.
    pub last_day: NaiveDate,
}

/// Splits `range` into consecutive calendar units of `granularity`.
///
/// The first span starts at `range.start` and the last ends at `range.end`;
/// every other boundary falls on a local unit boundary. Each span begins one
/// tick after the previous one ends.
#[must_use]
pub fn walk(range: &DateRange, granularity: Granularity, tz: Tz) -> Vec<CalendarSpan> {
    walk_by(range, tz, |day| {
        local_midnight(granularity.next_unit_start(day), tz)
    })
}

/// Walks `range` using `next_start` to find where the unit beginning on a
/// local date ends.
fn walk_by(
    range: &DateRange,
    tz: Tz,
    next_start: impl Fn(NaiveDate) -> DateTime<Utc>,
) -> Vec<CalendarSpan> {
    let mut spans = Vec::new();
    let mut cursor = range.start;

    while cursor <= range.end {
        let first_day = local_date(cursor, tz);
        let next = next_start(first_day);
        if next <= cursor {
            // Only reachable if the timezone database maps two local dates
            // onto the same instant.
            error!(
                %tz,
                cursor = %cursor,
                next = %next,
                range_end = %range.end,
                "Calendar walk stopped before the end of the range"
            );
            break;
        }
        let end = (next - tick()).min(range.end);

        spans.push(CalendarSpan {
            start: cursor,
            end,
            first_day,
            last_day: local_date(end, tz),
        });
        cursor = next;
    }

    spans
}
