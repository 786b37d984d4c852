//! Reporting periods and their resolution into concrete UTC ranges.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::calendar::{add_months, local_midnight, month_start, tick, week_start};
use super::error::AnalyticsError;
use super::types::DateRange;

/// Period keyword, without any custom dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    /// From local midnight until now.
    Today,
    /// The whole previous local day.
    Yesterday,
    /// Seven local days ending today.
    #[serde(rename = "last_7_days")]
    Last7Days,
    /// Four Sunday to Saturday weeks ending with the current week.
    #[serde(rename = "last_4_weeks")]
    Last4Weeks,
    /// Three calendar months ending with the current month.
    #[serde(rename = "last_3_months")]
    Last3Months,
    /// Six calendar months ending with the current month.
    #[serde(rename = "last_6_months")]
    Last6Months,
    /// Twelve calendar months ending with the current month.
    #[serde(rename = "last_12_months")]
    Last12Months,
    /// Caller-supplied range.
    Custom,
}

impl PeriodKind {
    /// Every keyword, in the order a period picker lists them.
    pub const ALL: [Self; 8] = [
        Self::Today,
        Self::Yesterday,
        Self::Last7Days,
        Self::Last4Weeks,
        Self::Last3Months,
        Self::Last6Months,
        Self::Last12Months,
        Self::Custom,
    ];

    /// Canonical keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7Days => "last_7_days",
            Self::Last4Weeks => "last_4_weeks",
            Self::Last3Months => "last_3_months",
            Self::Last6Months => "last_6_months",
            Self::Last12Months => "last_12_months",
            Self::Custom => "custom",
        }
    }

    /// Number of monthly buckets for the month-based keywords.
    #[must_use]
    pub const fn month_count(self) -> Option<u32> {
        match self {
            Self::Last3Months => Some(3),
            Self::Last6Months => Some(6),
            Self::Last12Months => Some(12),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = AnalyticsError;

    /// Parses a keyword case-insensitively. The older run-together spellings
    /// (`thelastsevendays` and friends) are still accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "last_7_days" | "thelastsevendays" => Ok(Self::Last7Days),
            "last_4_weeks" | "thelastfourweeks" => Ok(Self::Last4Weeks),
            "last_3_months" | "thelastthreemonths" => Ok(Self::Last3Months),
            "last_6_months" | "thelastsixmonths" => Ok(Self::Last6Months),
            "last_12_months" | "thelasttwelvemonths" => Ok(Self::Last12Months),
            "custom" => Ok(Self::Custom),
            _ => Err(AnalyticsError::InvalidPeriod(s.to_string())),
        }
    }
}

/// A reporting period: a relative keyword or an explicit custom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSpec {
    /// From local midnight until now.
    Today,
    /// The whole previous local day.
    Yesterday,
    /// Seven local days ending today.
    Last7Days,
    /// Four Sunday to Saturday weeks ending with the current week.
    Last4Weeks,
    /// Three calendar months ending with the current month.
    Last3Months,
    /// Six calendar months ending with the current month.
    Last6Months,
    /// Twelve calendar months ending with the current month.
    Last12Months,
    /// Caller-supplied inclusive range, normalized to UTC.
    Custom {
        /// First instant.
        start: DateTime<Utc>,
        /// Last instant.
        end: DateTime<Utc>,
    },
}

impl PeriodSpec {
    /// Builds a custom period from instants in any timezone.
    #[must_use]
    pub fn custom<A: TimeZone, B: TimeZone>(start: &DateTime<A>, end: &DateTime<B>) -> Self {
        Self::Custom {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        }
    }

    /// Builds a relative period from its keyword.
    ///
    /// Returns `None` for [`PeriodKind::Custom`], which needs dates.
    #[must_use]
    pub const fn relative(kind: PeriodKind) -> Option<Self> {
        match kind {
            PeriodKind::Today => Some(Self::Today),
            PeriodKind::Yesterday => Some(Self::Yesterday),
            PeriodKind::Last7Days => Some(Self::Last7Days),
            PeriodKind::Last4Weeks => Some(Self::Last4Weeks),
            PeriodKind::Last3Months => Some(Self::Last3Months),
            PeriodKind::Last6Months => Some(Self::Last6Months),
            PeriodKind::Last12Months => Some(Self::Last12Months),
            PeriodKind::Custom => None,
        }
    }

    /// Keyword for this period.
    #[must_use]
    pub const fn kind(&self) -> PeriodKind {
        match self {
            Self::Today => PeriodKind::Today,
            Self::Yesterday => PeriodKind::Yesterday,
            Self::Last7Days => PeriodKind::Last7Days,
            Self::Last4Weeks => PeriodKind::Last4Weeks,
            Self::Last3Months => PeriodKind::Last3Months,
            Self::Last6Months => PeriodKind::Last6Months,
            Self::Last12Months => PeriodKind::Last12Months,
            Self::Custom { .. } => PeriodKind::Custom,
        }
    }
}

/// Resolves `spec` into a concrete UTC range.
///
/// `now` is the caller's reference instant in the reporting timezone. Local
/// boundaries are computed in that timezone and converted to UTC. Relative
/// periods always start on the first local day of their oldest bucket, so
/// the resolved range is exactly the union of the buckets planned for it.
///
/// # Errors
///
/// Returns `InvalidRange` for a custom period whose start is after its end.
pub fn resolve(spec: &PeriodSpec, now: &DateTime<Tz>) -> Result<DateRange, AnalyticsError> {
    let tz = now.timezone();
    let today = now.date_naive();
    let now_utc = now.with_timezone(&Utc);
    let midnight_today = local_midnight(today, tz);

    let range = match *spec {
        PeriodSpec::Today => DateRange::new(midnight_today, now_utc),
        PeriodSpec::Yesterday => DateRange::new(
            local_midnight(today - Days::new(1), tz),
            midnight_today - tick(),
        ),
        PeriodSpec::Last7Days => {
            DateRange::new(local_midnight(today - Days::new(6), tz), now_utc)
        }
        PeriodSpec::Last4Weeks => {
            DateRange::new(local_midnight(week_start(today) - Days::new(21), tz), now_utc)
        }
        PeriodSpec::Last3Months | PeriodSpec::Last6Months | PeriodSpec::Last12Months => {
            let months = spec.kind().month_count().unwrap_or(1);
            let oldest = add_months(month_start(today), 1 - months.cast_signed());
            DateRange::new(local_midnight(oldest, tz), now_utc)
        }
        PeriodSpec::Custom { start, end } => {
            if start > end {
                return Err(AnalyticsError::InvalidRange { start, end });
            }
            DateRange::new(start, end)
        }
    };

    Ok(range)
}
