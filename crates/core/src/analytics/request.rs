//! Report request validation.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::calendar::{local_instant, local_midnight, tick};
use super::error::{AnalyticsError, ValidationErrors};
use super::period::{PeriodKind, PeriodSpec};

/// Raw report request as it arrives from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Period keyword.
    pub period: Option<String>,
    /// Start of a custom range.
    pub start_date: Option<String>,
    /// End of a custom range.
    pub end_date: Option<String>,
}

/// Which end of a custom range a date string describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

impl ReportRequest {
    /// Request for a relative period.
    #[must_use]
    pub fn for_period(kind: PeriodKind) -> Self {
        Self {
            period: Some(kind.as_str().to_string()),
            ..Self::default()
        }
    }

    /// Request for a custom range.
    #[must_use]
    pub fn custom(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            period: Some(PeriodKind::Custom.as_str().to_string()),
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
        }
    }

    /// Validates the request and turns it into a [`PeriodSpec`].
    ///
    /// Dates accept RFC 3339 (`2024-01-01T00:00:00Z`), a local date-time
    /// (`2024-01-01T09:30:00`) or a plain date (`2024-01-01`). Local forms
    /// are read in `tz`; a local time skipped by a DST change moves forward
    /// to the end of the gap. A plain start date means the start of that day; a
    /// plain end date means the end of it. Dates sent with a relative
    /// period are ignored.
    ///
    /// # Errors
    ///
    /// - `Validation` listing every missing or malformed field
    /// - `InvalidPeriod` for an unknown keyword
    /// - `InvalidRange` for a custom range that ends before it starts
    pub fn validate(&self, tz: Tz) -> Result<PeriodSpec, AnalyticsError> {
        let Some(period) = self.period.as_deref().map(str::trim).filter(|p| !p.is_empty()) else {
            let mut errors = ValidationErrors::default();
            errors.push("period", "is required");
            return Err(AnalyticsError::Validation(errors));
        };

        let kind: PeriodKind = period.parse()?;

        if let Some(spec) = PeriodSpec::relative(kind) {
            if self.start_date.is_some() || self.end_date.is_some() {
                debug!(period = %kind, "Ignoring custom dates sent with a relative period");
            }
            return Ok(spec);
        }

        let mut errors = ValidationErrors::default();
        let start = parse_field(&mut errors, "start_date", self.start_date.as_deref(), Bound::Start, tz);
        let end = parse_field(&mut errors, "end_date", self.end_date.as_deref(), Bound::End, tz);

        match (start, end) {
            (Some(start), Some(end)) if errors.is_empty() => {
                if start > end {
                    return Err(AnalyticsError::InvalidRange { start, end });
                }
                Ok(PeriodSpec::Custom { start, end })
            }
            _ => Err(AnalyticsError::Validation(errors)),
        }
    }
}

fn parse_field(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<&str>,
    bound: Bound,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        errors.push(field, "is required for a custom period");
        return None;
    };

    let parsed = parse_date(raw, bound, tz);
    if parsed.is_none() {
        errors.push(field, format!("'{raw}' is not a valid date"));
    }
    parsed
}

fn parse_date(raw: &str, bound: Bound, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(local_instant(naive, tz));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    match bound {
        Bound::Start => Some(local_midnight(date, tz)),
        Bound::End => date
            .checked_add_days(Days::new(1))
            .map(|next| local_midnight(next, tz) - tick()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_period() {
        let err = ReportRequest::default().validate(Tz::UTC).unwrap_err();
        let AnalyticsError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.has_field("period"));
    }

    #[test]
    fn test_unknown_period() {
        let request = ReportRequest {
            period: Some("fortnight".into()),
            ..ReportRequest::default()
        };
        assert!(matches!(
            request.validate(Tz::UTC),
            Err(AnalyticsError::InvalidPeriod(_))
        ));
    }

    #[rstest]
    #[case(PeriodKind::Today, PeriodSpec::Today)]
    #[case(PeriodKind::Last4Weeks, PeriodSpec::Last4Weeks)]
    #[case(PeriodKind::Last12Months, PeriodSpec::Last12Months)]
    fn test_relative_periods(#[case] kind: PeriodKind, #[case] expected: PeriodSpec) {
        assert_eq!(ReportRequest::for_period(kind).validate(Tz::UTC).unwrap(), expected);
    }

    #[test]
    fn test_relative_period_ignores_dates() {
        let request = ReportRequest {
            period: Some("yesterday".into()),
            start_date: Some("garbage".into()),
            end_date: None,
        };
        assert_eq!(request.validate(Tz::UTC).unwrap(), PeriodSpec::Yesterday);
    }

    #[test]
    fn test_custom_reports_every_missing_field() {
        let request = ReportRequest {
            period: Some("custom".into()),
            ..ReportRequest::default()
        };
        let AnalyticsError::Validation(errors) = request.validate(Tz::UTC).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.has_field("start_date"));
        assert!(errors.has_field("end_date"));
    }

    #[test]
    fn test_custom_rejects_malformed_date() {
        let request = ReportRequest::custom("2024-13-01", "2024-01-31");
        let AnalyticsError::Validation(errors) = request.validate(Tz::UTC).unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.errors.len(), 1);
        assert!(errors.has_field("start_date"));
    }

    #[test]
    fn test_custom_plain_dates_cover_whole_days() {
        let spec = ReportRequest::custom("2024-01-01", "2024-01-05")
            .validate(Tz::UTC)
            .unwrap();
        assert_eq!(
            spec,
            PeriodSpec::Custom {
                start: utc(2024, 1, 1, 0),
                end: utc(2024, 1, 6, 0) - tick(),
            }
        );
    }

    #[test]
    fn test_custom_plain_dates_use_timezone() {
        let spec = ReportRequest::custom("2024-01-01", "2024-01-01")
            .validate(chrono_tz::America::New_York)
            .unwrap();
        assert_eq!(
            spec,
            PeriodSpec::Custom {
                start: utc(2024, 1, 1, 5),
                end: utc(2024, 1, 2, 5) - tick(),
            }
        );
    }

    #[test]
    fn test_custom_rfc3339_and_local_datetime() {
        let spec = ReportRequest::custom("2024-01-01T10:00:00+02:00", "2024-01-03T12:30:00")
            .validate(Tz::UTC)
            .unwrap();
        assert_eq!(
            spec,
            PeriodSpec::Custom {
                start: utc(2024, 1, 1, 8),
                end: Utc.with_ymd_and_hms(2024, 1, 3, 12, 30, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_custom_local_datetime_in_dst_gap_moves_forward() {
        let spec = ReportRequest::custom("2024-03-10T02:30:00", "2024-03-10T12:00:00")
            .validate(chrono_tz::America::New_York)
            .unwrap();
        assert_eq!(
            spec,
            PeriodSpec::Custom {
                start: utc(2024, 3, 10, 7),
                end: utc(2024, 3, 10, 16),
            }
        );
    }

    #[test]
    fn test_custom_inverted_range() {
        let err = ReportRequest::custom("2024-02-01", "2024-01-01")
            .validate(Tz::UTC)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    }

    #[test]
    fn test_request_deserializes_from_json() {
        let request: ReportRequest = serde_json::from_str(
            r#"{"period": "custom", "start_date": "2024-01-01", "end_date": "2024-01-31"}"#,
        )
        .unwrap();
        assert_eq!(request, ReportRequest::custom("2024-01-01", "2024-01-31"));
    }
}
