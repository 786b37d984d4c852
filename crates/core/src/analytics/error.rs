//! Analytics error types.

use std::fmt;

use chrono::{DateTime, Utc};
use haven_shared::AppError;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while producing an analytics report.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Period keyword is not one of the known keywords.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Custom range starts after it ends.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange {
        /// Start instant.
        start: DateTime<Utc>,
        /// End instant.
        end: DateTime<Utc>,
    },

    /// Request fields are missing or malformed.
    #[error("Invalid request: {0}")]
    Validation(ValidationErrors),

    /// Configured timezone is not a known IANA name.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Bucket, label and aggregate sequences disagree. Always a bug.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Transaction source failed to load events.
    #[error("Transaction source error: {0}")]
    Source(String),
}

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as it appears in the request.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

/// Every field problem found in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// Individual field errors, in the order they were found.
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Records a field error.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Returns true if no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true if an error was recorded for `field`.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::InvalidPeriod(_)
            | AnalyticsError::InvalidRange { .. }
            | AnalyticsError::Validation(_) => Self::Validation(err.to_string()),
            AnalyticsError::UnknownTimezone(_) => Self::Configuration(err.to_string()),
            AnalyticsError::InvariantViolation(_) => Self::Internal(err.to_string()),
            AnalyticsError::Source(_) => Self::ExternalService(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validation_errors_display_joins_fields() {
        let mut errors = ValidationErrors::default();
        errors.push("start_date", "is required for a custom period");
        errors.push("end_date", "is required for a custom period");

        assert_eq!(
            errors.to_string(),
            "start_date: is required for a custom period; end_date: is required for a custom period"
        );
        assert!(errors.has_field("end_date"));
        assert!(!errors.has_field("period"));
    }

    #[test]
    fn test_input_errors_map_to_bad_request() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let app: AppError = AnalyticsError::InvalidRange { start, end }.into();
        assert_eq!(app.status_code(), 400);

        let app: AppError = AnalyticsError::InvalidPeriod("fortnight".into()).into();
        assert_eq!(app.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_internal_errors_map_to_server_error() {
        let app: AppError = AnalyticsError::InvariantViolation("3 buckets, 2 labels".into()).into();
        assert_eq!(app.error_code(), "INTERNAL_ERROR");

        let app: AppError = AnalyticsError::Source("store offline".into()).into();
        assert_eq!(app.error_code(), "EXTERNAL_SERVICE_ERROR");
    }
}
