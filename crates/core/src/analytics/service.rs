//! Analytics service: resolve, plan, load, aggregate, assemble.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use haven_shared::AnalyticsConfig;
use tracing::{info, info_span};

use super::aggregate::Aggregator;
use super::error::AnalyticsError;
use super::period::{PeriodSpec, resolve};
use super::planner::plan;
use super::report::ReportAssembler;
use super::request::ReportRequest;
use super::source::TransactionSource;
use super::types::{AnalyticsReport, MonetaryEvent};

/// Runtime settings for report generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSettings {
    /// Timezone for local day, week and month boundaries.
    pub timezone: Tz,
    /// Combined event count at which aggregation goes parallel.
    pub parallel_threshold: usize,
}

impl ReportSettings {
    /// Builds settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTimezone` if the configured timezone is not an IANA name.
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, AnalyticsError> {
        let timezone = config
            .timezone
            .parse::<Tz>()
            .map_err(|_| AnalyticsError::UnknownTimezone(config.timezone.clone()))?;

        Ok(Self {
            timezone,
            parallel_threshold: config.parallel_threshold,
        })
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        let config = AnalyticsConfig::default();
        Self {
            timezone: Tz::UTC,
            parallel_threshold: config.parallel_threshold,
        }
    }
}

/// Generates reports from a [`TransactionSource`].
pub struct AnalyticsService<S: TransactionSource> {
    source: Arc<S>,
    settings: ReportSettings,
}

impl<S: TransactionSource> AnalyticsService<S> {
    /// Creates a new analytics service.
    #[must_use]
    pub fn new(source: Arc<S>, settings: ReportSettings) -> Self {
        Self { source, settings }
    }

    /// Settings in use.
    #[must_use]
    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Validates `request` and generates its report as of `now`.
    ///
    /// # Errors
    ///
    /// Returns any validation, resolution, source or assembly error.
    pub fn generate(
        &self,
        request: &ReportRequest,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        let spec = request.validate(self.settings.timezone)?;
        self.generate_for(&spec, now)
    }

    /// Generates the report for an already validated period as of `now`.
    ///
    /// # Errors
    ///
    /// Returns any resolution, source or assembly error.
    pub fn generate_for(
        &self,
        spec: &PeriodSpec,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        let _span = info_span!("analytics_report", period = %spec.kind()).entered();

        let now = now.with_timezone(&self.settings.timezone);
        let range = resolve(spec, &now)?;

        let purchases = self.source.purchase_events(&range)?;
        let refunds = self.source.refund_events(&range)?;

        generate_report(
            spec,
            &now,
            &purchases,
            &refunds,
            &Aggregator::new(self.settings.parallel_threshold),
        )
    }
}

/// Produces a report from events already in memory.
///
/// Deterministic: the same inputs always give the same report.
///
/// # Errors
///
/// Returns `InvalidRange` for an inverted custom range, or
/// `InvariantViolation` if planning or assembly go wrong.
pub fn generate_report(
    spec: &PeriodSpec,
    now: &DateTime<Tz>,
    purchases: &[MonetaryEvent],
    refunds: &[MonetaryEvent],
    aggregator: &Aggregator,
) -> Result<AnalyticsReport, AnalyticsError> {
    let range = resolve(spec, now)?;
    let plan = plan(spec, &range, now)?;
    let aggregation = aggregator.aggregate(&plan.buckets, purchases, refunds);
    let report = ReportAssembler::assemble(spec, &range, &plan, &aggregation, now.timezone())?;

    info!(
        period = %report.period,
        granularity = ?report.granularity,
        buckets = report.bucket_count(),
        purchases = purchases.len(),
        refunds = refunds.len(),
        "Generated analytics report"
    );

    Ok(report)
}
