//! Report assembly: pairs bucket labels with aggregated values.

use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::error;

use super::aggregate::Aggregation;
use super::calendar::local_date;
use super::error::AnalyticsError;
use super::period::PeriodSpec;
use super::planner::BucketPlan;
use super::types::{AnalyticsReport, DateRange};

/// Builds the final [`AnalyticsReport`].
pub struct ReportAssembler;

impl ReportAssembler {
    /// Assembles a report from a plan and its aggregation.
    ///
    /// Totals are recomputed from the per-bucket values so the report always
    /// agrees with itself.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if the plan and the aggregation have a
    /// different number of buckets.
    pub fn assemble(
        spec: &PeriodSpec,
        range: &DateRange,
        plan: &BucketPlan,
        aggregation: &Aggregation,
        tz: Tz,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        let labels = plan.labels();
        let totals = &aggregation.per_bucket;

        if labels.len() != totals.len() {
            error!(
                period = %spec.kind(),
                labels = labels.len(),
                buckets = totals.len(),
                "Report sequences have different lengths"
            );
            return Err(AnalyticsError::InvariantViolation(format!(
                "{} labels but {} aggregated buckets",
                labels.len(),
                totals.len()
            )));
        }

        let revenue_gain_per_period: Vec<Decimal> = totals.iter().map(|t| t.gain).collect();
        let revenue_loss_per_period: Vec<Decimal> = totals.iter().map(|t| t.loss).collect();
        let units_sold_per_period: Vec<u64> = totals.iter().map(|t| t.units_sold).collect();
        let units_refunded_per_period: Vec<u64> =
            totals.iter().map(|t| t.units_refunded).collect();

        let total_gain: Decimal = revenue_gain_per_period.iter().sum();
        let total_loss: Decimal = revenue_loss_per_period.iter().sum();

        let report = AnalyticsReport {
            period: spec.kind(),
            granularity: plan.granularity,
            range_start: range.start,
            range_end: range.end,
            range_label: range_label(range, tz),
            total_revenue: total_gain - total_loss,
            total_gain,
            total_loss,
            total_units_sold: units_sold_per_period.iter().sum(),
            total_units_refunded: units_refunded_per_period.iter().sum(),
            period_labels: labels,
            revenue_gain_per_period,
            revenue_loss_per_period,
            units_sold_per_period,
            units_refunded_per_period,
            units_sold_by_product: aggregation.units_sold_by_product.clone(),
            units_refunded_by_product: aggregation.units_refunded_by_product.clone(),
        };

        check_alignment(&report)?;
        Ok(report)
    }
}

/// Verifies every per-bucket sequence has one entry per label.
///
/// # Errors
///
/// Returns `InvariantViolation` naming the first sequence that disagrees.
pub fn check_alignment(report: &AnalyticsReport) -> Result<(), AnalyticsError> {
    let expected = report.period_labels.len();
    let sequences = [
        ("revenue_gain_per_period", report.revenue_gain_per_period.len()),
        ("revenue_loss_per_period", report.revenue_loss_per_period.len()),
        ("units_sold_per_period", report.units_sold_per_period.len()),
        ("units_refunded_per_period", report.units_refunded_per_period.len()),
    ];

    for (name, actual) in sequences {
        if actual != expected {
            error!(
                period = %report.period,
                sequence = name,
                expected,
                actual,
                "Report sequence is not aligned with its labels"
            );
            return Err(AnalyticsError::InvariantViolation(format!(
                "{name} has {actual} entries for {expected} labels"
            )));
        }
    }

    Ok(())
}

/// `Mon DD, YYYY – Mon DD, YYYY` in local dates.
#[must_use]
pub fn range_label(range: &DateRange, tz: Tz) -> String {
    format!(
        "{} – {}",
        local_date(range.start, tz).format("%b %d, %Y"),
        local_date(range.end, tz).format("%b %d, %Y")
    )
}
