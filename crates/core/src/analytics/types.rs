//! Analytics data types.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::period::PeriodKind;

/// Inclusive UTC instant range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First instant in the range.
    pub start: DateTime<Utc>,
    /// Last instant in the range.
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Creates a range. Callers guarantee `start <= end`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Returns true if `instant` lies within the range, both ends included.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Wall-clock length of the range in `tz`.
    ///
    /// Measured between local times, so a range of whole local days is a
    /// whole number of days (less one tick) even across a DST change.
    #[must_use]
    pub fn local_length(&self, tz: Tz) -> TimeDelta {
        self.end.with_timezone(&tz).naive_local() - self.start.with_timezone(&tz).naive_local()
    }
}

/// Status of a purchase transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Paid and not refunded.
    #[default]
    Paid,
    /// Refunded; counts toward loss on its refund date.
    Refunded,
    /// Any other status the store reports.
    #[serde(other)]
    Other,
}

/// One purchased product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLine {
    /// Product name.
    pub product_name: String,
    /// Number of units.
    pub quantity: u32,
}

/// A purchase or refund, keyed by the instant it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonetaryEvent {
    /// Amount of money involved.
    pub amount: Decimal,
    /// Purchase date for purchase events, refund date for refund events.
    pub occurred_at: DateTime<Utc>,
    /// Product lines, in purchase order.
    pub units: Vec<UnitLine>,
    /// Transaction status at the time the events were loaded.
    #[serde(default)]
    pub status: TransactionStatus,
}

impl MonetaryEvent {
    /// Total units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.units.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Returns true if this event counts as a refund.
    #[must_use]
    pub fn is_refunded(&self) -> bool {
        self.status == TransactionStatus::Refunded
    }
}

/// Bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One calendar day per bucket.
    Day,
    /// One Sunday to Saturday week per bucket.
    Week,
    /// One calendar month per bucket.
    Month,
}

/// Units moved for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUnits {
    /// Product name.
    pub product_name: String,
    /// Units sold or refunded.
    pub units: u64,
}

/// Final analytics report.
///
/// Every `*_per_period` sequence and `period_labels` have the same length,
/// and index `i` of each describes the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    /// Period keyword the report was generated for.
    pub period: PeriodKind,
    /// Bucket size used.
    pub granularity: Granularity,
    /// Start of the resolved range (UTC).
    pub range_start: DateTime<Utc>,
    /// End of the resolved range (UTC).
    pub range_end: DateTime<Utc>,
    /// Human-readable resolved range, e.g. `Jan 01, 2024 – Jun 01, 2024`.
    pub range_label: String,
    /// Gain minus loss.
    pub total_revenue: Decimal,
    /// Revenue from purchases.
    pub total_gain: Decimal,
    /// Revenue lost to refunds.
    pub total_loss: Decimal,
    /// Units purchased.
    pub total_units_sold: u64,
    /// Units refunded.
    pub total_units_refunded: u64,
    /// One label per bucket.
    pub period_labels: Vec<String>,
    /// Gain per bucket.
    pub revenue_gain_per_period: Vec<Decimal>,
    /// Loss per bucket.
    pub revenue_loss_per_period: Vec<Decimal>,
    /// Units sold per bucket.
    pub units_sold_per_period: Vec<u64>,
    /// Units refunded per bucket.
    pub units_refunded_per_period: Vec<u64>,
    /// Units sold per product, most sold first.
    pub units_sold_by_product: Vec<ProductUnits>,
    /// Units refunded per product, most refunded first.
    pub units_refunded_by_product: Vec<ProductUnits>,
}

impl AnalyticsReport {
    /// Number of buckets in the report.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.period_labels.len()
    }
}
