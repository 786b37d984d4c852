//! Per-bucket revenue and unit aggregation.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::planner::Bucket;
use super::types::{DateRange, MonetaryEvent, ProductUnits};

/// Totals for a single bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTotals {
    /// Revenue from purchases.
    pub gain: Decimal,
    /// Revenue lost to refunds.
    pub loss: Decimal,
    /// Units purchased.
    pub units_sold: u64,
    /// Units refunded.
    pub units_refunded: u64,
}

impl BucketTotals {
    /// Gain minus loss.
    #[must_use]
    pub fn revenue(&self) -> Decimal {
        self.gain - self.loss
    }
}

impl std::ops::Add for BucketTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            gain: self.gain + rhs.gain,
            loss: self.loss + rhs.loss,
            units_sold: self.units_sold + rhs.units_sold,
            units_refunded: self.units_refunded + rhs.units_refunded,
        }
    }
}

impl std::iter::Sum for BucketTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), std::ops::Add::add)
    }
}

/// Result of aggregating one report's events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Totals per bucket, in bucket order.
    pub per_bucket: Vec<BucketTotals>,
    /// Sum of `per_bucket`.
    pub overall: BucketTotals,
    /// Units sold per product, most sold first.
    pub units_sold_by_product: Vec<ProductUnits>,
    /// Units refunded per product, most refunded first.
    pub units_refunded_by_product: Vec<ProductUnits>,
}

/// Aggregates purchase and refund events into buckets.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    parallel_threshold: usize,
}

impl Aggregator {
    /// Creates an aggregator that runs buckets in parallel once the combined
    /// event count reaches `parallel_threshold`.
    #[must_use]
    pub const fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// Aggregator that never goes parallel.
    #[must_use]
    pub const fn sequential() -> Self {
        Self::new(usize::MAX)
    }

    /// Returns true if `event_count` events would be aggregated in parallel.
    #[must_use]
    pub const fn runs_parallel(&self, event_count: usize) -> bool {
        event_count >= self.parallel_threshold
    }

    /// Totals each bucket independently.
    ///
    /// Refund events count only when their status is `Refunded`. Events
    /// outside every bucket are ignored.
    #[must_use]
    pub fn aggregate(
        &self,
        buckets: &[Bucket],
        purchases: &[MonetaryEvent],
        refunds: &[MonetaryEvent],
    ) -> Aggregation {
        let event_count = purchases.len() + refunds.len();

        let per_bucket: Vec<BucketTotals> = if self.runs_parallel(event_count) {
            debug!(buckets = buckets.len(), events = event_count, "Aggregating buckets in parallel");
            buckets
                .par_iter()
                .map(|bucket| bucket_totals(bucket, purchases, refunds))
                .collect()
        } else {
            buckets
                .iter()
                .map(|bucket| bucket_totals(bucket, purchases, refunds))
                .collect()
        };

        let overall = per_bucket.iter().copied().sum();

        let coverage = match (buckets.first(), buckets.last()) {
            (Some(first), Some(last)) => Some(DateRange::new(first.start, last.end)),
            _ => None,
        };
        let covered = |event: &&MonetaryEvent| {
            coverage.is_some_and(|range| range.contains(event.occurred_at))
        };

        let outside = purchases.iter().chain(refunds).filter(|e| !covered(e)).count();
        if outside > 0 {
            debug!(events = outside, "Ignoring events outside the report range");
        }
        let skipped = refunds.iter().filter(|e| !e.is_refunded()).count();
        if skipped > 0 {
            debug!(events = skipped, "Ignoring refund events whose status is not Refunded");
        }

        let units_sold_by_product = units_by_product(purchases.iter().filter(covered));
        let units_refunded_by_product =
            units_by_product(refunds.iter().filter(covered).filter(|e| e.is_refunded()));

        Aggregation {
            per_bucket,
            overall,
            units_sold_by_product,
            units_refunded_by_product,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::sequential()
    }
}

fn bucket_totals(
    bucket: &Bucket,
    purchases: &[MonetaryEvent],
    refunds: &[MonetaryEvent],
) -> BucketTotals {
    let sold = purchases.iter().filter(|e| bucket.contains(e.occurred_at));
    let refunded = refunds
        .iter()
        .filter(|e| e.is_refunded() && bucket.contains(e.occurred_at));

    let (gain, units_sold) = sold.fold((Decimal::ZERO, 0), |(amount, units), e| {
        (amount + e.amount, units + e.unit_count())
    });
    let (loss, units_refunded) = refunded.fold((Decimal::ZERO, 0), |(amount, units), e| {
        (amount + e.amount, units + e.unit_count())
    });

    BucketTotals {
        gain,
        loss,
        units_sold,
        units_refunded,
    }
}

fn units_by_product<'a>(events: impl Iterator<Item = &'a MonetaryEvent>) -> Vec<ProductUnits> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for line in events.flat_map(|e| &e.units) {
        *totals.entry(line.product_name.as_str()).or_default() += u64::from(line.quantity);
    }

    let mut products: Vec<ProductUnits> = totals
        .into_iter()
        .map(|(name, units)| ProductUnits {
            product_name: name.to_string(),
            units,
        })
        .collect();
    // BTreeMap order breaks ties by name; the stable sort keeps it.
    products.sort_by(|a, b| b.units.cmp(&a.units));
    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::calendar::tick;
    use crate::analytics::types::{TransactionStatus, UnitLine};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn day_bucket(d: u32) -> Bucket {
        let date = NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        Bucket {
            start: at(d, 0),
            end: at(d + 1, 0) - tick(),
            label: date.format("%b %d").to_string(),
            first_day: date,
            last_day: date,
        }
    }

    fn event(
        amount: Decimal,
        occurred_at: DateTime<Utc>,
        lines: &[(&str, u32)],
        status: TransactionStatus,
    ) -> MonetaryEvent {
        MonetaryEvent {
            amount,
            occurred_at,
            units: lines
                .iter()
                .map(|(name, quantity)| UnitLine {
                    product_name: (*name).to_string(),
                    quantity: *quantity,
                })
                .collect(),
            status,
        }
    }

    #[test]
    fn test_events_land_in_their_bucket() {
        let buckets = vec![day_bucket(1), day_bucket(2), day_bucket(3)];
        let purchases = vec![
            event(dec!(50), at(1, 10), &[("Oud", 1)], TransactionStatus::Paid),
            event(dec!(20.50), at(3, 23), &[("Musk", 2)], TransactionStatus::Paid),
            event(dec!(10), at(3, 1), &[("Oud", 1), ("Musk", 1)], TransactionStatus::Paid),
        ];

        let result = Aggregator::sequential().aggregate(&buckets, &purchases, &[]);

        let gains: Vec<_> = result.per_bucket.iter().map(|t| t.gain).collect();
        assert_eq!(gains, vec![dec!(50), dec!(0), dec!(30.50)]);
        let units: Vec<_> = result.per_bucket.iter().map(|t| t.units_sold).collect();
        assert_eq!(units, vec![1, 0, 4]);
        assert_eq!(result.overall.gain, dec!(80.50));
    }

    #[test]
    fn test_bucket_edges_are_inclusive() {
        let buckets = vec![day_bucket(1), day_bucket(2)];
        let purchases = vec![
            event(dec!(1), buckets[0].end, &[], TransactionStatus::Paid),
            event(dec!(2), buckets[1].start, &[], TransactionStatus::Paid),
        ];

        let result = Aggregator::sequential().aggregate(&buckets, &purchases, &[]);
        assert_eq!(result.per_bucket[0].gain, dec!(1));
        assert_eq!(result.per_bucket[1].gain, dec!(2));
    }

    #[test]
    fn test_only_refunded_status_counts_as_loss() {
        let buckets = vec![day_bucket(5)];
        let refunds = vec![
            event(dec!(40), at(5, 9), &[("Amber", 2)], TransactionStatus::Refunded),
            event(dec!(99), at(5, 10), &[("Amber", 5)], TransactionStatus::Paid),
            event(dec!(15), at(5, 11), &[("Amber", 1)], TransactionStatus::Other),
        ];

        let result = Aggregator::sequential().aggregate(&buckets, &[], &refunds);

        assert_eq!(result.per_bucket[0].loss, dec!(40));
        assert_eq!(result.per_bucket[0].units_refunded, 2);
        assert_eq!(
            result.units_refunded_by_product,
            vec![ProductUnits {
                product_name: "Amber".into(),
                units: 2
            }]
        );
    }

    #[test]
    fn test_events_outside_buckets_are_ignored() {
        let buckets = vec![day_bucket(10)];
        let purchases = vec![
            event(dec!(5), at(9, 23), &[("Vetiver", 3)], TransactionStatus::Paid),
            event(dec!(7), at(10, 12), &[("Vetiver", 1)], TransactionStatus::Paid),
        ];

        let result = Aggregator::sequential().aggregate(&buckets, &purchases, &[]);

        assert_eq!(result.overall.gain, dec!(7));
        assert_eq!(result.units_sold_by_product[0].units, 1);
    }

    #[test]
    fn test_empty_inputs_produce_zero_buckets() {
        let buckets = vec![day_bucket(1), day_bucket(2)];
        let result = Aggregator::sequential().aggregate(&buckets, &[], &[]);

        assert_eq!(result.per_bucket, vec![BucketTotals::default(); 2]);
        assert!(result.units_sold_by_product.is_empty());
    }

    #[test]
    fn test_products_sorted_by_units_then_name() {
        let buckets = vec![day_bucket(1)];
        let purchases = vec![event(
            dec!(1),
            at(1, 1),
            &[("Cedar", 2), ("Amber", 2), ("Rose", 5)],
            TransactionStatus::Paid,
        )];

        let result = Aggregator::sequential().aggregate(&buckets, &purchases, &[]);
        let names: Vec<_> = result
            .units_sold_by_product
            .iter()
            .map(|p| p.product_name.as_str())
            .collect();
        assert_eq!(names, vec!["Rose", "Amber", "Cedar"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let buckets: Vec<_> = (1..=20).map(day_bucket).collect();
        let purchases: Vec<_> = (0..200)
            .map(|i| {
                event(
                    Decimal::new(i64::from(i) * 137 + 99, 2),
                    at(1 + i % 20, i % 24),
                    &[("Neroli", 1 + i % 3)],
                    TransactionStatus::Paid,
                )
            })
            .collect();
        let refunds: Vec<_> = purchases
            .iter()
            .step_by(7)
            .cloned()
            .map(|mut e| {
                e.status = TransactionStatus::Refunded;
                e
            })
            .collect();

        let parallel = Aggregator::new(0);
        assert!(parallel.runs_parallel(purchases.len() + refunds.len()));

        assert_eq!(
            parallel.aggregate(&buckets, &purchases, &refunds),
            Aggregator::sequential().aggregate(&buckets, &purchases, &refunds)
        );
    }
}
