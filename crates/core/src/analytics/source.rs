//! Transaction records and the source trait the analytics service reads from.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use haven_shared::types::{TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::AnalyticsError;
use super::types::{DateRange, MonetaryEvent, TransactionStatus, UnitLine};

/// Source of purchase and refund events.
///
/// Implemented by whatever store holds transactions. Events outside the
/// requested range may be returned; the aggregator ignores them.
pub trait TransactionSource: Send + Sync {
    /// Purchase events whose purchase date lies in `range`.
    ///
    /// # Errors
    ///
    /// Returns `Source` if the store cannot be read.
    fn purchase_events(&self, range: &DateRange) -> Result<Vec<MonetaryEvent>, AnalyticsError>;

    /// Refund events whose refund date lies in `range`.
    ///
    /// # Errors
    ///
    /// Returns `Source` if the store cannot be read.
    fn refund_events(&self, range: &DateRange) -> Result<Vec<MonetaryEvent>, AnalyticsError>;
}

/// One product line on a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedProduct {
    /// Product name.
    pub name: String,
    /// Brand name.
    #[serde(default)]
    pub brand_name: String,
    /// Unit price at the time of purchase.
    pub purchased_price: Decimal,
    /// Units bought.
    #[serde(default = "default_amount")]
    pub amount: u32,
}

const fn default_amount() -> u32 {
    1
}

/// A stored purchase transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction ID.
    #[serde(default)]
    pub id: TransactionId,
    /// Buyer.
    #[serde(default)]
    pub user_id: UserId,
    /// Amount charged.
    pub total_spent: Decimal,
    /// When the purchase happened.
    pub date_purchased: DateTime<Utc>,
    /// Current status.
    #[serde(default)]
    pub status: TransactionStatus,
    /// When the purchase was refunded, if it was.
    #[serde(default)]
    pub refunded_date: Option<DateTime<Utc>>,
    /// Product lines.
    #[serde(default)]
    pub products_purchased: Vec<PurchasedProduct>,
}

impl TransactionRecord {
    /// Creates a paid transaction.
    #[must_use]
    pub fn paid(
        total_spent: Decimal,
        date_purchased: DateTime<Utc>,
        products_purchased: Vec<PurchasedProduct>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id: UserId::new(),
            total_spent,
            date_purchased,
            status: TransactionStatus::Paid,
            refunded_date: None,
            products_purchased,
        }
    }

    /// Marks the transaction refunded at `at`.
    pub fn mark_refunded(&mut self, at: DateTime<Utc>) {
        self.status = TransactionStatus::Refunded;
        self.refunded_date = Some(at);
    }

    fn unit_lines(&self) -> Vec<UnitLine> {
        self.products_purchased
            .iter()
            .map(|p| UnitLine {
                product_name: p.name.clone(),
                quantity: p.amount,
            })
            .collect()
    }

    /// The purchase as an event on its purchase date.
    #[must_use]
    pub fn purchase_event(&self) -> MonetaryEvent {
        MonetaryEvent {
            amount: self.total_spent,
            occurred_at: self.date_purchased,
            units: self.unit_lines(),
            status: self.status,
        }
    }

    /// The refund as an event on its refund date, if there was one.
    #[must_use]
    pub fn refund_event(&self) -> Option<MonetaryEvent> {
        self.refunded_date.map(|at| MonetaryEvent {
            amount: self.total_spent,
            occurred_at: at,
            units: self.unit_lines(),
            status: self.status,
        })
    }
}

/// Transaction store backed by memory.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    records: RwLock<Vec<TransactionRecord>>,
}

impl InMemoryTransactionStore {
    /// Creates a store holding `records`.
    #[must_use]
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Adds a record.
    ///
    /// # Errors
    ///
    /// Returns `Source` if the store lock is poisoned.
    pub fn insert(&self, record: TransactionRecord) -> Result<(), AnalyticsError> {
        self.records
            .write()
            .map_err(|_| poisoned())?
            .push(record);
        Ok(())
    }

    /// Marks the transaction `id` refunded at `at`. Returns false if no such
    /// transaction exists.
    ///
    /// # Errors
    ///
    /// Returns `Source` if the store lock is poisoned.
    pub fn refund(&self, id: TransactionId, at: DateTime<Utc>) -> Result<bool, AnalyticsError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        record.mark_refunded(at);
        Ok(true)
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns `Source` if the store lock is poisoned.
    pub fn len(&self) -> Result<usize, AnalyticsError> {
        Ok(self.records.read().map_err(|_| poisoned())?.len())
    }

    /// Returns true if the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns `Source` if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, AnalyticsError> {
        Ok(self.len()? == 0)
    }
}

fn poisoned() -> AnalyticsError {
    AnalyticsError::Source("transaction store lock poisoned".to_string())
}

impl TransactionSource for InMemoryTransactionStore {
    fn purchase_events(&self, range: &DateRange) -> Result<Vec<MonetaryEvent>, AnalyticsError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter(|r| range.contains(r.date_purchased))
            .map(TransactionRecord::purchase_event)
            .collect())
    }

    fn refund_events(&self, range: &DateRange) -> Result<Vec<MonetaryEvent>, AnalyticsError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter_map(TransactionRecord::refund_event)
            .filter(|e| range.contains(e.occurred_at))
            .collect())
    }
}

impl FromIterator<TransactionRecord> for InMemoryTransactionStore {
    fn from_iter<I: IntoIterator<Item = TransactionRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
    }

    fn product(name: &str, amount: u32) -> PurchasedProduct {
        PurchasedProduct {
            name: name.to_string(),
            brand_name: "Maison".to_string(),
            purchased_price: dec!(10),
            amount,
        }
    }

    #[test]
    fn test_purchase_event_carries_units() {
        let record = TransactionRecord::paid(dec!(30), at(1), vec![product("Oud", 2), product("Musk", 1)]);
        let event = record.purchase_event();

        assert_eq!(event.amount, dec!(30));
        assert_eq!(event.occurred_at, at(1));
        assert_eq!(event.unit_count(), 3);
        assert!(record.refund_event().is_none());
    }

    #[test]
    fn test_refund_event_uses_refund_date() {
        let mut record = TransactionRecord::paid(dec!(20), at(1), vec![product("Oud", 1)]);
        record.mark_refunded(at(4));

        let refund = record.refund_event().unwrap();
        assert_eq!(refund.occurred_at, at(4));
        assert!(refund.is_refunded());
    }

    #[test]
    fn test_store_filters_by_range() {
        let store: InMemoryTransactionStore = [
            TransactionRecord::paid(dec!(1), at(1), vec![]),
            TransactionRecord::paid(dec!(2), at(5), vec![]),
            TransactionRecord::paid(dec!(3), at(9), vec![]),
        ]
        .into_iter()
        .collect();

        let range = DateRange::new(at(2), at(9));
        let amounts: Vec<_> = store
            .purchase_events(&range)
            .unwrap()
            .into_iter()
            .map(|e| e.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(2), dec!(3)]);
    }

    #[test]
    fn test_store_refund_moves_event_to_refund_date() {
        let record = TransactionRecord::paid(dec!(15), at(1), vec![product("Amber", 1)]);
        let id = record.id;
        let store = InMemoryTransactionStore::new(vec![record]);

        assert!(store.refund(id, at(10)).unwrap());
        assert!(!store.refund(TransactionId::new(), at(10)).unwrap());

        let early = DateRange::new(at(1), at(5));
        let late = DateRange::new(at(6), at(12));
        assert!(store.refund_events(&early).unwrap().is_empty());
        assert_eq!(store.refund_events(&late).unwrap().len(), 1);
        assert_eq!(store.purchase_events(&early).unwrap().len(), 1);
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{
                "total_spent": "42.50",
                "date_purchased": "2024-01-03T10:00:00Z",
                "products_purchased": [{"name": "Oud", "purchased_price": "42.50"}]
            }"#,
        )
        .unwrap();

        assert_eq!(record.status, TransactionStatus::Paid);
        assert_eq!(record.products_purchased[0].amount, 1);
        assert!(record.refunded_date.is_none());
    }

    #[test]
    fn test_store_insert_and_len() {
        let store = InMemoryTransactionStore::default();
        assert!(store.is_empty().unwrap());
        store
            .insert(TransactionRecord::paid(dec!(5), at(3), vec![]))
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }
}
