//! Period-bucketed revenue analytics.
//!
//! A report request goes through five steps:
//! - [`ReportRequest::validate`] turns raw input into a [`PeriodSpec`]
//! - [`resolve`] turns the period into a UTC [`DateRange`]
//! - [`plan`] splits the range into labelled [`Bucket`]s
//! - [`Aggregator`] totals purchase and refund events per bucket
//! - [`ReportAssembler`] builds the [`AnalyticsReport`]
//!
//! [`AnalyticsService`] runs them all against a [`TransactionSource`].

pub mod aggregate;
pub mod calendar;
pub mod error;
pub mod period;
pub mod planner;
pub mod report;
pub mod request;
pub mod service;
pub mod source;
pub mod types;


pub use aggregate::{Aggregation, Aggregator, BucketTotals};
pub use error::{AnalyticsError, FieldError, ValidationErrors};
pub use period::{PeriodKind, PeriodSpec, resolve};
pub use planner::{Bucket, BucketPlan, plan};
pub use report::ReportAssembler;
pub use request::ReportRequest;
pub use service::{AnalyticsService, ReportSettings, generate_report};
pub use source::{InMemoryTransactionStore, PurchasedProduct, TransactionRecord, TransactionSource};
pub use types::*;
