//! Core business logic for Haven.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Period resolution, bucket planning, aggregation and report assembly all
//! live here; callers supply transactions through a
//! [`TransactionSource`](analytics::TransactionSource).
//!
//! # Modules
//!
//! - `analytics` - Period-bucketed revenue and unit reports

pub mod analytics;
