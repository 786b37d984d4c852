//! Shared types, errors, and configuration for Haven.
//!
//! This crate provides common pieces used by the analytics engine and the
//! binaries built on it:
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalyticsConfig, AppConfig, LoggingConfig};
pub use error::AppError;
