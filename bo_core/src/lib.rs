//! ABOUTME: Core types, errors, and tracing utilities
//! ABOUTME: Foundation crate used by all other backoffice components

pub mod error;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use time::{now_iso8601, to_rfc3339, utc_now, MonotonicTimer};
