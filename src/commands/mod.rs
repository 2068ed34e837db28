//! Command handlers
//!
//! The entry points a UI host calls. Results are plain serializable data;
//! failures are rendered as [`ErrorResponse`](crate::utils::ErrorResponse).

pub mod examination;
