//! Shared HTTP API types
//!
//! Framework-free: the service crate wraps these with axum extractors and
//! `IntoResponse` implementations.

pub mod types;

pub use types::{ApiResponse, ErrorDetail};
