//! # KHIS Common Library
//!
//! Shared code for the KHIS ETL service:
//! - Error taxonomy and result alias
//! - Program enum (FP / MNCH)
//! - Configuration loading
//! - Tabular frame and relational store abstraction
//! - API response envelope

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod program;

pub use error::{Error, Result};
pub use program::Program;
