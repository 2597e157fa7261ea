//! Test Helper Utilities
//!
//! Shared fixtures for khis-etl integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fake_khis;

// each test binary uses a different subset
#[allow(unused_imports)]
pub use db_utils::{
    create_test_store, seed_facilities, seed_table, test_app_state, test_config, RefusingStore,
};
#[allow(unused_imports)]
pub use fake_khis::{kenya_units, FakeKhis};
