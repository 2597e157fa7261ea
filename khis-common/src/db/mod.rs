//! Relational store access

pub mod frame;
pub mod init;
pub mod store;

pub use frame::{to_frame, Column, ColumnType, Frame, IntoFrame, RowRef, Value};
pub use init::init_database;
pub use store::{SqliteStore, TableStore, WriteMode};
