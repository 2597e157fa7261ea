//! Data models for khis-etl
//!
//! - Raw and aggregated observation rows
//! - Organisation-unit hierarchy (long and flattened)
//! - Remote metadata rows (data elements, indicators)
//! - Pipeline run state machine and reports

pub mod analytics;
pub mod metadata;
pub mod observation;
pub mod org_unit;
pub mod run;

pub use analytics::{DuplicateAudit, Method};
pub use metadata::{DataElement, Indicator};
pub use observation::{Observation, SummaryRow};
pub use org_unit::{FlatFacility, OrganisationUnit};
pub use run::{
    BatchResult, RunKind, RunReport, RunRequest, RunSession, RunState, RunSummary, StateTransition,
};
