//! Pipeline services
//!
//! Pure transforms (periods, hierarchy, aggregation, unit split) sit beside
//! the stateful pieces that talk to KHIS and the store.

pub mod aggregation;
pub mod batch_extractor;
pub mod catalog;
pub mod hierarchy;
pub mod jobs;
pub mod khis_client;
pub mod metadata;
pub mod orchestrator;
pub mod periods;
pub mod registry;
pub mod unit_split;

pub use aggregation::{AggregationEngine, AggregationOutcome};
pub use batch_extractor::{BatchExtractor, BatchSink, ExtractionSummary, TableSink};
pub use catalog::AnalyticCatalog;
pub use jobs::{JobKind, JobOutcome, JobRecord, JobRegistry, JobState, TableBusy, TableClaim};
pub use khis_client::{AnalyticsQuery, ChunkOutcome, IdScheme, KhisApi, KhisClient};
pub use metadata::{MetadataRefresher, MetadataReport};
pub use orchestrator::{PipelineOptions, PipelineOrchestrator, RunTargets};
pub use registry::ProgramRegistry;
