//! khis-etl library interface
//!
//! Pipeline services, HTTP handlers and the shared application state.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use khis_common::config::TomlConfig;
use khis_common::db::TableStore;
use khis_common::Program;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::services::{
    AnalyticCatalog, JobRegistry, KhisApi, PipelineOptions, PipelineOrchestrator,
    ProgramRegistry, RunTargets,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TableStore>,
    /// KHIS remote
    pub api: Arc<dyn KhisApi>,
    pub config: Arc<TomlConfig>,
    pub registry: Arc<ProgramRegistry>,
    pub catalog: Arc<AnalyticCatalog>,
    /// Background jobs and destination table claims
    pub jobs: JobRegistry,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background failure, surfaced by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// State with the Kenya analytic tables
    pub fn new(store: Arc<dyn TableStore>, api: Arc<dyn KhisApi>, config: TomlConfig) -> Self {
        Self::with_catalog(
            store,
            api,
            config,
            ProgramRegistry::kenya_defaults(),
            AnalyticCatalog::kenya_defaults(),
        )
    }

    pub fn with_catalog(
        store: Arc<dyn TableStore>,
        api: Arc<dyn KhisApi>,
        config: TomlConfig,
        registry: ProgramRegistry,
        catalog: AnalyticCatalog,
    ) -> Self {
        Self {
            store,
            api,
            config: Arc::new(config),
            registry: Arc::new(registry),
            catalog: Arc::new(catalog),
            jobs: JobRegistry::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Requested program, else the configured default
    pub fn resolve_program(&self, requested: Option<&str>) -> ApiResult<Program> {
        match requested.map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("Unknown program '{}'", raw))),
            None => Ok(self.config.pipeline.program),
        }
    }

    /// Orchestrator for `program` over its configured tables
    pub fn orchestrator(&self, program: Program) -> khis_common::Result<PipelineOrchestrator> {
        PipelineOrchestrator::new(
            program,
            RunTargets {
                raw_table: self.config.tables.raw_table(program).to_string(),
                summary_table: self.config.tables.summary_table(program).to_string(),
            },
            self.api.clone(),
            self.store.clone(),
            self.registry.clone(),
            self.catalog.clone(),
            PipelineOptions {
                facility_chunk_size: self.config.pipeline.facility_chunk_size,
                jadelle_ratio: self.config.pipeline.jadelle_ratio,
            },
        )
    }

    /// Remember a failure for /health; hands the message back
    pub async fn record_error(&self, message: String) -> String {
        *self.last_error.write().await = Some(message.clone());
        message
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::metadata_routes())
        .merge(api::data_cleaning_routes())
        .merge(api::data_extraction_routes())
        .merge(api::job_routes())
        .merge(api::health_routes())
        .layer(middleware::from_fn(api::trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
