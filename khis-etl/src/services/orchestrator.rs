//! Pipeline orchestrator
//!
//! Runs one program through PREPARE → CLEANUP → EXTRACT/TRANSFORM → LOAD → DONE.
//!
//! - Table alignment, chunk size and split ratio are checked at construction,
//!   before anything touches the store.
//! - CLEANUP deletes the raw rows of the target months once; batches only append.
//! - Cleanup and extract/transform errors surface unchanged. LOAD errors are
//!   wrapped with program and stage.

use chrono::NaiveDate;
use khis_common::db::{to_frame, Frame, TableStore, WriteMode};
use khis_common::{Error, Program, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::models::metadata::{element_names_from_frame, DATA_ELEMENTS_TABLE};
use crate::models::observation::RAW_COLUMNS;
use crate::models::org_unit::{
    county_lookup_from_frame, facility_ids_from_frame, ORGANISATION_UNITS_TABLE,
};
use crate::models::{Observation, RunReport, RunRequest, RunSession, RunState, SummaryRow};
use crate::services::aggregation::{audit_duplicates, AggregationEngine};
use crate::services::batch_extractor::{BatchExtractor, TableSink, DEFAULT_FACILITY_CHUNK_SIZE};
use crate::services::catalog::AnalyticCatalog;
use crate::services::khis_client::KhisApi;
use crate::services::periods::{month_range, storage_keys};
use crate::services::registry::ProgramRegistry;
use crate::services::unit_split::{split_two_rod, validate_ratio, DEFAULT_JADELLE_RATIO};

/// Column keyed by cleanup deletes
const PERIOD_COLUMN: &str = "period";

/// Destination tables of one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTargets {
    pub raw_table: String,
    pub summary_table: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub facility_chunk_size: usize,
    pub jadelle_ratio: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            facility_chunk_size: DEFAULT_FACILITY_CHUNK_SIZE,
            jadelle_ratio: DEFAULT_JADELLE_RATIO,
        }
    }
}

/// Inputs resolved during PREPARE for extraction kinds
struct ExtractPlan {
    start: NaiveDate,
    end: NaiveDate,
    months: Vec<NaiveDate>,
    facility_ids: Vec<String>,
}

pub struct PipelineOrchestrator {
    program: Program,
    targets: RunTargets,
    store: Arc<dyn TableStore>,
    registry: Arc<ProgramRegistry>,
    engine: AggregationEngine,
    extractor: BatchExtractor,
    options: PipelineOptions,
}

impl PipelineOrchestrator {
    /// Build an orchestrator, validating everything that can be checked up front
    pub fn new(
        program: Program,
        targets: RunTargets,
        api: Arc<dyn KhisApi>,
        store: Arc<dyn TableStore>,
        registry: Arc<ProgramRegistry>,
        catalog: Arc<AnalyticCatalog>,
        options: PipelineOptions,
    ) -> Result<Self> {
        registry.validate_table_alignment(program, &targets.raw_table)?;
        registry.validate_table_alignment(program, &targets.summary_table)?;
        validate_ratio(options.jadelle_ratio)?;
        let extractor = BatchExtractor::new(api, options.facility_chunk_size)?;

        Ok(Self {
            program,
            targets,
            store,
            registry,
            engine: AggregationEngine::new(catalog),
            extractor,
            options,
        })
    }

    pub fn program(&self) -> Program {
        self.program
    }

    pub fn targets(&self) -> &RunTargets {
        &self.targets
    }

    /// Dispatch a run onto the tokio runtime
    pub fn spawn(
        self: Arc<Self>,
        request: RunRequest,
    ) -> JoinHandle<std::result::Result<RunReport, PipelineError>> {
        tokio::spawn(async move { self.run(request).await })
    }

    pub async fn run(&self, request: RunRequest) -> std::result::Result<RunReport, PipelineError> {
        let mut session = RunSession::new(self.program, request.kind());
        info!(
            run_id = %session.run_id,
            program = %self.program,
            kind = ?session.kind,
            raw_table = %self.targets.raw_table,
            summary_table = %self.targets.summary_table,
            "Starting pipeline run"
        );

        let mut report = RunReport {
            run_id: session.run_id,
            program: self.program,
            kind: session.kind,
            rows_extracted: 0,
            batches: Vec::new(),
            audit: None,
            rows_written: 0,
            transitions: Vec::new(),
        };

        match self.execute(&request, &mut session, &mut report).await {
            Ok(()) => {
                report.transitions = session.transitions;
                info!(
                    run_id = %report.run_id,
                    program = %self.program,
                    rows_extracted = report.rows_extracted,
                    rows_written = report.rows_written,
                    "Pipeline run complete"
                );
                Ok(report)
            }
            Err(err) => {
                let stage = session.state;
                if let Err(e) = session.transition_to(RunState::Failed) {
                    warn!("Could not mark run failed: {}", e);
                }
                error!(
                    run_id = %session.run_id,
                    program = %self.program,
                    stage = %stage,
                    window = ?request.window(),
                    "Pipeline run failed: {}",
                    err
                );
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        request: &RunRequest,
        session: &mut RunSession,
        report: &mut RunReport,
    ) -> std::result::Result<(), PipelineError> {
        let plan = match request.window() {
            Some((start, end)) => Some(self.prepare_extract(start, end).await?),
            None => None,
        };

        session.transition_to(RunState::Cleanup)?;
        if let Some(plan) = plan.as_ref().filter(|p| !p.facility_ids.is_empty()) {
            self.cleanup(&plan.months).await?;
        }

        session.transition_to(RunState::ExtractTransform)?;
        if let Some(plan) = plan.as_ref().filter(|p| !p.facility_ids.is_empty()) {
            let sink = TableSink::new(self.store.clone(), self.targets.raw_table.clone());
            let summary = self
                .extractor
                .extract(
                    self.registry.resolve_analytic_ids(self.program),
                    &plan.facility_ids,
                    plan.start,
                    plan.end,
                    &sink,
                )
                .await?;
            report.rows_extracted = summary.rows;
            report.batches = summary.batches;
        }
        let summary_rows = if request.transforms() {
            Some(self.transform(report).await?)
        } else {
            None
        };

        session.transition_to(RunState::Load)?;
        if let Some(rows) = summary_rows {
            report.rows_written = self.load(&rows).await.map_err(|source| PipelineError::Stage {
                program: self.program,
                stage: RunState::Load,
                source,
            })?;
        }

        session.transition_to(RunState::Done)?;
        Ok(())
    }

    async fn prepare_extract(&self, start: NaiveDate, end: NaiveDate) -> Result<ExtractPlan> {
        if start > end {
            return Err(Error::Validation(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }

        let months = month_range(start, end);
        let facility_ids = self.load_facility_ids().await?;
        if facility_ids.is_empty() {
            warn!(
                program = %self.program,
                "No organisation units found, skipping cleanup and extraction"
            );
        }

        Ok(ExtractPlan {
            start,
            end,
            months,
            facility_ids,
        })
    }

    async fn load_facility_ids(&self) -> Result<Vec<String>> {
        if !self.store.exists(ORGANISATION_UNITS_TABLE).await? {
            return Ok(Vec::new());
        }
        let frame = self
            .store
            .select(ORGANISATION_UNITS_TABLE, &["facility_id"])
            .await?;
        let ids = facility_ids_from_frame(&frame)?;
        info!(facilities = ids.len(), "Loaded facility ids");
        Ok(ids)
    }

    async fn cleanup(&self, months: &[NaiveDate]) -> Result<u64> {
        let keys = storage_keys(months);
        let deleted = self
            .store
            .delete_where(&self.targets.raw_table, PERIOD_COLUMN, &keys)
            .await?;
        info!(
            table = %self.targets.raw_table,
            rows = deleted,
            "Removed existing rows for periods {:?}",
            keys
        );
        Ok(deleted)
    }

    /// Read a transform input, naming the step that produces it when absent
    async fn select_input(&self, table: &str, columns: &[&str], producer: &str) -> Result<Frame> {
        match self.store.select(table, columns).await {
            Err(Error::NotFound(_)) => Err(Error::MissingInput(format!(
                "Table {} does not exist; run {} first",
                table, producer
            ))),
            other => other,
        }
    }

    async fn transform(&self, report: &mut RunReport) -> Result<Vec<SummaryRow>> {
        let raw = self
            .select_input(&self.targets.raw_table, &RAW_COLUMNS, "data extraction")
            .await?;
        let observations = Observation::from_frame(&raw)?;

        let counties = county_lookup_from_frame(
            &self
                .select_input(
                    ORGANISATION_UNITS_TABLE,
                    &["facility_id", "county_name"],
                    "metadata download",
                )
                .await?,
        )?;
        let elements = element_names_from_frame(
            &self
                .select_input(DATA_ELEMENTS_TABLE, &["id", "name"], "metadata download")
                .await?,
        )?;
        info!(
            raw_rows = observations.len(),
            facilities = counties.len(),
            elements = elements.len(),
            "Loaded transformation inputs"
        );

        report.audit = Some(audit_duplicates(&observations, &self.targets.raw_table));

        let outcome = self
            .engine
            .aggregate(self.program, &observations, &counties, &elements);

        if self.program.applies_unit_split() {
            split_two_rod(outcome.rows, self.options.jadelle_ratio)
        } else {
            Ok(outcome.rows)
        }
    }

    async fn load(&self, rows: &[SummaryRow]) -> Result<u64> {
        let written = self
            .store
            .write(&self.targets.summary_table, &to_frame(rows), WriteMode::Replace)
            .await?;
        info!(
            table = %self.targets.summary_table,
            rows = written,
            "Saved summary table"
        );
        Ok(written)
    }
}
