//! Batched historical extraction
//!
//! Facilities are split into fixed-size chunks, preserving order. Each chunk
//! is one remote query covering every analytic and the whole date window, so
//! a run issues exactly `ceil(facilities / chunk_size)` requests. Chunks run
//! strictly one after another; rows are appended as each chunk arrives.
//!
//! A transport failure or malformed payload aborts the run. Rows appended by
//! earlier chunks stay in the table.

use async_trait::async_trait;
use chrono::NaiveDate;
use khis_common::db::{to_frame, TableStore, WriteMode};
use khis_common::{Error, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{BatchResult, Observation};
use crate::services::khis_client::{AnalyticsQuery, ChunkOutcome, IdScheme, KhisApi};

pub const DEFAULT_FACILITY_CHUNK_SIZE: usize = 400;

/// Destination for extracted rows
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Append rows; returns rows written
    async fn append(&self, rows: &[Observation]) -> Result<u64>;
}

/// Appends batches to a raw table
pub struct TableSink {
    store: Arc<dyn TableStore>,
    table: String,
}

impl TableSink {
    pub fn new(store: Arc<dyn TableStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }
}

#[async_trait]
impl BatchSink for TableSink {
    async fn append(&self, rows: &[Observation]) -> Result<u64> {
        self.store
            .write(&self.table, &to_frame(rows), WriteMode::Append)
            .await
    }
}

/// Split `ids` into chunks of at most `size`, in order
pub fn chunk_facilities(ids: &[String], size: usize) -> Result<std::slice::Chunks<'_, String>> {
    if size == 0 {
        return Err(Error::Validation(
            "Facility chunk size must be at least 1".to_string(),
        ));
    }
    Ok(ids.chunks(size))
}

/// Totals of one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub batches: Vec<BatchResult>,
    pub rows: usize,
}

pub struct BatchExtractor {
    api: Arc<dyn KhisApi>,
    chunk_size: usize,
    id_scheme: IdScheme,
}

impl BatchExtractor {
    pub fn new(api: Arc<dyn KhisApi>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Validation(
                "Facility chunk size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            api,
            chunk_size,
            id_scheme: IdScheme::Uid,
        })
    }

    pub fn with_id_scheme(mut self, id_scheme: IdScheme) -> Self {
        self.id_scheme = id_scheme;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Extract `[start, end]` for every facility, appending each chunk to `sink`
    pub async fn extract(
        &self,
        analytic_ids: &[String],
        facility_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
        sink: &dyn BatchSink,
    ) -> Result<ExtractionSummary> {
        if analytic_ids.is_empty() {
            return Err(Error::Config("No analytic ids to extract".to_string()));
        }

        let total = facility_ids.len().div_ceil(self.chunk_size);
        let mut summary = ExtractionSummary::default();

        for (index, chunk) in chunk_facilities(facility_ids, self.chunk_size)?.enumerate() {
            let batch = index + 1;
            info!(
                batch,
                total,
                facilities = chunk.len(),
                "Processing batch {}/{}",
                batch,
                total
            );

            let query = AnalyticsQuery {
                analytic_ids: analytic_ids.to_vec(),
                facility_ids: chunk.to_vec(),
                start,
                end,
                id_scheme: self.id_scheme,
            };

            let outcome = self.api.analytics(&query).await.map_err(|e| {
                error!(batch, "Failed to fetch batch {}: {}", batch, e);
                e
            })?;

            let rows = match outcome {
                ChunkOutcome::Rows(rows) => {
                    sink.append(&rows).await.map_err(|e| {
                        error!(batch, "Failed to save batch {}: {}", batch, e);
                        e
                    })?;
                    info!(batch, rows = rows.len(), "Batch {} saved", batch);
                    rows.len()
                }
                ChunkOutcome::NoData => {
                    warn!(batch, "Batch {} returned no data", batch);
                    0
                }
                ChunkOutcome::Malformed(reason) => {
                    error!(batch, "Batch {} payload malformed: {}", batch, reason);
                    return Err(Error::Schema(format!(
                        "Batch {} returned a malformed payload: {}",
                        batch, reason
                    )));
                }
            };

            summary.rows += rows;
            summary.batches.push(BatchResult {
                batch,
                facilities: chunk.len(),
                rows,
            });
        }

        info!(
            batches = summary.batches.len(),
            rows = summary.rows,
            "Extraction complete"
        );
        Ok(summary)
    }
}
