//! Metadata refresh
//!
//! Downloads organisation units, data elements and indicators and replaces
//! the shared metadata tables. Each dataset stands alone: a failed or empty
//! download skips that dataset's save and the others carry on. Store
//! failures abort the refresh.

use khis_common::db::{to_frame, IntoFrame, TableStore, WriteMode};
use khis_common::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::metadata::{DATA_ELEMENTS_TABLE, INDICATORS_TABLE};
use crate::models::org_unit::ORGANISATION_UNITS_TABLE;
use crate::models::OrganisationUnit;
use crate::services::hierarchy::{clean_unit_name, flatten_hierarchy};
use crate::services::khis_client::KhisApi;

/// Rows written per table (`None` when the dataset was skipped)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataReport {
    pub organisation_units: Option<u64>,
    pub data_elements: Option<u64>,
    pub indicators: Option<u64>,
    /// Facilities lost to broken hierarchy chains
    pub dropped_facilities: usize,
}

pub struct MetadataRefresher {
    api: Arc<dyn KhisApi>,
    store: Arc<dyn TableStore>,
}

/// Keep a successful, non-empty download; log and drop anything else
fn usable<T>(dataset: &str, fetched: Result<Vec<T>>) -> Option<Vec<T>> {
    match fetched {
        Ok(items) if items.is_empty() => {
            warn!("KHIS returned no {}, skipping DB save", dataset);
            None
        }
        Ok(items) => {
            info!(rows = items.len(), "Retrieved {}", dataset);
            Some(items)
        }
        Err(e) => {
            warn!("Failed to extract {}: {}. Skipping DB save", dataset, e);
            None
        }
    }
}

impl MetadataRefresher {
    pub fn new(api: Arc<dyn KhisApi>, store: Arc<dyn TableStore>) -> Self {
        Self { api, store }
    }

    async fn replace<T: IntoFrame>(&self, table: &str, rows: &[T]) -> Result<u64> {
        let written = self
            .store
            .write(table, &to_frame(rows), WriteMode::Replace)
            .await?;
        info!(table = table, rows = written, "Saved metadata table");
        Ok(written)
    }

    pub async fn run(&self) -> Result<MetadataReport> {
        info!("Starting KHIS metadata refresh");

        let units = usable("organisation units", self.api.organisation_units().await);
        let elements = usable("data elements", self.api.data_elements().await);
        let indicators = usable("indicators", self.api.indicators().await);

        let mut report = MetadataReport::default();

        if let Some(units) = units {
            let cleaned: Vec<OrganisationUnit> = units
                .into_iter()
                .map(|unit| OrganisationUnit {
                    name: clean_unit_name(&unit.name),
                    ..unit
                })
                .collect();
            let flattened = flatten_hierarchy(&cleaned);
            report.dropped_facilities = flattened.dropped_total();
            report.organisation_units = Some(
                self.replace(ORGANISATION_UNITS_TABLE, &flattened.facilities)
                    .await?,
            );
        }

        if let Some(elements) = elements {
            report.data_elements = Some(self.replace(DATA_ELEMENTS_TABLE, &elements).await?);
        }

        if let Some(indicators) = indicators {
            report.indicators = Some(self.replace(INDICATORS_TABLE, &indicators).await?);
        }

        info!(?report, "Metadata refresh complete");
        Ok(report)
    }
}
