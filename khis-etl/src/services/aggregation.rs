//! County and national aggregation
//!
//! Steps, in order:
//! 1. Join observations to their county (drops unknown facilities)
//! 2. Join to element metadata (drops unknown elements)
//! 3. Map element id → standardized analytic name
//! 4. Derive the method from the raw element name
//! 5. FP only: multiply service rows by the per-analytic factor
//! 6. Sum by (analytic, method, county, period)
//! 7. Sum county rows by (analytic, method, period) into "Kenya" rows
//! 8. Concatenate and sort by (analytic, method, org_unit, period)

use chrono::NaiveDate;
use khis_common::Program;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{DuplicateAudit, Method, Observation, SummaryRow};
use crate::services::catalog::AnalyticCatalog;

/// org_unit of national rows
pub const NATIONAL_ORG_UNIT: &str = "Kenya";

/// Aggregated rows plus join losses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationOutcome {
    /// County rows followed by national rows, sorted
    pub rows: Vec<SummaryRow>,
    pub county_rows: usize,
    pub national_rows: usize,
    /// Observations whose facility has no county
    pub dropped_unknown_facility: usize,
    /// Observations whose element id has no metadata
    pub dropped_unknown_element: usize,
}

type CountyKey = (String, &'static str, String, NaiveDate);
type NationalKey = (String, &'static str, NaiveDate);

pub struct AggregationEngine {
    catalog: Arc<AnalyticCatalog>,
}

impl AggregationEngine {
    pub fn new(catalog: Arc<AnalyticCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &AnalyticCatalog {
        &self.catalog
    }

    /// Aggregate raw observations for `program`.
    ///
    /// `counties` holds (facility_id, county_name); `elements` holds
    /// (element_id, raw display name).
    pub fn aggregate(
        &self,
        program: Program,
        observations: &[Observation],
        counties: &[(String, String)],
        elements: &[(String, String)],
    ) -> AggregationOutcome {
        let county_of: HashMap<&str, &str> = counties
            .iter()
            .map(|(facility, county)| (facility.as_str(), county.as_str()))
            .collect();
        let element_name: HashMap<&str, &str> = elements
            .iter()
            .map(|(id, name)| (id.as_str(), name.as_str()))
            .collect();

        let mut outcome = AggregationOutcome::default();
        let mut county_sums: BTreeMap<CountyKey, f64> = BTreeMap::new();

        for obs in observations {
            let Some(county) = county_of.get(obs.org_unit.as_str()) else {
                outcome.dropped_unknown_facility += 1;
                continue;
            };
            let Some(raw_name) = element_name.get(obs.analytic.as_str()) else {
                outcome.dropped_unknown_element += 1;
                continue;
            };

            let analytic = self.catalog.analytic_name(&obs.analytic);
            let method = Method::classify(raw_name);

            let mut value = obs.value;
            if program.applies_service_adjustments() && method == Method::Service {
                value *= self.catalog.service_factor(analytic);
            }

            *county_sums
                .entry((
                    analytic.to_string(),
                    method.label(),
                    county.to_string(),
                    obs.period,
                ))
                .or_insert(0.0) += value;
        }

        let mut national_sums: BTreeMap<NationalKey, f64> = BTreeMap::new();
        for ((analytic, method, _, period), value) in &county_sums {
            *national_sums
                .entry((analytic.clone(), *method, *period))
                .or_insert(0.0) += value;
        }

        outcome.county_rows = county_sums.len();
        outcome.national_rows = national_sums.len();

        let mut rows: Vec<SummaryRow> = county_sums
            .into_iter()
            .map(|((analytic, method, county, period), value)| SummaryRow {
                analytic,
                method: method.to_string(),
                org_unit: county,
                period,
                value,
            })
            .chain(
                national_sums
                    .into_iter()
                    .map(|((analytic, method, period), value)| SummaryRow {
                        analytic,
                        method: method.to_string(),
                        org_unit: NATIONAL_ORG_UNIT.to_string(),
                        period,
                        value,
                    }),
            )
            .collect();
        sort_summary(&mut rows);
        outcome.rows = rows;

        if outcome.dropped_unknown_facility > 0 {
            warn!(
                program = %program,
                rows = outcome.dropped_unknown_facility,
                "Observations dropped: facility not in organisation_units"
            );
        }
        if outcome.dropped_unknown_element > 0 {
            warn!(
                program = %program,
                rows = outcome.dropped_unknown_element,
                "Observations dropped: element not in data_elements"
            );
        }
        info!(
            program = %program,
            county_rows = outcome.county_rows,
            national_rows = outcome.national_rows,
            "Aggregation complete"
        );

        outcome
    }
}

/// Sort by (analytic, method, org_unit, period)
pub fn sort_summary(rows: &mut [SummaryRow]) {
    rows.sort_by(|a, b| {
        (a.analytic.as_str(), a.method.as_str(), a.org_unit.as_str(), a.period).cmp(&(
            b.analytic.as_str(),
            b.method.as_str(),
            b.org_unit.as_str(),
            b.period,
        ))
    });
}

/// Count exact duplicate rows without modifying the input
pub fn audit_duplicates(observations: &[Observation], dataset: &str) -> DuplicateAudit {
    let mut counts: HashMap<(&str, &str, NaiveDate, u64), usize> = HashMap::new();
    for obs in observations {
        *counts
            .entry((
                obs.analytic.as_str(),
                obs.org_unit.as_str(),
                obs.period,
                obs.value.to_bits(),
            ))
            .or_insert(0) += 1;
    }

    let mut audit = DuplicateAudit {
        rows: observations.len(),
        ..Default::default()
    };
    let mut affected: BTreeSet<(&str, NaiveDate)> = BTreeSet::new();
    for ((_, org_unit, period, _), count) in &counts {
        if *count > 1 {
            audit.duplicate_rows += *count;
            audit.duplicate_groups += 1;
            affected.insert((*org_unit, *period));
        }
    }

    if audit.duplicate_rows == 0 {
        info!("No duplicates found in {}", dataset);
    } else {
        let sample: Vec<String> = affected
            .iter()
            .take(5)
            .map(|(org_unit, period)| format!("{}@{}", org_unit, period))
            .collect();
        warn!(
            table = dataset,
            duplicate_rows = audit.duplicate_rows,
            duplicate_groups = audit.duplicate_groups,
            "Duplicate raw rows found, affected sample: {}",
            sample.join(", ")
        );
    }

    audit
}
