//! Metadata download endpoint

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use khis_common::api::ApiResponse;

use super::{envelope, JobAccepted};
use crate::error::ApiResult;
use crate::models::metadata::{DATA_ELEMENTS_TABLE, INDICATORS_TABLE};
use crate::models::org_unit::ORGANISATION_UNITS_TABLE;
use crate::services::{JobKind, JobOutcome, MetadataRefresher};
use crate::AppState;

/// POST /metadata/download
///
/// Refreshes organisation units, data elements and indicators in the
/// background. Rejected with 409 while a previous refresh is still running.
pub async fn download_metadata(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobAccepted>>)> {
    let claim = state.jobs.claim(&[
        ORGANISATION_UNITS_TABLE,
        DATA_ELEMENTS_TABLE,
        INDICATORS_TABLE,
    ])?;

    let refresher = MetadataRefresher::new(state.api.clone(), state.store.clone());
    let failures = state.clone();
    let job_id = state
        .jobs
        .track(JobKind::Metadata, None, claim, async move {
            match refresher.run().await {
                Ok(report) => {
                    let rows = [
                        report.organisation_units,
                        report.data_elements,
                        report.indicators,
                    ]
                    .iter()
                    .flatten()
                    .sum();
                    Ok(JobOutcome {
                        message: format!(
                            "Metadata refreshed (organisation_units: {:?}, data_elements: {:?}, indicators: {:?})",
                            report.organisation_units, report.data_elements, report.indicators
                        ),
                        rows,
                    })
                }
                Err(e) => Err(failures.record_error(e.to_string()).await),
            }
        })
        .await;

    Ok((
        StatusCode::ACCEPTED,
        envelope("Metadata download started", JobAccepted { job_id }),
    ))
}

pub fn metadata_routes() -> Router<AppState> {
    Router::new().route("/metadata/download", post(download_metadata))
}
