//! Data cleaning (transform) endpoint

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use khis_common::api::ApiResponse;
use serde::Deserialize;
use tracing::info;

use super::envelope;
use crate::error::ApiResult;
use crate::models::{RunRequest, RunSummary};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CleaningQuery {
    pub program: Option<String>,
}

/// POST /data-cleaning/run?program=FP|MNCH
///
/// Aggregates the program's raw table into its summary table and waits for
/// the run to finish.
pub async fn run_data_cleaning(
    State(state): State<AppState>,
    Query(query): Query<CleaningQuery>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RunSummary>>)> {
    let program = state.resolve_program(query.program.as_deref())?;
    let orchestrator = state.orchestrator(program)?;
    // an extraction holds the raw table until its last append
    let targets = orchestrator.targets();
    let _claim = state
        .jobs
        .claim(&[targets.raw_table.as_str(), targets.summary_table.as_str()])?;

    info!(program = %program, "Data cleaning requested");
    let report = match orchestrator.run(RunRequest::Transform).await {
        Ok(report) => report,
        Err(e) => {
            state.record_error(e.to_string()).await;
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        envelope(
            format!("{} data cleaning complete", program),
            report.summary(),
        ),
    ))
}

pub fn data_cleaning_routes() -> Router<AppState> {
    Router::new().route("/data-cleaning/run", post(run_data_cleaning))
}
