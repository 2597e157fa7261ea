//! Historical extraction endpoint

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use khis_common::api::ApiResponse;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::{envelope, JobAccepted};
use crate::error::{ApiError, ApiResult};
use crate::models::RunRequest;
use crate::services::periods::STORAGE_FORMAT;
use crate::services::{JobKind, JobOutcome};
use crate::AppState;

/// Dates arrive as raw strings so a bad value gets the enveloped 400
#[derive(Debug, Deserialize)]
pub struct ExtractionQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub program: Option<String>,
}

fn parse_date(field: &str, raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), STORAGE_FORMAT).map_err(|_| {
        ApiError::BadRequest(format!("{} must be YYYY-MM-DD, got '{}'", field, raw))
    })
}

/// Resolve the extraction window. Missing bounds default to the trailing
/// `lookback_days` ending today.
pub fn resolve_window(
    start_date: Option<&str>,
    end_date: Option<&str>,
    lookback_days: i64,
    today: NaiveDate,
) -> ApiResult<(NaiveDate, NaiveDate)> {
    let end = match end_date {
        Some(raw) => parse_date("end_date", raw)?,
        None => today,
    };
    let start = match start_date {
        Some(raw) => parse_date("start_date", raw)?,
        None => end - Duration::days(lookback_days),
    };

    if start > end {
        return Err(ApiError::BadRequest(format!(
            "start_date {} is after end_date {}",
            start, end
        )));
    }
    Ok((start, end))
}

/// POST /data-extraction/historical-data?start_date&end_date&program
///
/// Starts a background Extract run for the window. Rejected with 409 while
/// another run owns the program's raw table.
pub async fn extract_historical_data(
    State(state): State<AppState>,
    Query(query): Query<ExtractionQuery>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobAccepted>>)> {
    let program = state.resolve_program(query.program.as_deref())?;
    let (start, end) = resolve_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        state.config.pipeline.lookback_days,
        Utc::now().date_naive(),
    )?;

    let orchestrator = Arc::new(state.orchestrator(program)?);
    let claim = state.jobs.claim(&[orchestrator.targets().raw_table.as_str()])?;

    info!(program = %program, %start, %end, "Historical extraction requested");
    let handle = orchestrator.spawn(RunRequest::Extract { start, end });

    let failures = state.clone();
    let job_id = state
        .jobs
        .track(JobKind::Extract, Some(program), claim, async move {
            let message = match handle.await {
                Ok(Ok(report)) => {
                    return Ok(JobOutcome {
                        message: format!(
                            "Extracted {} rows in {} batches",
                            report.rows_extracted,
                            report.batches.len()
                        ),
                        rows: report.rows_extracted as u64,
                    })
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("Extraction task aborted: {}", e),
            };
            Err(failures.record_error(message).await)
        })
        .await;

    Ok((
        StatusCode::ACCEPTED,
        envelope(
            format!(
                "{} extraction started for {} to {}",
                program, start, end
            ),
            JobAccepted { job_id },
        ),
    ))
}

pub fn data_extraction_routes() -> Router<AppState> {
    Router::new().route(
        "/data-extraction/historical-data",
        post(extract_historical_data),
    )
}
