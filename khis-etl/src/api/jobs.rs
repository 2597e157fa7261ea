//! Job status endpoint

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use khis_common::api::ApiResponse;
use uuid::Uuid;

use super::envelope;
use crate::error::{ApiError, ApiResult};
use crate::services::JobRecord;
use crate::AppState;

/// GET /jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ApiResponse<JobRecord>>> {
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid job id '{}'", job_id)))?;

    let record = state
        .jobs
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", job_id)))?;

    Ok(envelope("Job status", record))
}

pub fn job_routes() -> Router<AppState> {
    Router::new().route("/jobs/:job_id", get(get_job))
}
