//! Error types for khis-etl
//!
//! `PipelineError` is what a run returns; `ApiError` is what handlers return.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use khis_common::api::ApiResponse;
use khis_common::Program;
use thiserror::Error;

use crate::api::trace::current_trace_id;
use crate::models::RunState;
use crate::services::jobs::TableBusy;

/// Failure of one pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// LOAD failure, wrapped with the program and stage it happened in
    #[error("{program} pipeline failed at {stage}: {source}")]
    Stage {
        program: Program,
        stage: RunState,
        #[source]
        source: khis_common::Error,
    },

    /// Pre-flight, cleanup and extract/transform failures, surfaced unchanged
    #[error(transparent)]
    Common(#[from] khis_common::Error),
}

impl PipelineError {
    /// Underlying error regardless of wrapping
    pub fn inner(&self) -> &khis_common::Error {
        match self {
            PipelineError::Stage { source, .. } => source,
            PipelineError::Common(err) => err,
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - a run already owns the destination table
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// khis-common error
    #[error(transparent)]
    Common(#[from] khis_common::Error),

    /// Pipeline run error
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

fn classify(err: &khis_common::Error) -> (StatusCode, &'static str) {
    use khis_common::Error as E;
    let status = match err {
        E::Validation(_) => StatusCode::BAD_REQUEST,
        E::NotFound(_) => StatusCode::NOT_FOUND,
        E::MissingInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        E::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.code())
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(err) => classify(err).0,
            ApiError::Pipeline(err) => classify(err.inner()).0,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Common(err) => classify(err).1,
            ApiError::Pipeline(err) => classify(err.inner()).1,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::error(self.to_string(), self.code())
            .with_trace_id(current_trace_id());

        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        } else {
            tracing::warn!(code = self.code(), "Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

impl From<TableBusy> for ApiError {
    fn from(busy: TableBusy) -> Self {
        ApiError::Conflict(busy.to_string())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
