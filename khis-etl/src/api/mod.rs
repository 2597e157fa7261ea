//! HTTP API handlers for khis-etl

pub mod data_cleaning;
pub mod data_extraction;
pub mod health;
pub mod jobs;
pub mod metadata;
pub mod trace;

pub use data_cleaning::data_cleaning_routes;
pub use data_extraction::data_extraction_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use metadata::metadata_routes;
pub use trace::{current_trace_id, trace_middleware, TRACE_ID_HEADER};

use axum::Json;
use khis_common::api::ApiResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload of 202 responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
}

/// Success envelope stamped with the current trace id
pub(crate) fn envelope<T>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(message, data).with_trace_id(current_trace_id()))
}
