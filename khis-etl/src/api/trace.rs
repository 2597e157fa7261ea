//! Per-request trace ids
//!
//! Each request runs inside a task-local holding its trace id, so envelopes
//! built anywhere in the handler (errors included) can carry it. The id is
//! echoed back in `X-Trace-ID`.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

tokio::task_local! {
    static TRACE_ID: String;
}

/// Trace id of the request being handled, if any
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

/// Generate a trace id, scope the request to it and echo it in the response
pub async fn trace_middleware(request: Request, next: Next) -> Response {
    let trace_id = Uuid::new_v4().simple().to_string();
    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = TRACE_ID
        .scope(trace_id.clone(), next.run(request).instrument(span))
        .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
