//! Shared API request/response types
//!
//! Every endpoint answers with the same envelope:
//!
//! ```json
//! { "success": true, "message": "...", "data": { ... }, "trace_id": "..." }
//! ```

use serde::{Deserialize, Serialize};

/// Uniform response envelope
///
/// # Examples
///
/// ```
/// use khis_common::api::types::ApiResponse;
///
/// let response = ApiResponse::ok("Metadata download started", serde_json::json!({"job_id": "1"}));
/// assert!(response.success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded
    pub success: bool,

    /// Human-readable summary
    pub message: String,

    /// Payload (result on success, error detail on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Per-request correlation id (also returned as the X-Trace-ID header)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            trace_id: None,
        }
    }

    /// Attach the request trace id
    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }
}

impl ApiResponse<ErrorDetail> {
    /// Failed response with a machine-readable code
    pub fn error(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(ErrorDetail { code: code.into() }),
            trace_id: None,
        }
    }
}

/// Error payload carried in the envelope's `data` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error code (e.g. "VALIDATION_ERROR")
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let response = ApiResponse::error("start_date after end_date", "VALIDATION_ERROR")
            .with_trace_id(Some("abc".to_string()));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["data"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["trace_id"], "abc");
    }

    #[test]
    fn test_trace_id_omitted_when_absent() {
        let response = ApiResponse::ok("done", 3u64);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("trace_id").is_none());
        assert_eq!(json["data"], 3);
    }
}
