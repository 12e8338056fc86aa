//! RFC 9457 Problem Details for HTTP APIs.
//!
//! Every rejected request is answered with a problem document whose `detail`
//! carries the library's error message verbatim.
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use waysnap_lib::{Error as LibError, ErrorKind};

/// Problem type URI for requests the pipeline rejected as invalid.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for storage faults and caught worker panics.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// Problem type URI for a stopped worker pool.
pub const PROBLEM_SERVICE_UNAVAILABLE: &str = "/problems/service-unavailable";

/// Problem type URI for methods other than GET and POST on an action path.
pub const PROBLEM_METHOD_NOT_ALLOWED: &str = "/problems/method-not-allowed";

/// Problem type URI for a handoff the downstream stage did not accept.
pub const PROBLEM_DOWNSTREAM_FAILED: &str = "/problems/downstream-failed";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use waysnap_service_shared::{ProblemDetails, PROBLEM_INVALID_REQUEST};
/// use axum::http::StatusCode;
///
/// let problem = ProblemDetails::new(
///     PROBLEM_INVALID_REQUEST,
///     "Invalid Request",
///     StatusCode::BAD_REQUEST,
/// )
/// .with_detail("Insufficient number of locations provided")
/// .with_request_id("req-12345");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    /// HTTP status code for this problem.
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI reference identifying the specific occurrence (the request id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Content type for this response (always "application/problem+json").
    pub content_type: String,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            content_type: "application/problem+json".to_string(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Add the request identifier for tracing.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    /// 400 Bad Request for input rejected before it reaches a worker.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 405 for an action path reached with a method other than GET or POST.
    pub fn method_not_allowed(request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_METHOD_NOT_ALLOWED,
            "Method Not Allowed",
            StatusCode::METHOD_NOT_ALLOWED,
        )
        .with_detail("Try a POST or GET request instead")
        .with_request_id(request_id)
    }

    /// 502 when the downstream stage could not be reached.
    pub fn downstream_failed(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_DOWNSTREAM_FAILED,
            "Downstream Failed",
            StatusCode::BAD_GATEWAY,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 503 when no worker can take the request.
    pub fn service_unavailable(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_SERVICE_UNAVAILABLE,
            "Service Unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.title,
            self.detail.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_REQUEST);

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        *response.status_mut() = status;
        response
    }
}

fn problem_type(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::Internal => PROBLEM_INTERNAL_ERROR.to_string(),
        other => format!("/problems/{}", other.as_str().replace('_', "-")),
    }
}

fn title(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::UnknownAction => "Unknown Action",
        ErrorKind::MalformedInput => "Malformed Input",
        ErrorKind::MalformedLocation => "Malformed Location",
        ErrorKind::TooFewLocations => "Too Few Locations",
        ErrorKind::TooManyLocations => "Too Many Locations",
        ErrorKind::MissingCosting => "Missing Costing",
        ErrorKind::UnknownCostingMethod => "Unknown Costing Method",
        ErrorKind::InvalidCostingOption => "Invalid Costing Option",
        ErrorKind::UnreachableRegion => "Unreachable Region",
        ErrorKind::DistanceLimitExceeded => "Distance Limit Exceeded",
        ErrorKind::LocationNotFound => "Location Not Found",
        ErrorKind::NotImplemented => "Not Implemented",
        ErrorKind::Internal => "Internal Error",
    }
}

/// Convert library errors to ProblemDetails.
///
/// Status follows [`ErrorKind::status_code`]; the message goes into `detail`.
pub fn from_lib_error(error: &LibError, request_id: &str) -> ProblemDetails {
    let kind = error.kind();
    let status = StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    ProblemDetails::new(problem_type(kind), title(kind), status)
        .with_detail(error.to_string())
        .with_request_id(request_id)
}
